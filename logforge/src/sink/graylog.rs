//! Central aggregator sink (GELF-style JSON over a streaming transport).

use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::io::Write;
use std::net::TcpStream;

use crate::event::LogEvent;
use crate::level::LogLevel;
use crate::sink::Sink;

fn gelf_level(level: LogLevel) -> u8 {
  level.syslog_priority()
}

fn build_gelf(event: &LogEvent, host: &str) -> Value {
  let mut extra = Map::new();
  for (k, v) in event.extra.iter() {
    extra.insert(format!("_{k}"), v.clone());
  }
  extra.insert("_logger_name".into(), Value::String(event.logger_name.clone()));
  extra.insert("_event_id".into(), Value::String(event.event_id.clone()));
  extra.insert("_service".into(), Value::String(event.context.service.clone()));
  extra.insert("_job_id".into(), Value::String(event.context.job_id.clone()));
  if let Some(exc) = &event.exception_info {
    extra.insert("_exception_type".into(), Value::String(exc.type_name.clone()));
    extra.insert("_exception_trace".into(), Value::String(exc.trace.clone()));
  }

  let mut gelf = json!({
    "version": "1.1",
    "host": host,
    "short_message": event.message,
    "timestamp": event.timestamp.timestamp_millis() as f64 / 1000.0,
    "level": gelf_level(event.level),
  });
  if let Value::Object(ref mut map) = gelf {
    map.extend(extra);
  }
  gelf
}

/// Transport abstraction so the sink can be tested without a live socket.
pub trait GelfTransport: Send {
  fn send(&mut self, payload: &[u8]) -> Result<(), String>;
}

/// Newline-delimited JSON over a persistent TCP connection, reconnecting on
/// the next send after a write failure.
pub struct TcpTransport {
  addr: String,
  stream: Option<TcpStream>,
}

impl TcpTransport {
  pub fn new(addr: impl Into<String>) -> Self {
    Self {
      addr: addr.into(),
      stream: None,
    }
  }

  fn ensure_connected(&mut self) -> Result<&mut TcpStream, String> {
    if self.stream.is_none() {
      let stream = TcpStream::connect(&self.addr).map_err(|e| e.to_string())?;
      self.stream = Some(stream);
    }
    Ok(self.stream.as_mut().unwrap())
  }
}

impl GelfTransport for TcpTransport {
  fn send(&mut self, payload: &[u8]) -> Result<(), String> {
    let result = (|| -> Result<(), String> {
      let stream = self.ensure_connected()?;
      stream.write_all(payload).map_err(|e| e.to_string())?;
      stream.write_all(b"\n").map_err(|e| e.to_string())
    })();
    if result.is_err() {
      self.stream = None;
    }
    result
  }
}

/// Delivers events as GELF JSON documents, defaulting its own severity gate
/// to `WARNING` so a central aggregator is not flooded with chatter the
/// console/structured sinks already carry at lower thresholds.
pub struct GraylogSink<T: GelfTransport> {
  threshold: LogLevel,
  host: String,
  transport: Mutex<T>,
}

impl<T: GelfTransport> GraylogSink<T> {
  pub fn new(host: impl Into<String>, transport: T) -> Self {
    Self {
      threshold: LogLevel::Warning,
      host: host.into(),
      transport: Mutex::new(transport),
    }
  }

  pub fn with_threshold(mut self, threshold: LogLevel) -> Self {
    self.threshold = threshold;
    self
  }
}

impl<T: GelfTransport> Sink for GraylogSink<T> {
  fn name(&self) -> &str {
    "graylog"
  }

  fn threshold(&self) -> LogLevel {
    self.threshold
  }

  fn emit(&self, event: &LogEvent) -> Result<(), String> {
    let gelf = build_gelf(event, &self.host);
    let payload = serde_json::to_vec(&gelf).map_err(|e| e.to_string())?;
    self.transport.lock().send(&payload)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::LogContext;

  struct RecordingTransport {
    sent: Vec<Vec<u8>>,
    fail_next: bool,
  }

  impl GelfTransport for RecordingTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), String> {
      if self.fail_next {
        self.fail_next = false;
        return Err("connection reset".into());
      }
      self.sent.push(payload.to_vec());
      Ok(())
    }
  }

  fn ctx() -> LogContext {
    LogContext {
      service: "svc".into(),
      environment: "dev".into(),
      job_id: "job-1".into(),
      request_id: None,
      user_id: None,
      user_name: None,
      hostname: None,
      trace_id: None,
      span_id: None,
      process_id: 1,
      process_id_chain: vec![1],
      extra: Map::new(),
    }
  }

  #[test]
  fn default_threshold_is_warning() {
    let sink = GraylogSink::new("host", RecordingTransport { sent: vec![], fail_next: false });
    assert_eq!(sink.threshold(), LogLevel::Warning);
  }

  #[test]
  fn emits_gelf_document() {
    let sink = GraylogSink::new("host-1", RecordingTransport { sent: vec![], fail_next: false });
    let event = LogEvent::new("a", LogLevel::Error, "disk full", ctx(), Map::new());
    sink.emit(&event).unwrap();
    let sent = &sink.transport.lock().sent;
    assert_eq!(sent.len(), 1);
    let value: Value = serde_json::from_slice(&sent[0]).unwrap();
    assert_eq!(value["short_message"], "disk full");
    assert_eq!(value["level"], 3);
  }

  #[test]
  fn transport_failure_is_propagated() {
    let sink = GraylogSink::new("host-1", RecordingTransport { sent: vec![], fail_next: true });
    let event = LogEvent::new("a", LogLevel::Error, "x", ctx(), Map::new());
    assert!(sink.emit(&event).is_err());
  }
}
