//! Structured OS-backend sink: NDJSON-per-line, writer owned under a
//! `Mutex`.
//!
//! This does not link against a real journald/Windows Event Log API --
//! those are platform-specific backends treated as external collaborators.
//! `StructuredSink` instead guarantees the *wire contract* those backends
//! need: field-normalized JSON with an adapter-specific key convention,
//! written to any `io::Write` (a file, a pipe to a real journald socket, a
//! test buffer).

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::io::Write;

use crate::event::LogEvent;
use crate::level::LogLevel;
use crate::sink::Sink;

/// Key-naming convention for the emitted JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyConvention {
  /// `MESSAGE`, `PRIORITY`, ... (journald-style).
  UpperAscii,
  /// `eventId`, `loggerName`, ... (Windows Event Log-style).
  CamelCase,
  /// `_event_id`, `_logger_name`, ... (GELF additional-field-style).
  Underscore,
}

fn to_camel_case(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut upper_next = false;
  for (i, ch) in s.chars().enumerate() {
    if ch == '_' {
      upper_next = true;
      continue;
    }
    if i == 0 {
      out.push(ch.to_ascii_lowercase());
    } else if upper_next {
      out.push(ch.to_ascii_uppercase());
      upper_next = false;
    } else {
      out.push(ch);
    }
  }
  out
}

fn key(convention: KeyConvention, snake: &str) -> String {
  match convention {
    KeyConvention::UpperAscii => snake.to_ascii_uppercase(),
    KeyConvention::CamelCase => to_camel_case(snake),
    KeyConvention::Underscore => format!("_{snake}"),
  }
}

fn build_payload(convention: KeyConvention, event: &LogEvent) -> Map<String, Value> {
  let mut payload = Map::new();
  payload.insert(key(convention, "timestamp"), Value::String(event.timestamp.to_rfc3339()));
  payload.insert(key(convention, "level"), Value::String(event.level.name().to_string()));
  payload.insert(
    key(convention, "syslog_priority"),
    Value::Number(event.level.syslog_priority().into()),
  );
  payload.insert(key(convention, "logger_name"), Value::String(event.logger_name.clone()));
  payload.insert(key(convention, "message"), Value::String(event.message.clone()));
  payload.insert(key(convention, "event_id"), Value::String(event.event_id.clone()));
  payload.insert(key(convention, "service"), Value::String(event.context.service.clone()));
  payload.insert(key(convention, "job_id"), Value::String(event.context.job_id.clone()));
  payload.insert(key(convention, "extra"), Value::Object(event.extra.clone()));
  payload
}

/// Writes one JSON object per line (NDJSON) to any `io::Write`.
pub struct StructuredSink<W: Write + Send> {
  threshold: LogLevel,
  convention: KeyConvention,
  writer: Mutex<W>,
}

impl<W: Write + Send> StructuredSink<W> {
  pub fn new(threshold: LogLevel, convention: KeyConvention, writer: W) -> Self {
    Self {
      threshold,
      convention,
      writer: Mutex::new(writer),
    }
  }
}

impl<W: Write + Send> Sink for StructuredSink<W> {
  fn name(&self) -> &str {
    "structured_backend"
  }

  fn threshold(&self) -> LogLevel {
    self.threshold
  }

  fn emit(&self, event: &LogEvent) -> Result<(), String> {
    let payload = build_payload(self.convention, event);
    let line = serde_json::to_string(&payload).map_err(|e| e.to_string())?;

    let mut writer = self.writer.lock();
    writer.write_all(line.as_bytes()).map_err(|e| e.to_string())?;
    writer.write_all(b"\n").map_err(|e| e.to_string())
  }

  fn flush(&self) -> Result<(), String> {
    self.writer.lock().flush().map_err(|e| e.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::LogContext;

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
  fn upper_ascii_convention_keys() {
    let buf: Vec<u8> = Vec::new();
    let sink = StructuredSink::new(LogLevel::Info, KeyConvention::UpperAscii, buf);
    let event = LogEvent::new("a", LogLevel::Info, "hi", ctx(), Map::new());
    sink.emit(&event).unwrap();

    let written = sink.writer.lock().clone();
    let line = String::from_utf8(written).unwrap();
    let value: Value = serde_json::from_str(line.trim()) .unwrap();
    assert!(value.get("MESSAGE").is_some());
  }

  #[test]
  fn camel_case_convention_keys() {
    assert_eq!(to_camel_case("logger_name"), "loggerName");
    assert_eq!(to_camel_case("event_id"), "eventId");
  }

  #[test]
  fn underscore_convention_keys() {
    let buf: Vec<u8> = Vec::new();
    let sink = StructuredSink::new(LogLevel::Info, KeyConvention::Underscore, buf);
    let event = LogEvent::new("a", LogLevel::Info, "hi", ctx(), Map::new());
    sink.emit(&event).unwrap();
    let written = sink.writer.lock().clone();
    let line = String::from_utf8(written).unwrap();
    assert!(line.contains("\"_message\""));
  }
}
