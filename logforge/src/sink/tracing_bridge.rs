//! Optional sink that re-emits events through the `tracing` crate instead of
//! owning its own I/O. Useful when a host application already has a
//! `tracing_subscriber` layer wired up (file rotation, OpenTelemetry export,
//! etc.) and wants this runtime's events to flow through it rather than
//! maintaining a second output path.

use crate::event::LogEvent;
use crate::level::LogLevel;
use crate::sink::Sink;

/// Forwards events to the ambient `tracing` subscriber, if any. Emits
/// nothing on its own when no subscriber is installed -- `tracing` macros
/// are no-ops in that case.
pub struct TracingBridgeSink {
  threshold: LogLevel,
}

impl TracingBridgeSink {
  pub fn new(threshold: LogLevel) -> Self {
    Self { threshold }
  }
}

impl Sink for TracingBridgeSink {
  fn name(&self) -> &str {
    "tracing_bridge"
  }

  fn threshold(&self) -> LogLevel {
    self.threshold
  }

  fn emit(&self, event: &LogEvent) -> Result<(), String> {
    match event.level {
      LogLevel::Debug => tracing::debug!(
        target: "logforge",
        logger_name = %event.logger_name,
        event_id = %event.event_id,
        "{}", event.message
      ),
      LogLevel::Info => tracing::info!(
        target: "logforge",
        logger_name = %event.logger_name,
        event_id = %event.event_id,
        "{}", event.message
      ),
      LogLevel::Warning => tracing::warn!(
        target: "logforge",
        logger_name = %event.logger_name,
        event_id = %event.event_id,
        "{}", event.message
      ),
      LogLevel::Error => tracing::error!(
        target: "logforge",
        logger_name = %event.logger_name,
        event_id = %event.event_id,
        "{}", event.message
      ),
      LogLevel::Critical => tracing::error!(
        target: "logforge",
        logger_name = %event.logger_name,
        event_id = %event.event_id,
        critical = true,
        "{}", event.message
      ),
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::LogContext;
  use serde_json::Map;

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
  fn emit_never_fails_even_without_a_subscriber() {
    let sink = TracingBridgeSink::new(LogLevel::Debug);
    let event = LogEvent::new("a", LogLevel::Info, "hello", ctx(), Map::new());
    assert!(sink.emit(&event).is_ok());
  }
}
