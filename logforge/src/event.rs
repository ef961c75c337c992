//! Immutable log events: plain, directly-inspectable fields rather than a
//! packed/interned representation, since nothing downstream (ring buffer,
//! dump engine, sinks) needs sub-microsecond allocation avoidance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::LogContext;
use crate::level::LogLevel;

static NEXT_EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Exception/error detail attached to an event, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionInfo {
  pub type_name: String,
  pub message: String,
  pub trace: String,
}

/// A single immutable log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
  pub event_id: String,
  pub timestamp: DateTime<Utc>,
  pub logger_name: String,
  pub level: LogLevel,
  pub message: String,
  pub context: LogContext,
  pub extra: Map<String, Value>,
  pub exception_info: Option<ExceptionInfo>,
}

impl LogEvent {
  /// Build a new event with a process-monotonic id and the current instant.
  pub fn new(
    logger_name: impl Into<String>,
    level: LogLevel,
    message: impl Into<String>,
    context: LogContext,
    extra: Map<String, Value>,
  ) -> Self {
    let seq = NEXT_EVENT_SEQ.fetch_add(1, Ordering::Relaxed);
    Self {
      event_id: format!("{:x}-{:016x}", std::process::id(), seq),
      timestamp: Utc::now(),
      logger_name: logger_name.into(),
      level,
      message: message.into(),
      context,
      extra,
      exception_info: None,
    }
  }

  pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
    self.exception_info = Some(exception);
    self
  }
}

impl fmt::Display for LogEvent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "[{}] {} {}: {}",
      self.timestamp.to_rfc3339(),
      self.level.code(),
      self.logger_name,
      self.message
    )
  }
}
