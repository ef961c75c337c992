//! Thin logger-name-bound façade, returned by `runtime::get`.

use serde_json::Map;
use std::sync::Weak;

use crate::error::{Error, Result};
use crate::level::LogLevel;
use crate::process_event::EventStatus;
use crate::runtime::{self, Runtime};

/// A handle bound to one logger name. Holds a weak, non-owning back
/// reference to the runtime it was obtained from rather than caching any
/// context: both the runtime and the current context are re-resolved on
/// every call, so a proxy outlives `shutdown()` without keeping a torn-down
/// runtime alive or dispatching into closed sinks.
pub struct LoggerProxy {
  name: String,
  runtime: Weak<Runtime>,
}

impl LoggerProxy {
  pub(crate) fn new(name: String, runtime: Weak<Runtime>) -> Self {
    Self { name, runtime }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  fn emit(&self, level: LogLevel, message: impl Into<String>, extra: Option<Map<String, serde_json::Value>>) -> Result<EventStatus> {
    let runtime = self.runtime.upgrade().ok_or(Error::NotInitialized)?;
    runtime::dispatch(&runtime, &self.name, level, message.into(), extra)
  }

  pub fn debug(&self, message: impl Into<String>, extra: Option<Map<String, serde_json::Value>>) -> Result<EventStatus> {
    self.emit(LogLevel::Debug, message, extra)
  }

  pub fn info(&self, message: impl Into<String>, extra: Option<Map<String, serde_json::Value>>) -> Result<EventStatus> {
    self.emit(LogLevel::Info, message, extra)
  }

  pub fn warning(&self, message: impl Into<String>, extra: Option<Map<String, serde_json::Value>>) -> Result<EventStatus> {
    self.emit(LogLevel::Warning, message, extra)
  }

  pub fn error(&self, message: impl Into<String>, extra: Option<Map<String, serde_json::Value>>) -> Result<EventStatus> {
    self.emit(LogLevel::Error, message, extra)
  }

  pub fn critical(&self, message: impl Into<String>, extra: Option<Map<String, serde_json::Value>>) -> Result<EventStatus> {
    self.emit(LogLevel::Critical, message, extra)
  }
}
