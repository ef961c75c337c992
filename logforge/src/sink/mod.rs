//! Sink ports -- abstract delivery destinations, each owning its own
//! severity gate.

pub mod console;
pub mod graylog;
pub mod structured;
pub mod tracing_bridge;

use crate::event::LogEvent;
use crate::level::LogLevel;

/// A destination for events: console, a structured OS-style backend, or a
/// central aggregator (Graylog/GELF). The core treats every implementation
/// uniformly; concrete wire formats are owned by the sink.
pub trait Sink: Send + Sync {
  /// Stable identifier used in diagnostics (`sink_failed`, etc).
  fn name(&self) -> &str;

  /// This sink's severity gate; events below this level are never delivered.
  fn threshold(&self) -> LogLevel;

  /// Deliver one event. Errors are caught by the fan-out caller and never
  /// allowed to affect sibling sinks.
  fn emit(&self, event: &LogEvent) -> Result<(), String>;

  /// Best-effort flush of any buffered output. Default: no-op.
  fn flush(&self) -> Result<(), String> {
    Ok(())
  }

  /// Called once during runtime shutdown, after the final flush. Default:
  /// no-op.
  fn close(&self) {}
}
