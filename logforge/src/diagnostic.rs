//! Observable internal lifecycle/failure events, dispatched to a
//! caller-supplied hook. The hook call is wrapped in `catch_unwind` so a
//! misbehaving hook can never poison the pipeline.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// An observable internal lifecycle or failure event.
#[derive(Debug, Clone)]
pub enum DiagnosticEvent {
  Queued { event_id: String },
  Emitted { event_id: String, sink: String },
  RateLimited { logger_name: String },
  Dropped { event_id: String, reason: String },
  PayloadTruncated { event_id: String, message_bytes_dropped: usize, extra_bytes_dropped: usize },
  SinkFailed { sink: String, error: String },
  WorkerFailed { event_id: Option<String>, error: String, cooldown_ms: u64 },
  QueueShutdownTimeout { remaining: usize },
  SinkUnavailable { sink: String, reason: String },
}

/// Type-erased diagnostic callback.
pub type DiagnosticHook = Arc<dyn Fn(&DiagnosticEvent) + Send + Sync>;

/// Dispatches diagnostic events to an optional hook, isolating hook panics.
#[derive(Clone, Default)]
pub struct Diagnostics {
  hook: Option<DiagnosticHook>,
}

impl Diagnostics {
  pub fn new(hook: Option<DiagnosticHook>) -> Self {
    Self { hook }
  }

  pub fn emit(&self, event: DiagnosticEvent) {
    if let Some(hook) = &self.hook {
      let hook = Arc::clone(hook);
      let result = panic::catch_unwind(AssertUnwindSafe(|| hook(&event)));
      if result.is_err() {
        eprintln!("[logforge] diagnostic hook panicked; suppressing");
      }
    }
  }
}
