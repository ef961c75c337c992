//! Error kinds returned to callers of the runtime façade.
//!
//! Caller-correctable errors are typed and returned; failures internal to a
//! sink or the queue worker are isolated and reported only through the
//! diagnostic hook (see `diagnostic.rs`), never raised here.

use thiserror::Error;

/// Errors surfaced by caller-facing operations (`init`, `bind`, `dump`,
/// `shutdown`, logger calls).
#[derive(Debug, Error)]
pub enum Error {
  /// A logger call happened with no bound context on the current task.
  #[error("no context bound on the current task; call bind() first")]
  ContextMissing,

  /// `bind()` was called at the root of the context stack without the
  /// required `service`/`environment`/`job_id` fields.
  #[error("context is missing required fields: {0}")]
  ContextIncomplete(String),

  /// An invalid combination of configuration options was supplied to `init`.
  #[error("invalid configuration: {0}")]
  ConfigError(String),

  /// `init` was called twice without an intervening `shutdown`.
  #[error("runtime is already initialized")]
  AlreadyInitialized,

  /// No runtime has been initialized yet.
  #[error("runtime has not been initialized")]
  NotInitialized,

  /// `enqueue` could not place the event on the queue within `put_timeout`.
  #[error("queue is full; event dropped")]
  QueueFull,

  /// `stop` could not drain the queue and join the worker within
  /// `queue_stop_timeout`.
  #[error("queue shutdown timed out with {remaining} event(s) still queued")]
  ShutdownTimeout {
    /// Number of events still queued when the timeout elapsed.
    remaining: usize,
  },

  /// A dump template referenced an unknown `{placeholder}`.
  #[error("unknown template placeholder: {0}")]
  TemplateError(String),

  /// A dump format string could not be parsed.
  #[error("unrecognized dump format: {0}")]
  InvalidDumpFormat(String),

  /// Writing a rendered dump to disk failed.
  #[error("failed to write dump to {path}: {source}")]
  DumpWrite {
    /// Destination path that failed to write.
    path: String,
    /// Underlying I/O error.
    #[source]
    source: std::io::Error,
  },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
