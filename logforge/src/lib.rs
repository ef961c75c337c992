pub mod buffer;
pub mod context;
pub mod diagnostic;
pub mod dump;
pub mod error;
pub mod event;
pub mod level;
pub mod logger_proxy;
pub mod panic_hook;
pub mod process_event;
pub mod queue;
pub mod rate_limit;
pub mod runtime;
pub mod scrub;
pub mod sink;
pub mod template;

#[cfg(unix)]
pub mod signal_hook;

pub extern crate logforge_macros;
pub use serde_json;

pub use context::{ContextBinder, ContextFields, ContextScope, LogContext};
pub use error::{Error, Result};
pub use event::LogEvent;
pub use level::{DumpFormat, LogLevel};
pub use logger_proxy::LoggerProxy;
pub use runtime::{bind, dump, get, get_minimum_log_level, init, shutdown, DumpOverrides, RuntimeConfig};
