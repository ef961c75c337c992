//! Ambient context propagation: an immutable stack of metadata frames
//! scoped to the current task, safely carried across subprocess boundaries
//! via `serialize`/`deserialize`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;

use crate::error::{Error, Result};

const MAX_PID_CHAIN: usize = 8;

/// An immutable frame of ambient metadata, merged from the enclosing `bind()`
/// scopes on the current task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogContext {
  pub service: String,
  pub environment: String,
  pub job_id: String,
  pub request_id: Option<String>,
  pub user_id: Option<String>,
  pub user_name: Option<String>,
  pub hostname: Option<String>,
  pub trace_id: Option<String>,
  pub span_id: Option<String>,
  pub process_id: u32,
  pub process_id_chain: Vec<u32>,
  pub extra: Map<String, Value>,
}

/// Fields a caller may supply to `bind()`. All fields are optional at the
/// call site; required-ness is only enforced when the stack is empty.
#[derive(Debug, Clone, Default)]
pub struct ContextFields {
  pub service: Option<String>,
  pub environment: Option<String>,
  pub job_id: Option<String>,
  pub request_id: Option<String>,
  pub user_id: Option<String>,
  pub user_name: Option<String>,
  pub hostname: Option<String>,
  pub trace_id: Option<String>,
  pub span_id: Option<String>,
  pub extra: Map<String, Value>,
}

impl ContextFields {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn service(mut self, v: impl Into<String>) -> Self {
    self.service = Some(v.into());
    self
  }
  pub fn environment(mut self, v: impl Into<String>) -> Self {
    self.environment = Some(v.into());
    self
  }
  pub fn job_id(mut self, v: impl Into<String>) -> Self {
    self.job_id = Some(v.into());
    self
  }
  pub fn request_id(mut self, v: impl Into<String>) -> Self {
    self.request_id = Some(v.into());
    self
  }
  pub fn user_id(mut self, v: impl Into<String>) -> Self {
    self.user_id = Some(v.into());
    self
  }
  pub fn user_name(mut self, v: impl Into<String>) -> Self {
    self.user_name = Some(v.into());
    self
  }
  pub fn hostname(mut self, v: impl Into<String>) -> Self {
    self.hostname = Some(v.into());
    self
  }
  pub fn trace_id(mut self, v: impl Into<String>) -> Self {
    self.trace_id = Some(v.into());
    self
  }
  pub fn span_id(mut self, v: impl Into<String>) -> Self {
    self.span_id = Some(v.into());
    self
  }
  pub fn extra_field(mut self, key: impl Into<String>, value: Value) -> Self {
    self.extra.insert(key.into(), value);
    self
  }
}

fn non_empty(s: &Option<String>) -> Option<String> {
  s.as_ref().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Best-effort local hostname, used when a root `bind()` call doesn't supply
/// one explicitly. Returns `None` rather than failing the bind if the OS
/// call errors or the result isn't valid UTF-8.
fn default_hostname() -> Option<String> {
  gethostname::gethostname().into_string().ok()
}

thread_local! {
  static CONTEXT_STACK: RefCell<Vec<LogContext>> = const { RefCell::new(Vec::new()) };
}

/// Guard returned by [`ContextBinder::bind`]; pops the frame it pushed when
/// dropped, on every exit path including unwinding.
pub struct ContextScope {
  _private: (),
}

impl Drop for ContextScope {
  fn drop(&mut self) {
    CONTEXT_STACK.with(|stack| {
      stack.borrow_mut().pop();
    });
  }
}

/// Per-task stack of [`LogContext`] frames.
#[derive(Debug, Default)]
pub struct ContextBinder {
  current_pid: u32,
}

impl ContextBinder {
  pub fn new() -> Self {
    Self {
      current_pid: std::process::id(),
    }
  }

  /// Push a new context frame, inheriting and overlaying the parent frame
  /// when the stack is non-empty. When the stack is empty, `service`,
  /// `environment`, and `job_id` are mandatory.
  pub fn bind(&self, fields: ContextFields) -> Result<ContextScope> {
    let parent = CONTEXT_STACK.with(|stack| stack.borrow().last().cloned());

    let merged = match parent {
      Some(parent) => self.overlay(&parent, fields),
      None => self.root(fields)?,
    };

    CONTEXT_STACK.with(|stack| stack.borrow_mut().push(merged));
    Ok(ContextScope { _private: () })
  }

  fn root(&self, fields: ContextFields) -> Result<LogContext> {
    let service = non_empty(&fields.service);
    let environment = non_empty(&fields.environment);
    let job_id = non_empty(&fields.job_id);

    let mut missing = Vec::new();
    if service.is_none() {
      missing.push("service");
    }
    if environment.is_none() {
      missing.push("environment");
    }
    if job_id.is_none() {
      missing.push("job_id");
    }
    if !missing.is_empty() {
      return Err(Error::ContextIncomplete(missing.join(", ")));
    }

    Ok(LogContext {
      service: service.unwrap(),
      environment: environment.unwrap(),
      job_id: job_id.unwrap(),
      request_id: fields.request_id,
      user_id: fields.user_id,
      user_name: fields.user_name,
      hostname: fields.hostname.or_else(default_hostname),
      trace_id: fields.trace_id,
      span_id: fields.span_id,
      process_id: self.current_pid,
      process_id_chain: vec![self.current_pid],
      extra: fields.extra,
    })
  }

  fn overlay(&self, parent: &LogContext, fields: ContextFields) -> LogContext {
    let mut extra = parent.extra.clone();
    extra.extend(fields.extra);

    let mut chain = parent.process_id_chain.clone();
    if chain.last() != Some(&self.current_pid) {
      chain.push(self.current_pid);
      if chain.len() > MAX_PID_CHAIN {
        chain.remove(0);
      }
    }

    LogContext {
      service: fields.service.unwrap_or_else(|| parent.service.clone()),
      environment: fields
        .environment
        .unwrap_or_else(|| parent.environment.clone()),
      job_id: fields.job_id.unwrap_or_else(|| parent.job_id.clone()),
      request_id: fields.request_id.or_else(|| parent.request_id.clone()),
      user_id: fields.user_id.or_else(|| parent.user_id.clone()),
      user_name: fields.user_name.or_else(|| parent.user_name.clone()),
      hostname: fields.hostname.or_else(|| parent.hostname.clone()),
      trace_id: fields.trace_id.or_else(|| parent.trace_id.clone()),
      span_id: fields.span_id.or_else(|| parent.span_id.clone()),
      process_id: self.current_pid,
      process_id_chain: chain,
      extra,
    }
  }

  /// Snapshot of the innermost bound context on the current task, if any.
  pub fn current(&self) -> Option<LogContext> {
    CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
  }

  /// Serialize the entire stack (oldest to newest) for subprocess hand-off.
  pub fn serialize(&self) -> Result<String> {
    let stack = CONTEXT_STACK.with(|stack| stack.borrow().clone());
    serde_json::to_string(&stack).map_err(|e| Error::ConfigError(e.to_string()))
  }

  /// Restore a stack serialized by [`ContextBinder::serialize`], replacing
  /// whatever stack (if any) is present on the current task. This does *not*
  /// append the current PID to the chain -- that only happens on the next
  /// `bind()` at a fresh root.
  pub fn deserialize(&self, payload: &str) -> Result<()> {
    let stack: Vec<LogContext> =
      serde_json::from_str(payload).map_err(|e| Error::ConfigError(e.to_string()))?;
    CONTEXT_STACK.with(|cell| *cell.borrow_mut() = stack);
    Ok(())
  }
}
