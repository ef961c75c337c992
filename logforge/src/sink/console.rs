//! Console sink: ANSI color table, a reused scratch buffer guarded by a
//! mutex, and a memoized per-level style cache to keep the hot path
//! allocation-free.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Write};

use crate::event::LogEvent;
use crate::level::LogLevel;
use crate::sink::Sink;
use crate::template::{self, DEFAULT_TEMPLATE};

const RESET: &str = "\x1b[0m";

/// ANSI style applied around a level's rendered code.
#[derive(Debug, Clone)]
pub struct Style {
  pub ansi_prefix: String,
}

impl Style {
  pub fn new(ansi_prefix: impl Into<String>) -> Self {
    Self {
      ansi_prefix: ansi_prefix.into(),
    }
  }

  fn wrap(&self, text: &str) -> String {
    format!("{}{}{}", self.ansi_prefix, text, RESET)
  }
}

fn default_styles() -> HashMap<LogLevel, Style> {
  let mut styles = HashMap::with_capacity(LogLevel::ALL.len());
  styles.insert(LogLevel::Debug, Style::new("\x1b[36m"));
  styles.insert(LogLevel::Info, Style::new("\x1b[32m"));
  styles.insert(LogLevel::Warning, Style::new("\x1b[33m"));
  styles.insert(LogLevel::Error, Style::new("\x1b[31m"));
  styles.insert(LogLevel::Critical, Style::new("\x1b[35m"));
  styles
}

/// Renders events to stdout with a configurable template and optional color.
pub struct ConsoleSink {
  threshold: LogLevel,
  template: String,
  color: bool,
  styles: HashMap<LogLevel, Style>,
  buffer: Mutex<String>,
}

impl ConsoleSink {
  pub fn new(threshold: LogLevel) -> Self {
    Self {
      threshold,
      template: DEFAULT_TEMPLATE.to_string(),
      color: true,
      styles: default_styles(),
      buffer: Mutex::new(String::with_capacity(256)),
    }
  }

  pub fn with_template(mut self, template: impl Into<String>) -> Self {
    self.template = template.into();
    self
  }

  pub fn with_color(mut self, color: bool) -> Self {
    self.color = color;
    self
  }

  pub fn with_styles(mut self, styles: HashMap<LogLevel, Style>) -> Self {
    self.styles = styles;
    self
  }
}

impl Sink for ConsoleSink {
  fn name(&self) -> &str {
    "console"
  }

  fn threshold(&self) -> LogLevel {
    self.threshold
  }

  fn emit(&self, event: &LogEvent) -> Result<(), String> {
    let rendered = template::render(&self.template, event).map_err(|e| e.to_string())?;

    let mut buf = self.buffer.lock();
    buf.clear();
    if self.color {
      if let Some(style) = self.styles.get(&event.level) {
        buf.push_str(&style.wrap(&rendered));
      } else {
        buf.push_str(&rendered);
      }
    } else {
      buf.push_str(&rendered);
    }
    buf.push('\n');

    io::stdout()
      .write_all(buf.as_bytes())
      .map_err(|e| e.to_string())
  }

  fn flush(&self) -> Result<(), String> {
    io::stdout().flush().map_err(|e| e.to_string())
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
  fn emits_without_error() {
    let sink = ConsoleSink::new(LogLevel::Info);
    let event = LogEvent::new("a", LogLevel::Info, "hello", ctx(), Map::new());
    sink.emit(&event).unwrap();
  }

  #[test]
  fn threshold_is_reported() {
    let sink = ConsoleSink::new(LogLevel::Warning);
    assert_eq!(sink.threshold(), LogLevel::Warning);
  }
}
