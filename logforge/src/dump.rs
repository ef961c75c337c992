//! On-demand rendering of the retained event history: deterministic
//! TEXT/JSON/HTML_TABLE/HTML_TXT output, with an optional atomic
//! create-or-truncate write to disk.

use serde_json::{json, Value};
use std::fs::File;
use std::io::Write as _;
use std::path::Path;

use crate::buffer::RingBuffer;
use crate::error::{Error, Result};
use crate::event::LogEvent;
use crate::level::{DumpFormat, LogLevel};
use crate::template::{self, DEFAULT_TEMPLATE};

/// Parameters accepted by [`dump`].
#[derive(Debug, Clone)]
pub struct DumpOptions {
  pub format: DumpFormat,
  pub min_level: Option<LogLevel>,
  pub template: Option<String>,
  pub color: bool,
  pub path: Option<String>,
  /// Clear the ring buffer after a successful render. Default `false`: a
  /// dump is a read, not a drain, so repeated dumps (e.g. the panic hook
  /// firing once, then a caller dumping again for their own records) see
  /// the same history unless they opt in.
  pub flush_after: bool,
}

impl Default for DumpOptions {
  fn default() -> Self {
    Self {
      format: DumpFormat::Text,
      min_level: None,
      template: None,
      color: false,
      path: None,
      flush_after: false,
    }
  }
}

/// Take a stable snapshot from the ring buffer and delegate rendering.
pub fn capture(ring_buffer: &RingBuffer<LogEvent>, options: &DumpOptions) -> Result<String> {
  let mut events = ring_buffer.snapshot();
  if let Some(min_level) = options.min_level {
    events.retain(|event| event.level >= min_level);
  }
  let rendered = render(&events, options)?;

  if let Some(path) = &options.path {
    write_atomic(path, &rendered)?;
  }
  if options.flush_after {
    ring_buffer.flush();
  }
  Ok(rendered)
}

fn write_atomic(path: &str, contents: &str) -> Result<()> {
  let mut file = File::create(Path::new(path)).map_err(|source| Error::DumpWrite {
    path: path.to_string(),
    source,
  })?;
  file.write_all(contents.as_bytes()).map_err(|source| Error::DumpWrite {
    path: path.to_string(),
    source,
  })?;
  file.sync_all().map_err(|source| Error::DumpWrite {
    path: path.to_string(),
    source,
  })
}

fn render(events: &[LogEvent], options: &DumpOptions) -> Result<String> {
  match options.format {
    DumpFormat::Text => render_text(events, options.template.as_deref().unwrap_or(DEFAULT_TEMPLATE)),
    DumpFormat::Json => render_json(events),
    DumpFormat::HtmlTable => Ok(render_html_table(events, options.color)),
    DumpFormat::HtmlTxt => render_html_txt(events, options),
  }
}

fn render_text(events: &[LogEvent], tmpl: &str) -> Result<String> {
  let mut lines = Vec::with_capacity(events.len());
  for event in events {
    lines.push(template::render(tmpl, event)?);
  }
  Ok(lines.join("\n"))
}

fn event_to_json(event: &LogEvent) -> Value {
  let exception = event.exception_info.as_ref().map(|exc| {
    json!({
      "type": exc.type_name,
      "message": exc.message,
      "trace": exc.trace,
    })
  });

  json!({
    "event_id": event.event_id,
    "timestamp": event.timestamp.to_rfc3339(),
    "logger_name": event.logger_name,
    "level": event.level.name(),
    "message": event.message,
    "context": {
      "service": event.context.service,
      "environment": event.context.environment,
      "job_id": event.context.job_id,
      "request_id": event.context.request_id,
      "user_id": event.context.user_id,
      "user_name": event.context.user_name,
      "hostname": event.context.hostname,
      "trace_id": event.context.trace_id,
      "span_id": event.context.span_id,
      "process_id": event.context.process_id,
      "process_id_chain": event.context.process_id_chain,
    },
    "extra": event.extra,
    "exception_info": exception,
  })
}

fn render_json(events: &[LogEvent]) -> Result<String> {
  let array: Vec<Value> = events.iter().map(event_to_json).collect();
  serde_json::to_string_pretty(&array).map_err(|e| Error::TemplateError(e.to_string()))
}

fn html_escape(s: &str) -> String {
  s.replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
}

fn level_css_class(level: LogLevel) -> &'static str {
  match level {
    LogLevel::Debug => "lvl-debug",
    LogLevel::Info => "lvl-info",
    LogLevel::Warning => "lvl-warning",
    LogLevel::Error => "lvl-error",
    LogLevel::Critical => "lvl-critical",
  }
}

fn render_html_table(events: &[LogEvent], color: bool) -> String {
  let mut out = String::from("<table class=\"logforge-dump\">\n<thead><tr><th>timestamp</th><th>level</th><th>logger_name</th><th>event_id</th><th>message</th><th>context</th></tr></thead>\n<tbody>\n");
  for event in events {
    let row_class = if color { level_css_class(event.level) } else { "" };
    out.push_str(&format!(
      "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
      row_class,
      html_escape(&event.timestamp.to_rfc3339()),
      html_escape(event.level.name()),
      html_escape(&event.logger_name),
      html_escape(&event.event_id),
      html_escape(&event.message),
      html_escape(&template::render_context_public(event)),
    ));
  }
  out.push_str("</tbody>\n</table>\n");
  out
}

fn render_html_txt(events: &[LogEvent], options: &DumpOptions) -> Result<String> {
  let tmpl = options.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
  let body = render_text(events, tmpl)?;
  let body = html_escape(&body);
  let class = if options.color { "logforge-dump-colored" } else { "logforge-dump-plain" };
  Ok(format!("<pre class=\"{class}\">\n{body}\n</pre>\n"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::LogContext;
  use serde_json::Map;
  use tempfile::tempdir;

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

  fn ring_with(events: Vec<LogEvent>) -> RingBuffer<LogEvent> {
    let ring = RingBuffer::new(16);
    for e in events {
      ring.append(e);
    }
    ring
  }

  #[test]
  fn text_dump_produces_one_line_per_event() {
    let ring = ring_with(vec![
      LogEvent::new("a", LogLevel::Info, "first", ctx(), Map::new()),
      LogEvent::new("a", LogLevel::Warning, "second", ctx(), Map::new()),
    ]);
    let rendered = capture(&ring, &DumpOptions::default()).unwrap();
    assert_eq!(rendered.lines().count(), 2);
  }

  #[test]
  fn level_filter_drops_below_minimum() {
    let ring = ring_with(vec![
      LogEvent::new("a", LogLevel::Debug, "low", ctx(), Map::new()),
      LogEvent::new("a", LogLevel::Error, "high", ctx(), Map::new()),
    ]);
    let options = DumpOptions {
      min_level: Some(LogLevel::Warning),
      ..DumpOptions::default()
    };
    let rendered = capture(&ring, &options).unwrap();
    assert_eq!(rendered.lines().count(), 1);
    assert!(rendered.contains("high"));
  }

  #[test]
  fn json_dump_is_deterministic() {
    let ring = ring_with(vec![LogEvent::new("a", LogLevel::Info, "hi", ctx(), Map::new())]);
    let options = DumpOptions {
      format: DumpFormat::Json,
      ..DumpOptions::default()
    };
    let first = capture(&ring, &options).unwrap();
    let second = capture(&ring, &options).unwrap();
    assert_eq!(first, second);
  }

  #[test]
  fn dump_does_not_clear_ring_buffer() {
    let ring = ring_with(vec![LogEvent::new("a", LogLevel::Info, "hi", ctx(), Map::new())]);
    capture(&ring, &DumpOptions::default()).unwrap();
    assert_eq!(ring.len(), 1);
  }

  #[test]
  fn flush_after_clears_ring_buffer() {
    let ring = ring_with(vec![LogEvent::new("a", LogLevel::Info, "hi", ctx(), Map::new())]);
    let options = DumpOptions {
      flush_after: true,
      ..DumpOptions::default()
    };
    capture(&ring, &options).unwrap();
    assert!(ring.is_empty());
  }

  #[test]
  fn html_table_contains_level_class_when_colored() {
    let ring = ring_with(vec![LogEvent::new("a", LogLevel::Critical, "oh no", ctx(), Map::new())]);
    let options = DumpOptions {
      format: DumpFormat::HtmlTable,
      color: true,
      ..DumpOptions::default()
    };
    let rendered = capture(&ring, &options).unwrap();
    assert!(rendered.contains("lvl-critical"));
  }

  #[test]
  fn unknown_placeholder_surfaces_template_error() {
    let ring = ring_with(vec![LogEvent::new("a", LogLevel::Info, "hi", ctx(), Map::new())]);
    let options = DumpOptions {
      template: Some("{oops}".to_string()),
      ..DumpOptions::default()
    };
    let err = capture(&ring, &options).unwrap_err();
    assert!(matches!(err, Error::TemplateError(_)));
  }

  #[test]
  fn writes_to_file_atomically() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dump.txt");
    let ring = ring_with(vec![LogEvent::new("a", LogLevel::Info, "hi", ctx(), Map::new())]);
    let options = DumpOptions {
      path: Some(path.to_string_lossy().to_string()),
      ..DumpOptions::default()
    };
    capture(&ring, &options).unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("hi"));
  }
}
