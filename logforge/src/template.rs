//! `{placeholder}` template rendering shared by the console sink and the
//! dump engine's TEXT format.

use chrono::{DateTime, Local, Utc};
use std::fmt::Write as _;

use crate::error::Error;
use crate::event::LogEvent;

/// Default template used when a caller does not supply one.
pub const DEFAULT_TEMPLATE: &str = "{timestamp} {level_code} {logger_name} {message}";

fn pid_chain(chain: &[u32]) -> String {
  chain
    .iter()
    .map(|p| p.to_string())
    .collect::<Vec<_>>()
    .join(">")
}

fn render_dict_deterministic(pairs: &serde_json::Map<String, serde_json::Value>) -> String {
  let mut keys: Vec<&String> = pairs.keys().collect();
  keys.sort();
  let mut out = String::from("{");
  for (i, key) in keys.iter().enumerate() {
    if i > 0 {
      out.push_str(", ");
    }
    let _ = write!(out, "{}: {}", key, pairs[*key]);
  }
  out.push('}');
  out
}

/// Resolve a single placeholder name to its rendered value for `event`.
/// Returns `None` for an unrecognized placeholder.
fn resolve(placeholder: &str, event: &LogEvent) -> Option<String> {
  let utc: DateTime<Utc> = event.timestamp;
  let local: DateTime<Local> = event.timestamp.with_timezone(&Local);

  Some(match placeholder {
    "timestamp" => utc.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
    "timestamp_loc" => local.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
    "YYYY" => utc.format("%Y").to_string(),
    "MM" => utc.format("%m").to_string(),
    "DD" => utc.format("%d").to_string(),
    "hh" => utc.format("%H").to_string(),
    "mm" => utc.format("%M").to_string(),
    "ss" => utc.format("%S").to_string(),
    "YYYY_loc" => local.format("%Y").to_string(),
    "MM_loc" => local.format("%m").to_string(),
    "DD_loc" => local.format("%d").to_string(),
    "hh_loc" => local.format("%H").to_string(),
    "mm_loc" => local.format("%M").to_string(),
    "ss_loc" => local.format("%S").to_string(),
    "level" => event.level.name().to_string(),
    "level_code" => event.level.code().to_string(),
    "level_icon" => event.level.icon().to_string(),
    "logger_name" => event.logger_name.clone(),
    "event_id" => event.event_id.clone(),
    "message" => event.message.clone(),
    "user_name" => event.context.user_name.clone().unwrap_or_default(),
    "hostname" => event.context.hostname.clone().unwrap_or_default(),
    "process_id" => event.context.process_id.to_string(),
    "process_id_chain" => pid_chain(&event.context.process_id_chain),
    "context" => render_context(event),
    "extra" => render_dict_deterministic(&event.extra),
    _ => return None,
  })
}

/// Deterministic rendering of an event's context dictionary, shared with
/// the dump engine's non-text formats.
pub fn render_context_public(event: &LogEvent) -> String {
  render_context(event)
}

fn render_context(event: &LogEvent) -> String {
  let mut map = serde_json::Map::new();
  map.insert("service".into(), event.context.service.clone().into());
  map.insert("environment".into(), event.context.environment.clone().into());
  map.insert("job_id".into(), event.context.job_id.clone().into());
  if let Some(v) = &event.context.request_id {
    map.insert("request_id".into(), v.clone().into());
  }
  if let Some(v) = &event.context.user_id {
    map.insert("user_id".into(), v.clone().into());
  }
  if let Some(v) = &event.context.user_name {
    map.insert("user_name".into(), v.clone().into());
  }
  if let Some(v) = &event.context.hostname {
    map.insert("hostname".into(), v.clone().into());
  }
  if let Some(v) = &event.context.trace_id {
    map.insert("trace_id".into(), v.clone().into());
  }
  if let Some(v) = &event.context.span_id {
    map.insert("span_id".into(), v.clone().into());
  }
  map.insert("process_id".into(), event.context.process_id.into());
  map.insert(
    "process_id_chain".into(),
    pid_chain(&event.context.process_id_chain).into(),
  );
  if !event.context.extra.is_empty() {
    map.insert("extra".into(), serde_json::Value::Object(event.context.extra.clone()));
  }
  render_dict_deterministic(&map)
}

/// Render `template` against `event`. Standard Rust format-spec modifiers
/// (`{placeholder:>10}`, etc.) are honored by routing the resolved string
/// back through `format!`.
pub fn render(template: &str, event: &LogEvent) -> Result<String, Error> {
  let mut out = String::with_capacity(template.len() + 32);
  let mut chars = template.char_indices().peekable();

  while let Some((idx, ch)) = chars.next() {
    if ch != '{' {
      out.push(ch);
      continue;
    }
    let end = template[idx..]
      .find('}')
      .map(|offset| idx + offset)
      .ok_or_else(|| Error::TemplateError(format!("unterminated placeholder near: {template}")))?;
    let body = &template[idx + 1..end];
    let (name, spec) = match body.split_once(':') {
      Some((n, s)) => (n, Some(s)),
      None => (body, None),
    };

    let value = resolve(name, event).ok_or_else(|| Error::TemplateError(name.to_string()))?;
    match spec {
      Some(spec) => {
        let fmt = format!("{{:{spec}}}", spec = spec);
        out.push_str(&dyn_format(&fmt, &value));
      },
      None => out.push_str(&value),
    }

    // Skip consumed chars up to and including the closing brace.
    while let Some(&(next_idx, _)) = chars.peek() {
      if next_idx > end {
        break;
      }
      chars.next();
    }
  }

  Ok(out)
}

/// Apply a `{:spec}` format string to a string value. Supports width and
/// alignment, the common case for log templates.
fn dyn_format(spec_template: &str, value: &str) -> String {
  // `spec_template` is always of the shape "{:<spec>}"; we only support the
  // width/alignment subset, which `format!` handles natively for `&str`
  // once the spec is a literal -- so we parse it by hand into a small
  // enum rather than relying on runtime format strings (which Rust's
  // `format!` macro cannot take dynamically).
  let spec = &spec_template[2..spec_template.len() - 1];
  let (fill, align, width) = parse_spec(spec);
  let len = value.chars().count();
  if width <= len {
    return value.to_string();
  }
  let pad = width - len;
  match align {
    Align::Left => format!("{value}{}", fill.to_string().repeat(pad)),
    Align::Right => format!("{}{value}", fill.to_string().repeat(pad)),
    Align::Center => {
      let left = pad / 2;
      let right = pad - left;
      format!(
        "{}{value}{}",
        fill.to_string().repeat(left),
        fill.to_string().repeat(right)
      )
    },
  }
}

enum Align {
  Left,
  Right,
  Center,
}

fn parse_spec(spec: &str) -> (char, Align, usize) {
  let mut chars: Vec<char> = spec.chars().collect();
  let mut fill = ' ';
  let mut align = Align::Left;

  if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^') {
    fill = chars[0];
    align = match chars[1] {
      '<' => Align::Left,
      '>' => Align::Right,
      _ => Align::Center,
    };
    chars.drain(0..2);
  } else if !chars.is_empty() && matches!(chars[0], '<' | '>' | '^') {
    align = match chars[0] {
      '<' => Align::Left,
      '>' => Align::Right,
      _ => Align::Center,
    };
    chars.remove(0);
  }

  let width: usize = chars.iter().collect::<String>().parse().unwrap_or(0);
  (fill, align, width)
}
