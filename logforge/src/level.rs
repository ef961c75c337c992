//! Severity levels and dump render formats.
//!
//! The variant set, 4-char codes, icons and syslog numbers are frozen for
//! compatibility once chosen; see `LogLevel::parse` for the case-insensitive
//! name form.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Log severity, ordered `DEBUG < INFO < WARNING < ERROR < CRITICAL`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
  Debug = 0,
  Info = 1,
  Warning = 2,
  Error = 3,
  Critical = 4,
}

impl LogLevel {
  /// All variants in ascending severity order.
  pub const ALL: [LogLevel; 5] = [
    LogLevel::Debug,
    LogLevel::Info,
    LogLevel::Warning,
    LogLevel::Error,
    LogLevel::Critical,
  ];

  /// Four-character code, e.g. `"WARN"`.
  pub fn code(self) -> &'static str {
    match self {
      LogLevel::Debug => "DEBG",
      LogLevel::Info => "INFO",
      LogLevel::Warning => "WARN",
      LogLevel::Error => "ERRO",
      LogLevel::Critical => "CRIT",
    }
  }

  /// Short icon string used by the console sink.
  pub fn icon(self) -> &'static str {
    match self {
      LogLevel::Debug => "🔍",
      LogLevel::Info => "ℹ",
      LogLevel::Warning => "⚠",
      LogLevel::Error => "✖",
      LogLevel::Critical => "☠",
    }
  }

  /// Full uppercase name, e.g. `"WARNING"`.
  pub fn name(self) -> &'static str {
    match self {
      LogLevel::Debug => "DEBUG",
      LogLevel::Info => "INFO",
      LogLevel::Warning => "WARNING",
      LogLevel::Error => "ERROR",
      LogLevel::Critical => "CRITICAL",
    }
  }

  /// Syslog-equivalent integer (RFC 5424 severities, collapsed to this
  /// library's five levels).
  pub fn syslog_priority(self) -> u8 {
    match self {
      LogLevel::Debug => 7,
      LogLevel::Info => 6,
      LogLevel::Warning => 4,
      LogLevel::Error => 3,
      LogLevel::Critical => 2,
    }
  }

  /// Case-insensitive parse, returning `None` on an unknown string. The
  /// caller decides the fallback: a mis-typed level in config is worth
  /// surfacing rather than silently defaulting.
  pub fn parse(s: &str) -> Option<LogLevel> {
    match s.to_ascii_uppercase().as_str() {
      "DEBUG" | "DEBG" => Some(LogLevel::Debug),
      "INFO" => Some(LogLevel::Info),
      "WARNING" | "WARN" => Some(LogLevel::Warning),
      "ERROR" | "ERRO" => Some(LogLevel::Error),
      "CRITICAL" | "CRIT" => Some(LogLevel::Critical),
      _ => None,
    }
  }
}

impl PartialOrd for LogLevel {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for LogLevel {
  fn cmp(&self, other: &Self) -> Ordering {
    (*self as u8).cmp(&(*other as u8))
  }
}

impl fmt::Display for LogLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Output formats supported by the dump engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DumpFormat {
  Text,
  Json,
  HtmlTable,
  HtmlTxt,
}

impl DumpFormat {
  /// Case-insensitive parse, accepting `-`/`_` as separators.
  pub fn parse(s: &str) -> Option<DumpFormat> {
    match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
      "text" | "txt" => Some(DumpFormat::Text),
      "json" => Some(DumpFormat::Json),
      "htmltable" => Some(DumpFormat::HtmlTable),
      "htmltxt" => Some(DumpFormat::HtmlTxt),
      _ => None,
    }
  }
}

impl fmt::Display for DumpFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      DumpFormat::Text => "text",
      DumpFormat::Json => "json",
      DumpFormat::HtmlTable => "html_table",
      DumpFormat::HtmlTxt => "html_txt",
    };
    f.write_str(s)
  }
}
