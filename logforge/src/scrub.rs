//! Field redaction: substitute sensitive field values with a fixed
//! placeholder before an event leaves the pipeline. Matches field names by
//! regex, case-insensitively, and walks one level of nested maps.

use regex::Regex;
use serde_json::{Map, Value};

const PLACEHOLDER: &str = "***";

/// A single field-name-regex -> value-regex redaction rule.
struct Rule {
  field_name: Regex,
  value: Regex,
}

/// Redacts sensitive field values by field-name match.
pub struct Scrubber {
  rules: Vec<Rule>,
}

impl Scrubber {
  /// Build a scrubber from `(field-name-regex, value-regex)` pairs. Patterns
  /// are matched case-insensitively against field names.
  pub fn new(patterns: &[(String, String)]) -> Result<Self, regex::Error> {
    let mut rules = Vec::with_capacity(patterns.len());
    for (field_pattern, value_pattern) in patterns {
      let field_name = Regex::new(&format!("(?i){field_pattern}"))?;
      let value = Regex::new(value_pattern)?;
      rules.push(Rule { field_name, value });
    }
    Ok(Self { rules })
  }

  /// The default policy: `password|secret|token` field names, full-value
  /// redaction.
  pub fn default_policy() -> Self {
    Self::new(&[("password|secret|token".to_string(), ".*".to_string())])
      .expect("default scrub patterns are valid regex")
  }

  /// Scrub a mapping in place, walking one level of nested objects.
  pub fn scrub(&self, fields: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(fields.len());
    for (key, value) in fields {
      out.insert(key.clone(), self.scrub_value(key, value));
    }
    out
  }

  fn scrub_value(&self, key: &str, value: &Value) -> Value {
    if self.matches(key) && self.value_matches(&Self::coerce_to_string(value)) {
      return Value::String(PLACEHOLDER.to_string());
    }

    if let Value::Object(nested) = value {
      let mut redacted = Map::with_capacity(nested.len());
      for (nested_key, nested_value) in nested {
        let coerced = Self::coerce_to_string(nested_value);
        if self.matches(nested_key) && self.value_matches(&coerced) {
          redacted.insert(nested_key.clone(), Value::String(PLACEHOLDER.to_string()));
        } else {
          redacted.insert(nested_key.clone(), nested_value.clone());
        }
      }
      return Value::Object(redacted);
    }

    value.clone()
  }

  fn matches(&self, field_name: &str) -> bool {
    self.rules.iter().any(|rule| rule.field_name.is_match(field_name))
  }

  fn value_matches(&self, value_as_string: &str) -> bool {
    self
      .rules
      .iter()
      .any(|rule| rule.value.is_match(value_as_string))
  }

  fn coerce_to_string(value: &Value) -> String {
    match value {
      Value::String(s) => s.clone(),
      other => other.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn redacts_matching_top_level_field() {
    let scrubber = Scrubber::default_policy();
    let mut fields = Map::new();
    fields.insert("user".into(), json!("alice"));
    fields.insert("password".into(), json!("p@ss"));

    let scrubbed = scrubber.scrub(&fields);
    assert_eq!(scrubbed["user"], json!("alice"));
    assert_eq!(scrubbed["password"], json!("***"));
  }

  #[test]
  fn field_name_match_is_case_insensitive() {
    let scrubber = Scrubber::default_policy();
    let mut fields = Map::new();
    fields.insert("PASSWORD".into(), json!("p@ss"));
    let scrubbed = scrubber.scrub(&fields);
    assert_eq!(scrubbed["PASSWORD"], json!("***"));
  }

  #[test]
  fn walks_one_level_of_nesting() {
    let scrubber = Scrubber::default_policy();
    let mut nested = Map::new();
    nested.insert("token".into(), json!("abc123"));
    nested.insert("id".into(), json!(42));

    let mut fields = Map::new();
    fields.insert("auth".into(), Value::Object(nested));

    let scrubbed = scrubber.scrub(&fields);
    let auth = scrubbed["auth"].as_object().unwrap();
    assert_eq!(auth["token"], json!("***"));
    assert_eq!(auth["id"], json!(42));
  }

  #[test]
  fn value_regex_is_enforced_regardless_of_nesting_depth() {
    let scrubber = Scrubber::new(&[("apikey".to_string(), "^[A-Za-z0-9]{10,}$".to_string())]).unwrap();

    let mut nested = Map::new();
    nested.insert("apikey".into(), json!("x"));
    let mut fields = Map::new();
    fields.insert("apikey".into(), json!("x"));
    fields.insert("auth".into(), Value::Object(nested));

    let scrubbed = scrubber.scrub(&fields);
    // A value that fails the value regex is left alone at every depth.
    assert_eq!(scrubbed["apikey"], json!("x"));
    assert_eq!(scrubbed["auth"].as_object().unwrap()["apikey"], json!("x"));
  }

  #[test]
  fn scrub_is_idempotent() {
    let scrubber = Scrubber::default_policy();
    let mut fields = Map::new();
    fields.insert("secret".into(), json!("v"));
    let once = scrubber.scrub(&fields);
    let twice = scrubber.scrub(&once);
    assert_eq!(once, twice);
  }
}
