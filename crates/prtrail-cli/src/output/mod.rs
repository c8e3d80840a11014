//! Output formatting for prtrail.
//!
//! Text output is one line per record, identifying fields first, for
//! grepping and piping. JSON output is pretty-printed; lists are wrapped in
//! a named envelope with a count.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Concise one-line-per-record text
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
}

/// Keys rendered first, without a label, when present.
const LEAD_KEYS: [&str; 3] = ["repo", "pr", "id"];

/// Body text longer than this is truncated in text output.
const MAX_TEXT_VALUE: usize = 80;

/// Formatter that can output data in text or JSON format
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format data according to the configured output format
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
            OutputFormat::Text => Ok(render_text(&serde_json::to_value(data)?)),
        }
    }

    /// Format and print data to stdout
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn print<T: Serialize>(&self, data: &T) -> Result<()> {
        let output = self.format(data)?;
        writeln!(io::stdout().lock(), "{output}")?;
        Ok(())
    }

    /// Format a list. JSON wraps it as `{<collection>: [...], count}`; text
    /// prints `empty_message` when there is nothing to show.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn format_list<T: Serialize>(
        &self,
        data: &[T],
        empty_message: &str,
        collection_name: &str,
    ) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let mut envelope = serde_json::Map::new();
                envelope.insert(collection_name.to_string(), serde_json::to_value(data)?);
                envelope.insert("count".to_string(), serde_json::json!(data.len()));
                Ok(serde_json::to_string_pretty(&Value::Object(envelope))?)
            }
            OutputFormat::Text if data.is_empty() => Ok(empty_message.to_string()),
            OutputFormat::Text => self.format(&data),
        }
    }

    /// Format and print a list
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn print_list<T: Serialize>(
        &self,
        data: &[T],
        empty_message: &str,
        collection_name: &str,
    ) -> Result<()> {
        let output = self.format_list(data, empty_message, collection_name)?;
        writeln!(io::stdout().lock(), "{output}")?;
        Ok(())
    }
}

/// Render a JSON value as concise text
fn render_text(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut parts: Vec<String> = LEAD_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .map(render_field_value)
                .collect();
            if let (Some(Value::String(repo)), Some(Value::Number(pr))) = (map.get("repo"), map.get("pr")) {
                parts.drain(..2);
                parts.insert(0, format!("{repo}#{pr}"));
            }

            for (key, val) in map {
                if LEAD_KEYS.contains(&key.as_str()) {
                    continue;
                }
                match val {
                    Value::Null => {}
                    Value::Array(arr) if arr.is_empty() => {}
                    _ => parts.push(format!("{key}:{}", render_field_value(val))),
                }
            }
            parts.join("  ")
        }
        Value::Array(arr) => arr.iter().map(render_text).collect::<Vec<_>>().join("\n"),
        _ => render_field_value(value),
    }
}

/// Render a single field value as concise text
fn render_field_value(value: &Value) -> String {
    match value {
        Value::String(s) => {
            let flat = s.replace('\n', "\\n");
            let flat = if flat.chars().count() > MAX_TEXT_VALUE {
                let cut: String = flat.chars().take(MAX_TEXT_VALUE).collect();
                format!("{cut}…")
            } else {
                flat
            };
            if flat.contains(' ') {
                format!("\"{flat}\"")
            } else {
                flat
            }
        }
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(render_field_value).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| format!("{k}:{}", render_field_value(v)))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
    }
}
