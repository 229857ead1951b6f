//! Best-effort structured extraction from free-form model replies
//!
//! Strategies are tried in a fixed order and the first one that yields a
//! mapping wins. None of them ever fails loudly: a reply nothing can read is
//! simply "no extraction".

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Raw key/value mapping recovered from a reply. Keys are not yet filtered
/// against the triage field set.
pub type Extraction = Map<String, Value>;

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*?\}").expect("JSON block pattern is valid"));

/// Extraction strategies in the order they are attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The whole reply is one JSON object
    WholeJson,
    /// The first minimal `{...}` block inside the reply is a JSON object
    EmbeddedBlock,
    /// `key: value` lines
    KeyValueLines,
}

impl Strategy {
    pub const ORDER: [Strategy; 3] = [
        Strategy::WholeJson,
        Strategy::EmbeddedBlock,
        Strategy::KeyValueLines,
    ];

    pub fn apply(self, reply: &str) -> Option<Extraction> {
        match self {
            Strategy::WholeJson => parse_object(reply),
            Strategy::EmbeddedBlock => parse_embedded_block(reply),
            Strategy::KeyValueLines => parse_key_value_lines(reply),
        }
    }
}

/// Run the strategies in order and keep the first success.
pub fn extract(reply: &str) -> Option<(Strategy, Extraction)> {
    Strategy::ORDER
        .iter()
        .find_map(|strategy| strategy.apply(reply).map(|found| (*strategy, found)))
}

fn parse_object(text: &str) -> Option<Extraction> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn parse_embedded_block(reply: &str) -> Option<Extraction> {
    let block = JSON_BLOCK.find(reply)?;
    parse_object(block.as_str())
}

fn parse_key_value_lines(reply: &str) -> Option<Extraction> {
    let mut found = Extraction::new();

    for line in reply.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let parts: Vec<&str> = line.split(':').map(str::trim).collect();
        if parts.len() < 2 {
            continue;
        }

        let key = normalize_key(parts[0]);
        let value = parts[1..].join(":").trim().to_string();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        found.insert(key, Value::String(value));
    }

    if found.is_empty() {
        None
    } else {
        Some(found)
    }
}

/// Lower-case, then map every character outside `[a-z0-9_]` to `_`.
fn normalize_key(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// String form of an extracted value.
///
/// `null` becomes the empty string so it never counts as a filled field, and
/// objects keep their JSON text. Neither is stored as the literal `"null"` or
/// an `[object]` placeholder.
pub fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(coerce_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Whether a value counts as present (`false`, `0`, `""` and `null` do not).
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
