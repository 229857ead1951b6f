//! Pre-consultation triage
//!
//! Collects a fixed set of facts from the user before they join the queue.
//! Each user utterance is sent to the text generator, whatever the model
//! answers is mined for fields, and the result is merged over the state the
//! caller threads through. The reducer itself never touches storage.

pub mod extract;
mod service;

#[cfg(test)]
mod proptests;

pub use service::{TriageService, TriageServiceError};

use crate::llm::{GenerationRequest, LlmError, TextGenerator};
use extract::{coerce_to_string, is_truthy, Extraction};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

pub const TRIAGE_SYSTEM: &str = "You are a triage assistant for collecting a user's details before a consultation. Return a JSON object with keys: name, birth_date (YYYY-MM-DD if known), birth_time (HH:MM or unknown), place (city, country), question (their short question). If you must ask a follow-up, reply primarily with a short JSON object containing the fields you know and nothing else, or a short plain-text follow-up question. Keep the follow-up question concise.";

/// Extraction wants determinism, not variety
pub const TRIAGE_TEMPERATURE: f32 = 0.0;

/// Model-suggested questions at or above this length are ignored
const MAX_SUGGESTED_QUESTION_CHARS: usize = 200;

/// The closed set of triage fields, in the order they are asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageField {
    Name,
    BirthDate,
    BirthTime,
    Place,
    Question,
}

impl TriageField {
    pub const ALL: [TriageField; 5] = [
        TriageField::Name,
        TriageField::BirthDate,
        TriageField::BirthTime,
        TriageField::Place,
        TriageField::Question,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TriageField::Name => "name",
            TriageField::BirthDate => "birth_date",
            TriageField::BirthTime => "birth_time",
            TriageField::Place => "place",
            TriageField::Question => "question",
        }
    }

    /// Case-insensitive lookup of a field by key
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.to_lowercase();
        Self::ALL.into_iter().find(|f| f.as_str() == key)
    }
}

impl fmt::Display for TriageField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields collected so far for one chat.
///
/// Serializes as a flat JSON object keyed by field name. Deserializing is
/// lenient: unknown keys are dropped and non-string values are coerced, so
/// whatever was persisted before can always be read back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "BTreeMap<TriageField, String>")]
pub struct TriageState {
    fields: BTreeMap<TriageField, String>,
}

impl TriageState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a field, if set. Empty strings count as unset.
    pub fn get(&self, field: TriageField) -> Option<&str> {
        self.fields
            .get(&field)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, field: TriageField, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    pub fn is_set(&self, field: TriageField) -> bool {
        self.get(field).is_some()
    }

    /// Unset fields, in asking order
    pub fn missing_fields(&self) -> Vec<TriageField> {
        TriageField::ALL
            .into_iter()
            .filter(|f| !self.is_set(*f))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        TriageField::ALL.iter().all(|f| self.is_set(*f))
    }

    pub fn phase(&self) -> TriagePhase {
        if self.is_complete() {
            TriagePhase::Complete
        } else {
            TriagePhase::Collecting
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TriageField, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// Read persisted meta. Anything that is not an object reads as empty.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::from(map.clone()),
            _ => Self::default(),
        }
    }

    /// Overlay extracted values in reply order, so when two keys name the
    /// same field the later one wins. Keys outside the field set, and values
    /// that are empty once trimmed, leave the state untouched.
    fn merge(&mut self, extraction: &Extraction) {
        for (key, value) in extraction {
            let Some(field) = TriageField::from_key(key) else {
                continue;
            };
            let value = coerce_to_string(value);
            let value = value.trim();
            if !value.is_empty() {
                self.set(field, value);
            }
        }
    }
}

impl From<Map<String, Value>> for TriageState {
    fn from(map: Map<String, Value>) -> Self {
        let fields = map
            .iter()
            .filter_map(|(k, v)| TriageField::from_key(k).map(|f| (f, coerce_to_string(v))))
            .collect();
        Self { fields }
    }
}

impl From<TriageState> for BTreeMap<TriageField, String> {
    fn from(state: TriageState) -> Self {
        state.fields
    }
}

impl<S: Into<String>> FromIterator<(TriageField, S)> for TriageState {
    fn from_iter<I: IntoIterator<Item = (TriageField, S)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }
}

/// Per-chat triage phase. `Complete` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriagePhase {
    Collecting,
    Complete,
}

/// Result of one triage turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageOutcome {
    Complete {
        meta: TriageState,
    },
    NeedsMore {
        follow_up_question: String,
        meta: TriageState,
    },
}

impl TriageOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, TriageOutcome::Complete { .. })
    }

    pub fn meta(&self) -> &TriageState {
        match self {
            TriageOutcome::Complete { meta } | TriageOutcome::NeedsMore { meta, .. } => meta,
        }
    }

    pub fn follow_up_question(&self) -> Option<&str> {
        match self {
            TriageOutcome::Complete { .. } => None,
            TriageOutcome::NeedsMore {
                follow_up_question, ..
            } => Some(follow_up_question.as_str()),
        }
    }

    pub fn into_meta(self) -> TriageState {
        match self {
            TriageOutcome::Complete { meta } | TriageOutcome::NeedsMore { meta, .. } => meta,
        }
    }
}

/// Templated question for a field, in the presentation language
pub fn ask_for(field: TriageField) -> String {
    format!("कृपया अपना {field} बताइए।")
}

/// Build the generation request for one user utterance.
pub fn build_request(current: &TriageState, user_message: &str) -> GenerationRequest {
    let snapshot = serde_json::to_string(current).unwrap_or_else(|_| "{}".to_string());
    GenerationRequest::new(
        TRIAGE_SYSTEM,
        format!("USER_MESSAGE:\n{user_message}\n\nCURRENT_META:\n{snapshot}"),
        TRIAGE_TEMPERATURE,
    )
}

/// Pure step: fold a model reply into the current state.
///
/// Never fails. A reply nothing can be extracted from simply leads to the
/// templated question for the first missing field.
pub fn reduce(current: &TriageState, reply: &str) -> TriageOutcome {
    let extracted = extract::extract(reply);

    let mut meta = current.clone();
    if let Some((strategy, fields)) = &extracted {
        tracing::debug!(?strategy, keys = fields.len(), "Extracted triage fields");
        meta.merge(fields);
    }

    let Some(first_missing) = meta.missing_fields().first().copied() else {
        return TriageOutcome::Complete { meta };
    };

    let follow_up_question = extracted
        .as_ref()
        .and_then(|(_, fields)| suggested_question(fields))
        .unwrap_or_else(|| ask_for(first_missing));

    TriageOutcome::NeedsMore {
        follow_up_question,
        meta,
    }
}

/// A follow-up the model offered: an explicit `followUp`, else a short
/// string `question`.
fn suggested_question(fields: &Extraction) -> Option<String> {
    if let Some(follow_up) = fields.get("followUp").filter(|v| is_truthy(v)) {
        return Some(coerce_to_string(follow_up));
    }

    match fields.get("question") {
        Some(Value::String(q))
            if !q.is_empty() && q.chars().count() < MAX_SUGGESTED_QUESTION_CHARS =>
        {
            Some(q.clone())
        }
        _ => None,
    }
}

/// One triage turn: ask the generator, then reduce its reply.
///
/// Generator failures propagate unchanged; the state passed in is never
/// modified.
pub async fn process_triage(
    generator: &dyn TextGenerator,
    current: &TriageState,
    user_message: &str,
) -> Result<TriageOutcome, LlmError> {
    let request = build_request(current, user_message);
    let reply = generator.generate(&request).await?;
    Ok(reduce(current, &reply))
}
