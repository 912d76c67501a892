//! Participant response document models
//!
//! Field names serialize in camelCase so stored documents keep the shape the
//! participant runner submits (`questionKey`, `createdAt`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::{time, uuid_utils};

/// Free-form per-response metadata (device info, timings, ...)
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Scalar leaf allowed inside a [`ResponseValue::Map`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Answer payload of a single module response
///
/// The shape depends on the question type but is otherwise opaque to the
/// aggregation logic. Serialized untagged, so `8`, `"yes"`, `["a","b"]`,
/// `{"x": 1}` and `null` all round-trip as plain JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
    Map(BTreeMap<String, ScalarValue>),
}

impl ResponseValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ResponseValue::Null)
    }
}

impl From<bool> for ResponseValue {
    fn from(value: bool) -> Self {
        ResponseValue::Bool(value)
    }
}

impl From<f64> for ResponseValue {
    fn from(value: f64) -> Self {
        ResponseValue::Number(value)
    }
}

impl From<i64> for ResponseValue {
    fn from(value: i64) -> Self {
        ResponseValue::Number(value as f64)
    }
}

impl From<&str> for ResponseValue {
    fn from(value: &str) -> Self {
        ResponseValue::Text(value.to_string())
    }
}

impl From<String> for ResponseValue {
    fn from(value: String) -> Self {
        ResponseValue::Text(value)
    }
}

impl From<Vec<String>> for ResponseValue {
    fn from(value: Vec<String>) -> Self {
        ResponseValue::List(value)
    }
}

/// One answer from one participant to one module/question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleResponse {
    /// Opaque unique identifier
    pub id: String,
    /// `{stepId}_{stepType}` or `{stepId}_{stepType}_q{index}` (or a legacy alias)
    pub question_key: String,
    /// Human-readable label, informational only
    #[serde(default)]
    pub step_title: String,
    #[serde(default, alias = "response")]
    pub value: ResponseValue,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    /// Set only when the response is edited in place
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ModuleResponse {
    /// Create a fresh response with a generated id, stamped now
    pub fn new(
        question_key: impl Into<String>,
        step_title: impl Into<String>,
        value: ResponseValue,
    ) -> Self {
        Self {
            id: uuid_utils::new_id(),
            question_key: question_key.into(),
            step_title: step_title.into(),
            value,
            metadata: Metadata::new(),
            created_at: time::now(),
            updated_at: None,
        }
    }

    /// Time the current value was given: last edit, else creation
    pub fn answered_at(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// Owning aggregate of all responses for one (research, participant) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResponseDocument {
    pub id: String,
    pub research_id: String,
    pub participant_id: String,
    /// Submission order
    #[serde(default)]
    pub responses: Vec<ModuleResponse>,
    /// Owned by the participant flow; never changed by the maintenance passes
    #[serde(default)]
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ParticipantResponseDocument {
    /// Create an empty document for a participant
    pub fn new(research_id: impl Into<String>, participant_id: impl Into<String>) -> Self {
        let now = time::now();
        Self {
            id: uuid_utils::new_id(),
            research_id: research_id.into(),
            participant_id: participant_id.into(),
            responses: Vec::new(),
            is_completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Find the response stored under an exact question key
    pub fn response_for(&self, question_key: &str) -> Option<&ModuleResponse> {
        self.responses.iter().find(|r| r.question_key == question_key)
    }

    /// Question keys that occur more than once, in first-occurrence order
    ///
    /// A key should appear at most once per document; duplicates are a
    /// data-quality defect, reported rather than repaired.
    pub fn duplicate_question_keys(&self) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for response in &self.responses {
            *counts.entry(response.question_key.as_str()).or_default() += 1;
        }

        let mut duplicates: Vec<String> = Vec::new();
        for response in &self.responses {
            let key = response.question_key.as_str();
            if counts[key] > 1 && !duplicates.iter().any(|d| d == key) {
                duplicates.push(key.to_string());
            }
        }
        duplicates
    }
}
