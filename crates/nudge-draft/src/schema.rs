//! Schema "2" normalization and validation of model draft output.
//!
//! Normalization never fails: out-of-range values are clamped to safe
//! defaults and malformed records are dropped. Validation then decides
//! whether the normalized payload is usable or needs a repair round.

use serde_json::{Map, Value};

use nudge_core::{Confidence, DueMode, Priority};
use nudge_llm::json::str_field;
use nudge_llm::prompts::DRAFT_SCHEMA_VERSION;

use crate::refine::is_valid_link;

pub const MAX_TITLE_CHARS: usize = 120;
pub const MAX_NOTES_CHARS: usize = 280;
pub const MAX_REASON_CHARS: usize = 120;
pub const MAX_DRAFT_TOPICS: usize = 5;

/// One reminder record after normalization. `due_text` is still unresolved.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftRecord {
    pub title: String,
    pub notes: String,
    pub link: String,
    pub priority: Priority,
    pub due_mode: DueMode,
    pub due_text: String,
    pub confidence: Confidence,
    pub topics: Vec<String>,
    pub priority_reason: String,
    pub due_reason: String,
}

/// A normalized extraction payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftPayload {
    pub schema_version: String,
    pub appropriate: bool,
    pub reason: String,
    pub reminders: Vec<DraftRecord>,
}

impl DraftPayload {
    /// A payload that proposes nothing.
    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            schema_version: DRAFT_SCHEMA_VERSION.to_string(),
            appropriate: false,
            reason: reason.into(),
            reminders: Vec::new(),
        }
    }

    /// Schema version must be current, and an appropriate payload must
    /// carry at least one reminder.
    pub fn is_valid(&self) -> bool {
        if self.schema_version != DRAFT_SCHEMA_VERSION {
            return false;
        }
        !(self.appropriate && self.reminders.is_empty())
    }
}

fn clamp(text: &str, max_chars: usize) -> String {
    nudge_llm::prompts::truncate_chars(text.trim(), max_chars)
        .trim_end()
        .to_string()
}

/// Loose truthiness for `appropriate`: booleans, and "true"/"yes" strings.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

fn normalize_record(raw: &Map<String, Value>) -> DraftRecord {
    let mut link = str_field(raw, "link").to_string();
    if !is_valid_link(&link) {
        link.clear();
    }

    let topics = match raw.get("topics") {
        Some(Value::Array(items)) => items
            .iter()
            .take(MAX_DRAFT_TOPICS)
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    DraftRecord {
        title: clamp(str_field(raw, "title"), MAX_TITLE_CHARS),
        notes: clamp(str_field(raw, "notes"), MAX_NOTES_CHARS),
        link,
        priority: Priority::from_token(str_field(raw, "priority")).unwrap_or_default(),
        due_mode: DueMode::parse_or(str_field(raw, "due_mode"), DueMode::Datetime),
        due_text: str_field(raw, "due_text").to_string(),
        confidence: Confidence::parse_or(str_field(raw, "confidence"), Confidence::Medium),
        topics,
        priority_reason: clamp(str_field(raw, "priority_reason"), MAX_REASON_CHARS),
        due_reason: clamp(str_field(raw, "due_reason"), MAX_REASON_CHARS),
    }
}

/// Normalize a parsed model object. A missing `schema_version` reads as
/// "1" so that unversioned output fails validation.
pub fn normalize_payload(parsed: &Map<String, Value>) -> DraftPayload {
    let reminders = match parsed.get("reminders") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_object)
            .map(normalize_record)
            .collect(),
        _ => Vec::new(),
    };

    let schema_version = match parsed.get("schema_version") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "1".to_string(),
    };

    DraftPayload {
        schema_version,
        appropriate: truthy(parsed.get("appropriate")),
        reason: str_field(parsed, "reason").to_string(),
        reminders,
    }
}

/// Drop topics outside the vocabulary (case-insensitive), dedupe, and
/// restore the vocabulary's spelling.
pub fn filter_to_vocabulary(topics: &[String], vocabulary: &[String]) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    let mut kept = Vec::new();
    for topic in topics {
        let key = topic.trim().to_lowercase();
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        if let Some(canonical) = vocabulary.iter().find(|v| v.to_lowercase() == key) {
            seen.push(key);
            kept.push(canonical.clone());
        }
    }
    kept
}
