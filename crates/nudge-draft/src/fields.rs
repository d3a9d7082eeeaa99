//! `key:value` field splitting for inline payloads such as
//! `title:Submit concept p:high at:28 feb 11am`.
//!
//! A value runs until the next recognized key, so values may contain
//! spaces. Keys are matched case-insensitively and only at the start of the
//! text or after whitespace.

use std::sync::LazyLock;

use regex::Regex;

static FIELD_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\s)(title|topic|notes|link|priority|every|at|p|t)\s*:")
        .expect("Invalid field key regex")
});

/// An inline payload split into free text and keyed fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSplit {
    /// Text before the first key, trimmed.
    pub leading: String,
    /// `(lowercase key, trimmed value)` in input order.
    pub fields: Vec<(String, String)>,
}

impl FieldSplit {
    /// Value of the first occurrence of any of `keys`.
    pub fn get(&self, keys: &[&str]) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| keys.contains(&key.as_str()))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }
}

/// Phrases that explicitly mean "no due date".
pub fn is_no_due_text(text: &str) -> bool {
    matches!(
        text.trim().to_lowercase().as_str(),
        "none" | "no due" | "no due date" | "no deadline" | "someday" | "backlog" | "na" | "n/a"
    )
}

/// Split `text` at every recognized `key:` marker.
pub fn split_fields(text: &str) -> FieldSplit {
    let markers: Vec<(usize, usize, String)> = FIELD_KEY_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let key = caps.get(1)?;
            Some((key.start(), whole.end(), key.as_str().to_lowercase()))
        })
        .collect();

    let Some(first) = markers.first() else {
        return FieldSplit {
            leading: text.trim().to_string(),
            fields: Vec::new(),
        };
    };

    let leading = text[..first.0].trim().to_string();
    let fields = markers
        .iter()
        .enumerate()
        .map(|(i, (_, value_start, key))| {
            let value_end = markers.get(i + 1).map(|next| next.0).unwrap_or(text.len());
            (key.clone(), text[*value_start..value_end].trim().to_string())
        })
        .collect();

    FieldSplit { leading, fields }
}
