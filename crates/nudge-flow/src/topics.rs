//! Topic list helpers shared by commands and wizards.

use std::collections::HashSet;

use nudge_core::{ConversationId, ReminderStore, Result};

const SUGGESTIONS_PER_TOPIC: usize = 3;
const MAX_SUGGESTIONS: usize = 5;

/// Split a comma-separated topic list, trimming and dropping
/// case-insensitive duplicates. First spelling wins.
pub fn split_topics(text: &str) -> Vec<String> {
    dedupe_topics(text.split(',').map(str::to_string))
}

pub fn dedupe_topics<I>(topics: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for topic in topics {
        let value = topic.trim();
        if value.is_empty() || !seen.insert(value.to_lowercase()) {
            continue;
        }
        result.push(value.to_string());
    }
    result
}

/// Names in `topics` that are not in the vocabulary.
pub fn missing_topics(vocabulary: &[String], topics: &[String]) -> Vec<String> {
    topics
        .iter()
        .filter(|t| !vocabulary.iter().any(|v| v.eq_ignore_ascii_case(t)))
        .cloned()
        .collect()
}

/// Vocabulary names sharing a prefix with `name` or containing it (or
/// contained in it), compared case-insensitively.
pub fn suggest_topics(vocabulary: &[String], name: &str, limit: usize) -> Vec<String> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let prefix: String = needle.chars().take(3).collect();

    vocabulary
        .iter()
        .filter(|candidate| {
            let lowered = candidate.to_lowercase();
            lowered.starts_with(&prefix) || lowered.contains(&needle) || needle.contains(&lowered)
        })
        .take(limit)
        .cloned()
        .collect()
}

/// The "create these first" reply, with spelling suggestions.
pub fn missing_topics_message(vocabulary: &[String], missing: &[String]) -> String {
    let base = format!(
        "Unknown topics: {}. Create them first with /topics (create <name>).",
        missing.join(", ")
    );
    let suggestions = dedupe_topics(
        missing
            .iter()
            .flat_map(|m| suggest_topics(vocabulary, m, SUGGESTIONS_PER_TOPIC)),
    );
    if suggestions.is_empty() {
        return base;
    }
    let shown: Vec<String> = suggestions.into_iter().take(MAX_SUGGESTIONS).collect();
    format!("{}\nDid you mean: {}?", base, shown.join(", "))
}

/// `Some(message)` when any of `topics` is missing from the conversation's
/// vocabulary.
pub fn check_topics(
    store: &dyn ReminderStore,
    conversation_id: ConversationId,
    topics: &[String],
) -> Result<Option<String>> {
    if topics.is_empty() {
        return Ok(None);
    }
    let vocabulary = store.topic_names(conversation_id)?;
    let missing = missing_topics(&vocabulary, topics);
    if missing.is_empty() {
        return Ok(None);
    }
    Ok(Some(missing_topics_message(&vocabulary, &missing)))
}
