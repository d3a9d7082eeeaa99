//! Prompt builders for the reminder extraction and date fallback calls.

/// Schema version the draft extractor requires.
pub const DRAFT_SCHEMA_VERSION: &str = "2";

/// Maximum number of vocabulary names embedded in a prompt.
const MAX_PROMPT_TOPICS: usize = 80;

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Prompt asking the model for schema-2 reminder drafts.
pub fn draft_reminder_prompt(
    instruction: &str,
    content: &str,
    topics: &[String],
    max_chars: usize,
) -> String {
    let topic_line = if topics.is_empty() {
        "(none)".to_string()
    } else {
        topics
            .iter()
            .take(MAX_PROMPT_TOPICS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "You are a reminder planner. Decide whether reminders are appropriate for the content below. \
Return STRICT JSON ONLY using schema_version '{version}'. No markdown, no prose, no code fences.\n\
{{\"schema_version\":\"{version}\",\"appropriate\":true|false,\"reason\":\"...\",\"reminders\":[\
{{\"title\":\"...\",\"notes\":\"...\",\"link\":\"...\",\"priority\":\"immediate|high|mid|low\",\
\"due_mode\":\"datetime|all_day|none|unclear\",\"due_text\":\"...\",\"confidence\":\"high|medium|low\",\
\"topics\":[\"...\"],\"priority_reason\":\"...\",\"due_reason\":\"...\"}}]}}\n\
Rules: titles are actionable, 3-12 words, never generic headings like 'Summary'. \
If the due date is unclear use due_mode unclear with an empty due_text. \
If a date exists without an explicit time use due_mode all_day. \
If no date exists use due_mode none with an empty due_text. \
A clear deadline phrase ('by next friday', 'due on 21 Mar') must be carried in due_text. \
If actionability is weak set appropriate to false and give a short reason. \
topics holds at most 5 names taken only from the available topics; use [] when unsure.\n\
Available topics: {topics}\n\
User instruction: {instruction}\n\n\
Content:\n{content}",
        version = DRAFT_SCHEMA_VERSION,
        topics = topic_line,
        instruction = if instruction.trim().is_empty() {
            "(none)"
        } else {
            instruction.trim()
        },
        content = truncate_chars(content, max_chars),
    )
}

/// Prompt asking the model to repair its own malformed output.
pub fn repair_reminder_json_prompt(raw: &str, max_chars: usize) -> String {
    format!(
        "Fix this malformed reminder output into STRICT JSON ONLY. No markdown, no prose, no code fences. \
Return exactly one JSON object matching schema_version '{}'. Use safe defaults for missing values.\n\n\
Raw output:\n{}",
        DRAFT_SCHEMA_VERSION,
        truncate_chars(raw, max_chars)
    )
}

/// Prompt asking the model to turn free text into a parseable due expression.
pub fn datetime_fallback_prompt(text: &str, timezone: &str, now_local: &str) -> String {
    format!(
        "Convert natural language date/time into a concrete due expression for a reminder app. \
Return STRICT JSON ONLY with keys: due_text, due_mode, confidence. \
due_mode is one of: datetime, all_day, none, unclear. confidence is one of: high, medium, low. \
If no date/time intent is present use due_mode none and an empty due_text. \
If a date exists without an explicit time use due_mode all_day. \
If ambiguous use due_mode unclear and low confidence. \
Keep due_text concise and parseable, for example '2026-03-17 09:00' or 'next monday 9am'. \
Timezone: {}. Current local time: {}. Input: {}",
        timezone, now_local, text
    )
}
