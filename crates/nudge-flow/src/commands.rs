//! Slash commands and inline `key:value` payloads.
//!
//! Everything here is pure text handling. Date phrases are only located,
//! never resolved; the dispatcher owns resolution.

use std::sync::LazyLock;

use regex::Regex;

use nudge_core::{Priority, Recurrence, ReminderId};
use nudge_draft::refine::{extract_first_url, is_valid_link};
use nudge_draft::{is_no_due_text, split_fields};

use crate::topics::{dedupe_topics, split_topics};

pub const HELP_TEXT: &str = "\
Reminder commands

/add <task> [t:<topics>] [p:immediate|high|mid|low] [at:<time>] [every:daily|weekly|monthly] [link:<url>] [notes:<text>]
  /add Pay rent p:high at:tomorrow 9am
  /add Submit form #work !h fri 5pm
  /add <task> alone starts a step-by-step wizard
/edit <id> [title:..] [p:..] [at:..] [notes:..] [link:..] [every:..|none] [t:+a,-b]
  /edit <id> alone opens the edit menu
/delete [id]
/detail <id>
/list
/notes
/topics
/extract <text>  propose reminders from a block of text
/cancel  leave the current flow

You can also write: remind me to call mom tomorrow 9am";

pub const ADD_USAGE: &str =
    "Usage: /add <task> [link:<url>] [p:high] [at:tomorrow 9am] [every:daily|weekly|monthly]";
pub const EDIT_USAGE: &str =
    "Usage: /edit <id> [title:<text>] [p:<priority>] [at:<datetime>] [notes:<text>] [link:<url>] [every:daily|weekly|monthly|none]";
pub const MISSING_TITLE: &str = "Please include what to be reminded about, e.g. `/add Pay rent at:friday 9am`.";
pub const MISSING_DUE: &str =
    "When is it due? Add a time like `at:tomorrow 9am`, or `at:none` for no due date.";

static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#([A-Za-z0-9][A-Za-z0-9_-]{0,40})\b").expect("valid regex"));
static BANG_PRIORITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)!\s*(immediate|high|mid|low|i|h|m|l)\b").expect("valid regex"));
static AT_RECURRENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)@(daily|weekly|monthly)\b").expect("valid regex"));
static NO_DUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(no\s+due(?:\s+date)?|no\s+deadline|someday|backlog)\b").expect("valid regex")
});
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));
static TITLE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:remind me to|remind me|todo)\s+").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static INLINE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\s)(?:at|p|priority|topic|t|every|link|notes)\s*:|(?:^|\s)#\w").expect("valid regex")
});

const CLEAR_TOKENS: [&str; 6] = ["none", "clear", "null", "n/a", "na", "-"];

// =============================================================================
// Commands
// =============================================================================

/// A parsed `/command`. Arguments are kept raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Add(String),
    Edit(String),
    Delete(String),
    Detail(String),
    List,
    Notes,
    Topics,
    Extract(String),
    Cancel,
    Unknown(String),
}

impl Command {
    /// `None` when `text` is not a slash command.
    pub fn parse(text: &str) -> Option<Command> {
        let rest = text.trim().strip_prefix('/')?;
        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim().to_string()),
            None => (rest, String::new()),
        };
        // `/add@somebot` style suffixes.
        let name = name.split('@').next().unwrap_or_default().to_lowercase();
        Some(match name.as_str() {
            "help" | "start" => Command::Help,
            "add" => Command::Add(args),
            "edit" => Command::Edit(args),
            "delete" => Command::Delete(args),
            "detail" => Command::Detail(args),
            "list" => Command::List,
            "notes" => Command::Notes,
            "topics" => Command::Topics,
            "extract" => Command::Extract(args),
            "cancel" | "stop" => Command::Cancel,
            _ => Command::Unknown(name),
        })
    }
}

/// Parse a reminder id argument, accepting a leading `#`.
pub fn parse_reminder_id(raw: &str) -> Option<ReminderId> {
    raw.trim().trim_start_matches('#').parse().ok()
}

// =============================================================================
// Add payload
// =============================================================================

/// Where the due date of an inline add comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueSpec {
    /// `at:<text>`, to be resolved as a whole.
    Explicit(String),
    /// The user asked for no due date.
    NoDue,
    /// No marker; scan the free text for a date phrase.
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPayload {
    /// Free text left after removing every marker. May still hold the date
    /// phrase when `due` is [`DueSpec::Search`].
    pub text: String,
    pub topics: Vec<String>,
    pub priority: Priority,
    pub recurrence: Option<Recurrence>,
    pub link: String,
    pub notes: String,
    pub due: DueSpec,
}

impl AddPayload {
    /// The title once `matched_span` (the located date phrase) is removed.
    /// `None` when nothing meaningful is left.
    pub fn title(&self, matched_span: Option<&str>) -> Option<String> {
        let mut text = self.text.clone();
        if let Some(span) = matched_span.map(str::trim).filter(|s| !s.is_empty()) {
            text = remove_case_insensitive(&text, span);
        }
        let cleaned = clean_title(&text);
        (!cleaned.is_empty()).then_some(cleaned)
    }
}

/// Break an `/add` payload into its parts. Errors are user-facing.
pub fn parse_add_payload(raw: &str) -> Result<AddPayload, String> {
    let mut link = extract_first_url(raw).unwrap_or_default();
    let mut topics = Vec::new();

    let mut text = raw.trim().to_string();
    for caps in HASHTAG_RE.captures_iter(raw) {
        topics.push(caps[1].to_string());
    }
    text = HASHTAG_RE.replace_all(&text, " ").into_owned();

    let split = split_fields(&text);
    let mut free = vec![split.leading.clone()];
    let mut priority = None;
    let mut recurrence = None;
    let mut notes = String::new();
    let mut title_field = None;
    let mut due = None;

    for (key, value) in &split.fields {
        match key.as_str() {
            "topic" | "t" => topics.extend(split_topics(value)),
            "p" | "priority" => {
                let (token, tail) = first_token(value);
                priority = Some(parse_priority(token)?);
                free.push(tail.to_string());
            }
            "every" => {
                let (token, tail) = first_token(value);
                recurrence = Some(parse_recurrence(token)?);
                free.push(tail.to_string());
            }
            "at" if is_no_due_text(value) => due = Some(DueSpec::NoDue),
            "at" => due = Some(DueSpec::Explicit(value.clone())),
            "notes" => notes = value.clone(),
            "link" => {
                if !is_valid_link(value) {
                    return Err(format!("'{}' is not a valid link. Use a full http(s) URL.", value));
                }
                link = value.clone();
            }
            "title" => title_field = Some(value.clone()),
            _ => free.push(value.clone()),
        }
    }

    let mut text = title_field.unwrap_or_else(|| free.join(" "));
    text = URL_RE.replace_all(&text, " ").into_owned();

    if priority.is_none() {
        if let Some(caps) = BANG_PRIORITY_RE.captures(&text) {
            priority = Priority::from_token(&caps[1]);
            text = BANG_PRIORITY_RE.replace(&text, " ").into_owned();
        }
    }
    if recurrence.is_none() {
        if let Some(caps) = AT_RECURRENCE_RE.captures(&text) {
            recurrence = caps[1].to_lowercase().parse().ok();
            text = AT_RECURRENCE_RE.replace(&text, " ").into_owned();
        }
    }
    let due = match due {
        Some(due) => due,
        None if NO_DUE_RE.is_match(&text) => {
            text = NO_DUE_RE.replace(&text, " ").into_owned();
            DueSpec::NoDue
        }
        None => DueSpec::Search,
    };

    Ok(AddPayload {
        text: WHITESPACE_RE.replace_all(&text, " ").trim().to_string(),
        topics: dedupe_topics(topics),
        priority: priority.unwrap_or_default(),
        recurrence,
        link,
        notes,
        due,
    })
}

/// Whether `/add` text carries any inline marker. Without one the text is
/// taken as the title of a new add wizard.
pub fn looks_like_inline_add_payload(raw: &str) -> bool {
    INLINE_MARKER_RE.is_match(raw) || BANG_PRIORITY_RE.is_match(raw) || AT_RECURRENCE_RE.is_match(raw)
}

/// Plain text that asks for a reminder in so many words.
pub fn has_reminder_intent(text: &str) -> bool {
    const PHRASES: [&str; 8] = [
        "remind me",
        "todo",
        "create reminder",
        "create a reminder",
        "set reminder",
        "set as reminder",
        "add as reminder",
        "don't forget to",
    ];
    let lowered = text.to_lowercase().replace('\u{2019}', "'");
    PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

// =============================================================================
// Edit payload
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicEdit {
    Clear,
    Add(Vec<String>),
    Remove(Vec<String>),
    Replace(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueEdit {
    Clear,
    Text(String),
}

/// Field changes from `/edit <id> ...`. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditPayload {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub link: Option<String>,
    pub priority: Option<Priority>,
    pub due: Option<DueEdit>,
    /// `Some(None)` clears the recurrence.
    pub recurrence: Option<Option<Recurrence>>,
    pub topics: Option<TopicEdit>,
}

pub fn parse_edit_payload(raw: &str) -> Result<EditPayload, String> {
    let split = split_fields(raw);
    if !split.has_fields() {
        // Bare text renames the reminder.
        return Ok(EditPayload {
            title: Some(split.leading),
            ..Default::default()
        });
    }

    let mut edit = EditPayload::default();
    for (key, value) in &split.fields {
        match key.as_str() {
            "title" => edit.title = Some(value.clone()),
            "notes" => edit.notes = Some(value.clone()),
            "link" => {
                if !value.is_empty() && !is_valid_link(value) {
                    return Err(format!("'{}' is not a valid link. Use a full http(s) URL.", value));
                }
                edit.link = Some(value.clone());
            }
            "p" | "priority" => edit.priority = Some(parse_priority(first_token(value).0)?),
            "every" => {
                let token = first_token(value).0;
                edit.recurrence = Some(if token.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(parse_recurrence(token)?)
                });
            }
            "at" if is_no_due_text(value) => edit.due = Some(DueEdit::Clear),
            "at" => edit.due = Some(DueEdit::Text(value.clone())),
            "topic" | "t" => edit.topics = Some(parse_topic_edit(value)),
            _ => {}
        }
    }
    Ok(edit)
}

fn parse_topic_edit(value: &str) -> TopicEdit {
    let trimmed = value.trim();
    if CLEAR_TOKENS.contains(&trimmed.to_lowercase().as_str()) {
        return TopicEdit::Clear;
    }
    let strip = |marker: char| {
        dedupe_topics(trimmed.split(',').map(|part| part.trim().trim_start_matches(marker).to_string()))
    };
    if trimmed.starts_with('+') {
        TopicEdit::Add(strip('+'))
    } else if trimmed.starts_with('-') {
        TopicEdit::Remove(strip('-'))
    } else {
        TopicEdit::Replace(split_topics(trimmed))
    }
}

/// Apply a topic edit to a reminder's current topics.
pub fn apply_topic_edit(current: &[String], edit: &TopicEdit) -> Vec<String> {
    match edit {
        TopicEdit::Clear => Vec::new(),
        TopicEdit::Replace(topics) => topics.clone(),
        TopicEdit::Add(topics) => dedupe_topics(current.iter().chain(topics).cloned()),
        TopicEdit::Remove(topics) => current
            .iter()
            .filter(|t| !topics.iter().any(|r| r.eq_ignore_ascii_case(t)))
            .cloned()
            .collect(),
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn first_token(value: &str) -> (&str, &str) {
    let value = value.trim();
    match value.split_once(char::is_whitespace) {
        Some((token, tail)) => (token, tail.trim()),
        None => (value, ""),
    }
}

fn parse_priority(token: &str) -> Result<Priority, String> {
    Priority::from_token(token)
        .ok_or_else(|| format!("Unknown priority '{}'. Use immediate, high, mid or low.", token))
}

fn parse_recurrence(token: &str) -> Result<Recurrence, String> {
    token
        .to_lowercase()
        .parse()
        .map_err(|_| format!("Unknown repeat '{}'. Use daily, weekly or monthly.", token))
}

fn remove_case_insensitive(text: &str, needle: &str) -> String {
    let lowered = text.to_lowercase();
    match lowered.find(&needle.to_lowercase()) {
        // Lowercasing can change byte lengths outside ASCII.
        Some(start) if lowered.len() == text.len() => {
            format!("{} {}", &text[..start], &text[start + needle.len()..])
        }
        _ => text.replacen(needle, " ", 1),
    }
}

fn clean_title(text: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(text, " ");
    let trimmed = collapsed.trim().trim_matches(|c: char| c == ' ' || c == '-');
    TITLE_PREFIX_RE.replace(trimmed, "").trim().to_string()
}
