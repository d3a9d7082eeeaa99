//! Follow-up handling while a draft batch awaits review.
//!
//! Short forms map onto canonical commands: `1` save all, `2` save all with
//! topics, `3` show, `4` cancel, `s 1,3` save selected, `t 1,3` save
//! selected with topics, `r 2` remove, `e 2 ...` edit.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono_tz::Tz;
use regex::Regex;
use tracing::{info, warn};

use nudge_core::format::format_brief;
use nudge_core::{
    Clock, DueAt, DueMode, Materializer, NewReminder, Priority, ReminderFields, Reply,
};
use nudge_temporal::TemporalResolver;

use crate::fields::{is_no_due_text, split_fields};
use crate::refine::is_valid_link;
use crate::render::{batch_reply, HELP_TEXT};
use crate::types::DraftBatch;

static SHORT_SELECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([str])\s+(\d+(?:\s*,\s*\d+)*)$").expect("valid regex"));

static INDEX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

static CREATE_TOPICS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bcreate\s*:\s*(.+)$").expect("valid regex"));

static TOPICS_FLAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\btopics\b").expect("valid regex"));

static EDIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^(?:edit|e)\s+(\d+)\s+(.+)$").expect("valid regex"));

const CONFIRM_ALIASES: &[&str] = &[
    "add as reminder",
    "add as reminders",
    "save reminder",
    "save reminders",
    "save all",
    "save all reminders",
    "create reminder",
    "create reminders",
];

const EDIT_USAGE: &str = "Usage: edit <n> title:<...> p:<...> at:<...> notes:<...> link:<...>";
const REMOVE_USAGE: &str = "Usage: remove <n> or remove 1,3";
const INVALID_SELECTION: &str = "Invalid draft selection. Example: confirm 1,3";
const NEEDS_CLARIFICATION: &str = "Some selected drafts still need clarification (title/priority/due). \
Use: edit <n> title:<...> p:<...> at:<...>. For no due date use at:none.";

// =============================================================================
// Commands
// =============================================================================

/// A reply to a pending draft batch, parsed into a closed set of intents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewCommand {
    /// Save the selected drafts (1-based; empty means all).
    Confirm {
        selection: Vec<usize>,
        attach_topics: bool,
        create_topics: Vec<String>,
    },
    Show,
    Cancel,
    /// Remove drafts by 1-based index; empty means the indices were missing.
    Remove(Vec<usize>),
    Edit { index: usize, edits: String },
    EditUsage,
    Help,
}

fn parse_indices(text: &str) -> Vec<usize> {
    INDEX_RE
        .find_iter(text)
        .map(|m| m.as_str().parse::<usize>().unwrap_or(usize::MAX))
        .collect()
}

fn parse_confirm(text: &str) -> ReviewCommand {
    let (base, create_topics) = match CREATE_TOPICS_RE.captures(text) {
        Some(caps) => {
            let topics = caps
                .get(1)
                .map(|m| {
                    m.as_str()
                        .split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            let start = caps.get(0).map(|m| m.start()).unwrap_or(text.len());
            (text[..start].trim(), topics)
        }
        None => (text, Vec::new()),
    };
    let attach_topics = TOPICS_FLAG_RE.is_match(base) || !create_topics.is_empty();
    let selection = parse_indices(&TOPICS_FLAG_RE.replace_all(base, " "));
    ReviewCommand::Confirm {
        selection,
        attach_topics,
        create_topics,
    }
}

impl ReviewCommand {
    pub fn parse(text: &str) -> ReviewCommand {
        let stripped = text.trim();
        let lowered = stripped.to_lowercase();

        match lowered.as_str() {
            "1" => return parse_confirm("confirm"),
            "2" => return parse_confirm("confirm topics"),
            "3" | "show" | "list" | "preview" => return ReviewCommand::Show,
            "4" | "cancel" | "skip" | "discard" | "no" => return ReviewCommand::Cancel,
            _ => {}
        }

        if let Some(caps) = SHORT_SELECTION_RE.captures(stripped) {
            let indices = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            return match caps[1].to_lowercase().as_str() {
                "s" => parse_confirm(&format!("confirm {}", indices)),
                "t" => parse_confirm(&format!("confirm topics {}", indices)),
                _ => ReviewCommand::Remove(parse_indices(indices)),
            };
        }

        if lowered == "yes" || lowered.starts_with("confirm") || CONFIRM_ALIASES.contains(&lowered.as_str()) {
            return parse_confirm(stripped);
        }

        if lowered.starts_with("remove ") || lowered == "remove" {
            return ReviewCommand::Remove(parse_indices(&lowered));
        }

        if lowered.starts_with("edit ") || lowered.starts_with("e ") || lowered == "edit" {
            return match EDIT_RE.captures(stripped) {
                Some(caps) => ReviewCommand::Edit {
                    index: caps[1].parse().unwrap_or(usize::MAX),
                    edits: caps[2].trim().to_string(),
                },
                None => ReviewCommand::EditUsage,
            };
        }

        ReviewCommand::Help
    }
}

// =============================================================================
// Handler
// =============================================================================

/// Result of one review turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewOutcome {
    pub replies: Vec<Reply>,
    /// The batch is closed and must be dropped by the caller.
    pub finished: bool,
}

impl ReviewOutcome {
    fn keep(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            finished: false,
        }
    }

    fn finish(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            finished: true,
        }
    }
}

/// Applies review commands to a batch. Drafts are persisted only on an
/// explicit confirm.
#[derive(Clone)]
pub struct DraftReviewer {
    materializer: Materializer,
    resolver: TemporalResolver,
    timezone: Tz,
    clock: Clock,
}

impl DraftReviewer {
    pub fn new(materializer: Materializer, resolver: TemporalResolver, timezone: Tz) -> Self {
        Self {
            materializer,
            resolver,
            timezone,
            clock: Clock::System,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn handle(&self, batch: &mut DraftBatch, text: &str) -> ReviewOutcome {
        match ReviewCommand::parse(text) {
            ReviewCommand::Cancel => {
                info!(conversation_id = batch.conversation_id, "Draft batch discarded");
                ReviewOutcome::finish(vec![Reply::text("Okay, discarded draft reminders.")])
            }
            ReviewCommand::Show => ReviewOutcome::keep(batch_reply(batch, self.timezone)),
            ReviewCommand::Confirm {
                selection,
                attach_topics,
                create_topics,
            } => self.confirm(batch, selection, attach_topics, &create_topics).await,
            ReviewCommand::Remove(indices) => self.remove(batch, &indices),
            ReviewCommand::Edit { index, edits } => self.edit(batch, index, &edits),
            ReviewCommand::EditUsage => ReviewOutcome::keep(Reply::text(EDIT_USAGE)),
            ReviewCommand::Help => ReviewOutcome::keep(Reply::text(HELP_TEXT)),
        }
    }

    async fn confirm(
        &self,
        batch: &mut DraftBatch,
        selection: Vec<usize>,
        attach_topics: bool,
        create_topics: &[String],
    ) -> ReviewOutcome {
        let Some(selected) = select(batch.len(), selection) else {
            return ReviewOutcome::keep(Reply::text(INVALID_SELECTION));
        };
        if selected.is_empty() {
            return ReviewOutcome::finish(vec![Reply::text("No valid draft reminders to save.")]);
        }

        if selected.iter().any(|&i| batch.drafts[i - 1].needs_clarification()) {
            return ReviewOutcome::keep(Reply::text(NEEDS_CLARIFICATION));
        }

        let conversation_id = batch.conversation_id;
        let store = self.materializer.store();

        if attach_topics {
            let wanted = collect_topics(batch, &selected);
            let vocabulary = match store.topic_names(conversation_id) {
                Ok(names) => names,
                Err(e) => return ReviewOutcome::keep(Reply::text(format!("Could not load topics: {}", e))),
            };
            let missing: Vec<String> = wanted
                .into_iter()
                .filter(|t| !vocabulary.iter().any(|v| v.eq_ignore_ascii_case(t)))
                .collect();

            if !missing.is_empty() {
                let authorized = missing
                    .iter()
                    .all(|m| create_topics.iter().any(|c| c.eq_ignore_ascii_case(m)));
                if !authorized {
                    return ReviewOutcome::keep(Reply::text(format!(
                        "Missing topics for selected drafts: {}. Create and continue with: confirm topics create:{}",
                        missing.join(", "),
                        missing.join(",")
                    )));
                }
                for name in &missing {
                    if let Err(e) = store.create_topic(conversation_id, name) {
                        return ReviewOutcome::keep(Reply::text(format!(
                            "Could not create topic '{}': {}",
                            name, e
                        )));
                    }
                }
            }
        }

        let mut briefs = Vec::new();
        let mut notices = Vec::new();
        let mut saved = HashSet::new();
        let mut failure = None;

        for &index in &selected {
            let draft = &batch.drafts[index - 1];
            let new = NewReminder {
                conversation_id,
                source_kind: batch.source_kind,
                fields: ReminderFields {
                    title: draft.title.trim().to_string(),
                    notes: draft.notes.clone(),
                    link: draft.link.clone(),
                    priority: draft.priority,
                    due_at: draft.due_at,
                    recurrence: None,
                },
            };
            let topics = if attach_topics { draft.topics.clone() } else { Vec::new() };

            match self.materializer.materialize(new, &topics).await {
                Ok(done) => {
                    briefs.push(format_brief(&done.reminder, self.timezone));
                    if let Some(err) = done.sync_error {
                        notices.push(format!("Calendar sync failed for #{}: {}", done.reminder.id, err));
                    }
                    saved.insert(index);
                }
                Err(e) => {
                    warn!(conversation_id, error = %e, "Saving draft failed");
                    failure = Some(e);
                    break;
                }
            }
        }

        let mut replies = Vec::new();
        if !briefs.is_empty() {
            replies.push(Reply::text(briefs.join("\n\n")));
        }
        replies.extend(notices.into_iter().map(Reply::text));

        if let Some(e) = failure {
            let mut index = 0;
            batch.drafts.retain(|_| {
                index += 1;
                !saved.contains(&index)
            });
            replies.push(Reply::text(format!("Could not save draft reminders: {}", e)));
            return ReviewOutcome {
                replies,
                finished: batch.is_empty(),
            };
        }

        info!(conversation_id, saved = saved.len(), attach_topics, "Draft batch saved");
        let skipped_topics = !attach_topics && selected.iter().any(|&i| !batch.drafts[i - 1].topics.is_empty());
        if skipped_topics {
            replies.push(Reply::text(
                "Saved without topic auto-attach. Use `confirm topics` next time to attach suggested topics.",
            ));
        }
        ReviewOutcome::finish(replies)
    }

    fn remove(&self, batch: &mut DraftBatch, indices: &[usize]) -> ReviewOutcome {
        if indices.is_empty() {
            return ReviewOutcome::keep(Reply::text(REMOVE_USAGE));
        }
        let mut index = 0;
        batch.drafts.retain(|_| {
            index += 1;
            !indices.contains(&index)
        });
        if batch.is_empty() {
            return ReviewOutcome::finish(vec![Reply::text("All draft reminders removed.")]);
        }
        ReviewOutcome::keep(batch_reply(batch, self.timezone))
    }

    fn edit(&self, batch: &mut DraftBatch, index: usize, edits: &str) -> ReviewOutcome {
        if index == 0 || index > batch.len() {
            return ReviewOutcome::keep(Reply::text("Draft index out of range."));
        }
        let split = split_fields(edits);
        if !split.has_fields() {
            return ReviewOutcome::keep(Reply::text(EDIT_USAGE));
        }

        let priority = match split.get(&["p", "priority"]) {
            Some(token) => match Priority::from_token(token) {
                Some(p) => Some(p),
                None => {
                    return ReviewOutcome::keep(Reply::text(format!(
                        "Unknown priority '{}'. Use immediate, high, mid or low.",
                        token
                    )))
                }
            },
            None => None,
        };

        let link = match split.get(&["link"]) {
            Some(value) if is_no_due_text(value) || value.eq_ignore_ascii_case("clear") => Some(String::new()),
            Some(value) if is_valid_link(value) => Some(value.to_string()),
            Some(_) => return ReviewOutcome::keep(Reply::text("Invalid link. Use https://... or link:none.")),
            None => None,
        };

        let due = match split.get(&["at"]) {
            Some(value) if is_no_due_text(value) => Some((DueMode::None, DueAt::NONE)),
            Some(value) => {
                let result = self.resolver.resolve(value, self.timezone, self.clock.now());
                if !result.is_resolved() {
                    return ReviewOutcome::keep(Reply::text(
                        "Could not parse at:. Example: at:tomorrow 9am or at:none",
                    ));
                }
                Some((DueMode::Datetime, result.due_at()))
            }
            None => None,
        };

        let draft = &mut batch.drafts[index - 1];
        if let Some(title) = split.get(&["title"]) {
            draft.title = title.to_string();
        }
        if let Some(notes) = split.get(&["notes"]) {
            draft.notes = notes.to_string();
        }
        if let Some(link) = link {
            draft.link = link;
        }
        if let Some(priority) = priority {
            draft.priority = priority;
        }
        if let Some((mode, due_at)) = due {
            draft.due_mode = mode;
            draft.due_at = due_at;
        }

        ReviewOutcome::keep(batch_reply(batch, self.timezone))
    }
}

/// Dedupe a 1-based selection; empty selects everything. `None` when any
/// index is out of range.
fn select(len: usize, selection: Vec<usize>) -> Option<Vec<usize>> {
    if selection.is_empty() {
        return Some((1..=len).collect());
    }
    let mut seen = HashSet::new();
    let mut selected = Vec::new();
    for index in selection {
        if index == 0 || index > len {
            return None;
        }
        if seen.insert(index) {
            selected.push(index);
        }
    }
    Some(selected)
}

fn collect_topics(batch: &DraftBatch, selected: &[usize]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut topics = Vec::new();
    for &index in selected {
        for topic in &batch.drafts[index - 1].topics {
            let name = topic.trim();
            if !name.is_empty() && seen.insert(name.to_lowercase()) {
                topics.push(name.to_string());
            }
        }
    }
    topics
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use nudge_core::{CalendarCall, Confidence, RecordingCalendar, ReminderStore, SourceKind};
    use nudge_storage::SqliteReminderStore;

    use crate::types::ReminderDraft;

    const CHAT: i64 = 5;

    fn singapore() -> Tz {
        "Asia/Singapore".parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        singapore()
            .with_ymd_and_hms(2026, 2, 21, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn draft(title: &str, mode: DueMode, topics: &[&str]) -> ReminderDraft {
        ReminderDraft {
            title: title.to_string(),
            notes: String::new(),
            link: String::new(),
            priority: Priority::Mid,
            due_mode: mode,
            due_at: DueAt::NONE,
            confidence: Confidence::High,
            topics: topics.iter().map(|t| t.to_string()).collect(),
            priority_reason: String::new(),
            due_reason: String::new(),
        }
    }

    fn setup() -> (DraftReviewer, Arc<SqliteReminderStore>, Arc<RecordingCalendar>) {
        let store = Arc::new(SqliteReminderStore::in_memory().unwrap());
        let calendar = Arc::new(RecordingCalendar::new());
        let materializer = Materializer::new(store.clone(), calendar.clone());
        let reviewer = DraftReviewer::new(materializer, TemporalResolver::new(), singapore())
            .with_clock(Clock::fixed(now()));
        (reviewer, store, calendar)
    }

    fn batch(drafts: Vec<ReminderDraft>) -> DraftBatch {
        DraftBatch::new(CHAT, SourceKind::Summary, drafts)
    }

    #[test]
    fn test_parse_short_forms() {
        assert_eq!(
            ReviewCommand::parse("1"),
            ReviewCommand::Confirm {
                selection: vec![],
                attach_topics: false,
                create_topics: vec![]
            }
        );
        assert_eq!(
            ReviewCommand::parse("t 1, 3"),
            ReviewCommand::Confirm {
                selection: vec![1, 3],
                attach_topics: true,
                create_topics: vec![]
            }
        );
        assert_eq!(ReviewCommand::parse("r 2"), ReviewCommand::Remove(vec![2]));
        assert_eq!(ReviewCommand::parse("3"), ReviewCommand::Show);
        assert_eq!(ReviewCommand::parse("Discard"), ReviewCommand::Cancel);
        assert_eq!(
            ReviewCommand::parse("e 2 title:New p:high"),
            ReviewCommand::Edit {
                index: 2,
                edits: "title:New p:high".to_string()
            }
        );
        assert_eq!(ReviewCommand::parse("edit"), ReviewCommand::EditUsage);
        assert_eq!(ReviewCommand::parse("what now?"), ReviewCommand::Help);
    }

    #[test]
    fn test_parse_confirm_variants() {
        assert_eq!(
            ReviewCommand::parse("confirm topics 2 create:Work, Home"),
            ReviewCommand::Confirm {
                selection: vec![2],
                attach_topics: true,
                create_topics: vec!["Work".to_string(), "Home".to_string()]
            }
        );
        assert!(matches!(
            ReviewCommand::parse("save all reminders"),
            ReviewCommand::Confirm { ref selection, attach_topics: false, .. } if selection.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_confirm_all_saves_and_finishes() {
        let (reviewer, store, calendar) = setup();
        let mut batch = batch(vec![
            draft("Pay invoice", DueMode::None, &[]),
            draft("Book venue", DueMode::None, &[]),
        ]);

        let outcome = reviewer.handle(&mut batch, "1").await;
        assert!(outcome.finished);
        assert_eq!(store.list_reminders(CHAT).unwrap().len(), 2);
        assert_eq!(calendar.calls().len(), 2);
        assert!(outcome.replies[0].text.contains("Title: Pay invoice"));
    }

    #[tokio::test]
    async fn test_confirm_subset_and_invalid_selection() {
        let (reviewer, store, _calendar) = setup();
        let mut batch = batch(vec![
            draft("A", DueMode::None, &[]),
            draft("B", DueMode::None, &[]),
        ]);

        let invalid = reviewer.handle(&mut batch, "s 3").await;
        assert!(!invalid.finished);
        assert_eq!(invalid.replies[0].text, INVALID_SELECTION);

        let outcome = reviewer.handle(&mut batch, "s 2").await;
        assert!(outcome.finished);
        let saved = store.list_reminders(CHAT).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].fields.title, "B");
    }

    #[tokio::test]
    async fn test_unclear_draft_blocks_save() {
        let (reviewer, store, _calendar) = setup();
        let mut batch = batch(vec![draft("Call vendor", DueMode::Unclear, &[])]);

        let blocked = reviewer.handle(&mut batch, "confirm").await;
        assert!(!blocked.finished);
        assert_eq!(blocked.replies[0].text, NEEDS_CLARIFICATION);
        assert!(store.list_reminders(CHAT).unwrap().is_empty());

        let edited = reviewer.handle(&mut batch, "e 1 at:tomorrow 9am p:h").await;
        assert!(!edited.finished);
        assert_eq!(batch.drafts[0].due_mode, DueMode::Datetime);
        assert_eq!(batch.drafts[0].priority, Priority::High);

        let saved = reviewer.handle(&mut batch, "yes").await;
        assert!(saved.finished);
        let reminders = store.list_reminders(CHAT).unwrap();
        assert_eq!(
            reminders[0].fields.due_at.to_storage(),
            "2026-02-22T01:00:00+00:00"
        );
    }

    #[tokio::test]
    async fn test_topics_require_authorized_creation() {
        let (reviewer, store, _calendar) = setup();
        store.create_topic(CHAT, "Work").unwrap();
        let mut batch = batch(vec![draft("Ship report", DueMode::None, &["Work", "Finance"])]);

        let refused = reviewer.handle(&mut batch, "2").await;
        assert!(!refused.finished);
        assert!(refused.replies[0]
            .text
            .contains("confirm topics create:Finance"));
        assert_eq!(store.topic_names(CHAT).unwrap(), vec!["Work".to_string()]);

        let saved = reviewer.handle(&mut batch, "confirm topics create:finance").await;
        assert!(saved.finished);
        let reminder = &store.list_reminders(CHAT).unwrap()[0];
        assert_eq!(reminder.topics, vec!["Finance".to_string(), "Work".to_string()]);
    }

    #[tokio::test]
    async fn test_unclear_draft_blocks_topic_creation() {
        let (reviewer, store, _calendar) = setup();
        let mut batch = batch(vec![draft("Call vendor", DueMode::Unclear, &["Finance"])]);

        let blocked = reviewer.handle(&mut batch, "confirm topics create:Finance").await;
        assert!(!blocked.finished);
        assert_eq!(blocked.replies[0].text, NEEDS_CLARIFICATION);
        assert!(store.topic_names(CHAT).unwrap().is_empty());
        assert!(store.list_reminders(CHAT).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_without_topics_notes_skip() {
        let (reviewer, store, _calendar) = setup();
        store.create_topic(CHAT, "Work").unwrap();
        let mut batch = batch(vec![draft("Ship report", DueMode::None, &["Work"])]);

        let outcome = reviewer.handle(&mut batch, "confirm").await;
        assert!(outcome.finished);
        assert!(outcome.replies.last().unwrap().text.contains("confirm topics"));
        assert!(store.list_reminders(CHAT).unwrap()[0].topics.is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_cancel() {
        let (reviewer, store, calendar) = setup();
        let mut batch = batch(vec![
            draft("A", DueMode::None, &[]),
            draft("B", DueMode::None, &[]),
        ]);

        let usage = reviewer.handle(&mut batch, "remove").await;
        assert_eq!(usage.replies[0].text, REMOVE_USAGE);

        let removed = reviewer.handle(&mut batch, "r 1").await;
        assert!(!removed.finished);
        assert_eq!(batch.drafts[0].title, "B");

        let cancelled = reviewer.handle(&mut batch, "4").await;
        assert!(cancelled.finished);
        assert!(store.list_reminders(CHAT).unwrap().is_empty());
        assert!(calendar.calls().is_empty());
    }

    #[tokio::test]
    async fn test_removing_everything_finishes() {
        let (reviewer, _store, _calendar) = setup();
        let mut batch = batch(vec![draft("A", DueMode::None, &[])]);
        let outcome = reviewer.handle(&mut batch, "remove 1").await;
        assert!(outcome.finished);
    }

    #[tokio::test]
    async fn test_edit_rejections_leave_draft_unchanged() {
        let (reviewer, _store, _calendar) = setup();
        let mut batch = batch(vec![draft("A", DueMode::None, &[])]);
        let before = batch.clone();

        for text in ["e 1 p:urgent", "e 1 at:whenever", "e 1 link:example.com", "e 4 title:X"] {
            let outcome = reviewer.handle(&mut batch, text).await;
            assert!(!outcome.finished, "{text}");
            assert_eq!(batch, before, "{text}");
        }

        reviewer.handle(&mut batch, "edit 1 title:Renew passport notes:bring photos").await;
        assert_eq!(batch.drafts[0].title, "Renew passport");
        assert_eq!(batch.drafts[0].notes, "bring photos");
    }

    #[tokio::test]
    async fn test_sync_failure_surfaced_not_rolled_back() {
        let store = Arc::new(SqliteReminderStore::in_memory().unwrap());
        let calendar = Arc::new(RecordingCalendar::failing());
        let reviewer = DraftReviewer::new(
            Materializer::new(store.clone(), calendar.clone()),
            TemporalResolver::new(),
            singapore(),
        );
        let mut batch = batch(vec![draft("A", DueMode::None, &[])]);

        let outcome = reviewer.handle(&mut batch, "1").await;
        assert!(outcome.finished);
        assert!(outcome.replies.iter().any(|r| r.text.contains("Calendar sync failed")));
        assert_eq!(store.list_reminders(CHAT).unwrap().len(), 1);
        assert!(matches!(calendar.calls()[0], CalendarCall::Upsert(_)));
    }
}
