//! Five-step add dialog: due, priority, topics, repeat interval, extras.

use nudge_core::{ConversationId, DueAt, NewReminder, Priority, Recurrence, ReminderFields, Reply, SourceKind};
use nudge_draft::split_fields;
use nudge_draft::refine::is_valid_link;

use super::{is_skip, is_stop, Turn};
use crate::context::FlowContext;
use crate::error::Result;
use crate::topics::{check_topics, split_topics};

pub const DUE_PROMPT: &str = "Step 1/5 - Add due date/time (e.g. `tomorrow 9am`) or `skip` for no due.";
pub const PRIORITY_PROMPT: &str = "Step 2/5 - Priority? `immediate`, `high`, `mid`, `low` or `skip` (mid).";
pub const TOPIC_PROMPT: &str = "Step 3/5 - Topic(s)? comma-separated topic names or `skip`.";
pub const RECURRENCE_PROMPT: &str = "Step 4/5 - Repeat interval? `daily`, `weekly`, `monthly`, or `skip`.";
pub const EXTRAS_PROMPT: &str = "Step 5/5 - Add `link:<url>` and/or `notes:<text>`, or `skip`.";

pub const INVALID_PRIORITY: &str = "Invalid priority. Use `immediate`, `high`, `mid`, `low`, or `skip`.";
pub const TOPIC_REQUIRED: &str = "At least one topic is required. Enter topic names, or create one with /topics.";
pub const RECURRENCE_NEEDS_DUE: &str =
    "A repeat interval needs a due date. Use `skip`, or `cancel` and start again with a due date.";

/// Fields fixed by the first two steps.
#[derive(Debug, Clone, PartialEq)]
pub struct AddBase {
    pub title: String,
    pub due_at: DueAt,
    pub priority: Priority,
}

/// Current step, carrying exactly what earlier steps collected.
#[derive(Debug, Clone, PartialEq)]
pub enum AddWizard {
    Due {
        title: String,
    },
    Priority {
        title: String,
        due_at: DueAt,
    },
    Topic {
        base: AddBase,
    },
    Recurrence {
        base: AddBase,
        topics: Vec<String>,
    },
    Extras {
        base: AddBase,
        topics: Vec<String>,
        recurrence: Option<Recurrence>,
    },
}

impl AddWizard {
    /// Start the dialog for `title`, returning the first prompt.
    pub fn start(title: &str) -> (AddWizard, Reply) {
        let wizard = AddWizard::Due {
            title: title.trim().to_string(),
        };
        (wizard, Reply::text(format!("Got it. {}", DUE_PROMPT)))
    }

    pub async fn handle(self, ctx: &FlowContext, conversation_id: ConversationId, text: &str) -> Result<Turn<AddWizard>> {
        let raw = text.trim();
        let lowered = raw.to_lowercase();
        if is_stop(&lowered) {
            return Ok(Turn::done(vec![Reply::text("Add flow cancelled.")]));
        }

        match self {
            AddWizard::Due { title } => {
                let due_at = if is_skip(&lowered) {
                    DueAt::NONE
                } else {
                    let result = ctx.resolve(raw).await;
                    if !result.is_resolved() {
                        return Ok(Turn::stay(
                            AddWizard::Due { title },
                            Reply::text("Could not parse date/time. Try `tomorrow 9am`, `next fri 3pm`, or `skip`."),
                        ));
                    }
                    result.due_at()
                };
                Ok(Turn::stay(AddWizard::Priority { title, due_at }, Reply::text(PRIORITY_PROMPT)))
            }

            AddWizard::Priority { title, due_at } => {
                let priority = if is_skip(&lowered) {
                    Priority::Mid
                } else {
                    match Priority::from_token(&lowered) {
                        Some(p) => p,
                        None => {
                            return Ok(Turn::stay(
                                AddWizard::Priority { title, due_at },
                                Reply::text(INVALID_PRIORITY),
                            ))
                        }
                    }
                };
                let base = AddBase {
                    title,
                    due_at,
                    priority,
                };
                Ok(Turn::stay(AddWizard::Topic { base }, Reply::text(TOPIC_PROMPT)))
            }

            AddWizard::Topic { base } => {
                let topics = if is_skip(&lowered) { Vec::new() } else { split_topics(raw) };
                if topics.is_empty() && ctx.require_topic {
                    return Ok(Turn::stay(AddWizard::Topic { base }, Reply::text(TOPIC_REQUIRED)));
                }
                if let Some(message) = check_topics(ctx.store().as_ref(), conversation_id, &topics)? {
                    return Ok(Turn::stay(AddWizard::Topic { base }, Reply::text(message)));
                }
                Ok(Turn::stay(
                    AddWizard::Recurrence { base, topics },
                    Reply::text(RECURRENCE_PROMPT),
                ))
            }

            AddWizard::Recurrence { base, topics } => {
                let recurrence = if is_skip(&lowered) {
                    None
                } else {
                    match lowered.parse::<Recurrence>() {
                        Ok(rule) if base.due_at.is_set() => Some(rule),
                        Ok(_) => {
                            return Ok(Turn::stay(
                                AddWizard::Recurrence { base, topics },
                                Reply::text(RECURRENCE_NEEDS_DUE),
                            ))
                        }
                        Err(_) => {
                            return Ok(Turn::stay(
                                AddWizard::Recurrence { base, topics },
                                Reply::text("Invalid interval. Use `daily`, `weekly`, `monthly`, or `skip`."),
                            ))
                        }
                    }
                };
                Ok(Turn::stay(
                    AddWizard::Extras {
                        base,
                        topics,
                        recurrence,
                    },
                    Reply::text(EXTRAS_PROMPT),
                ))
            }

            AddWizard::Extras {
                base,
                topics,
                recurrence,
            } => {
                let (link, notes) = if is_skip(&lowered) {
                    (String::new(), String::new())
                } else {
                    match parse_extras(raw) {
                        Some(extras) => extras,
                        None => {
                            return Ok(Turn::stay(
                                AddWizard::Extras {
                                    base,
                                    topics,
                                    recurrence,
                                },
                                Reply::text("Invalid link. Use `link:https://...`, `notes:<text>`, or `skip`."),
                            ))
                        }
                    }
                };

                let new = NewReminder {
                    conversation_id,
                    source_kind: SourceKind::UserInput,
                    fields: ReminderFields {
                        title: base.title,
                        notes,
                        link,
                        priority: base.priority,
                        due_at: base.due_at,
                        recurrence,
                    },
                };
                let done = ctx.materializer.materialize(new, &topics).await?;
                Ok(Turn::done(ctx.saved_replies(&done.reminder, done.sync_error)))
            }
        }
    }
}

/// `(link, notes)` from the extras step. A bare URL is the link; text
/// without keys is the notes. `None` when a `link:` value is not a URL.
fn parse_extras(raw: &str) -> Option<(String, String)> {
    let split = split_fields(raw);
    if !split.has_fields() {
        if is_valid_link(raw) {
            return Some((raw.to_string(), String::new()));
        }
        return Some((String::new(), raw.to_string()));
    }

    let link = match split.get(&["link"]) {
        Some(value) => {
            let value = value.trim_end_matches([')', '.', ',', ']']);
            if !is_valid_link(value) {
                return None;
            }
            value.to_string()
        }
        None => String::new(),
    };
    let notes = split.get(&["notes"]).unwrap_or_default().to_string();
    Some((link, notes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use chrono_tz::Tz;
    use nudge_core::{Clock, Materializer, RecordingCalendar, ReminderStore};
    use nudge_storage::SqliteReminderStore;
    use nudge_temporal::TemporalResolver;

    const CHAT: ConversationId = 3;

    fn setup() -> (FlowContext, Arc<SqliteReminderStore>) {
        let tz: Tz = "Asia/Singapore".parse().unwrap();
        let now = tz.with_ymd_and_hms(2026, 2, 21, 10, 0, 0).unwrap().with_timezone(&Utc);
        let store = Arc::new(SqliteReminderStore::in_memory().unwrap());
        let ctx = FlowContext::new(
            Materializer::new(store.clone(), Arc::new(RecordingCalendar::new())),
            TemporalResolver::new(),
            tz,
        )
        .with_clock(Clock::fixed(now));
        (ctx, store)
    }

    async fn step(ctx: &FlowContext, wizard: AddWizard, text: &str) -> Turn<AddWizard> {
        wizard.handle(ctx, CHAT, text).await.unwrap()
    }

    #[tokio::test]
    async fn test_full_dialog_materializes() {
        let (ctx, store) = setup();
        store.create_topic(CHAT, "Home").unwrap();
        let (wizard, first) = AddWizard::start("Water plants");
        assert!(first.text.contains("Step 1/5"));

        let turn = step(&ctx, wizard, "tomorrow 9am").await;
        assert_eq!(turn.replies[0].text, PRIORITY_PROMPT);
        let turn = step(&ctx, turn.next.unwrap(), "h").await;
        let turn = step(&ctx, turn.next.unwrap(), "home").await;
        let turn = step(&ctx, turn.next.unwrap(), "weekly").await;
        let turn = step(&ctx, turn.next.unwrap(), "link:https://example.com/plants notes:use rain water").await;
        assert!(turn.next.is_none());

        let saved = &store.list_reminders(CHAT).unwrap()[0];
        assert_eq!(saved.fields.title, "Water plants");
        assert_eq!(saved.fields.priority, Priority::High);
        assert_eq!(saved.fields.recurrence, Some(Recurrence::Weekly));
        assert_eq!(saved.fields.link, "https://example.com/plants");
        assert_eq!(saved.fields.notes, "use rain water");
        assert_eq!(saved.topics, vec!["Home".to_string()]);
        assert_eq!(saved.fields.due_at.to_storage(), "2026-02-22T01:00:00+00:00");
    }

    #[tokio::test]
    async fn test_invalid_priority_reprompts_without_change() {
        let (ctx, _store) = setup();
        let wizard = AddWizard::Priority {
            title: "Call bank".to_string(),
            due_at: DueAt::NONE,
        };
        let turn = step(&ctx, wizard.clone(), "urgent").await;
        assert_eq!(turn.replies[0].text, INVALID_PRIORITY);
        assert_eq!(turn.next, Some(wizard));
    }

    #[tokio::test]
    async fn test_unparseable_due_reprompts() {
        let (ctx, _store) = setup();
        let (wizard, _) = AddWizard::start("Call bank");
        let turn = step(&ctx, wizard.clone(), "when pigs fly").await;
        assert!(turn.replies[0].text.starts_with("Could not parse date/time"));
        assert_eq!(turn.next, Some(wizard));
    }

    #[tokio::test]
    async fn test_unknown_topic_suggests_and_stays() {
        let (ctx, store) = setup();
        store.create_topic(CHAT, "Finance").unwrap();
        let wizard = AddWizard::Topic {
            base: AddBase {
                title: "Pay tax".to_string(),
                due_at: DueAt::NONE,
                priority: Priority::Mid,
            },
        };
        let turn = step(&ctx, wizard.clone(), "finanse").await;
        assert!(turn.replies[0].text.contains("Did you mean: Finance?"));
        assert_eq!(turn.next, Some(wizard));
    }

    #[tokio::test]
    async fn test_topic_required_policy() {
        let (ctx, _store) = setup();
        let ctx = ctx.with_require_topic(true);
        let wizard = AddWizard::Topic {
            base: AddBase {
                title: "Pay tax".to_string(),
                due_at: DueAt::NONE,
                priority: Priority::Mid,
            },
        };
        let turn = step(&ctx, wizard, "skip").await;
        assert_eq!(turn.replies[0].text, TOPIC_REQUIRED);
    }

    #[tokio::test]
    async fn test_recurrence_requires_due() {
        let (ctx, _store) = setup();
        let wizard = AddWizard::Recurrence {
            base: AddBase {
                title: "Stretch".to_string(),
                due_at: DueAt::NONE,
                priority: Priority::Low,
            },
            topics: vec![],
        };
        let turn = step(&ctx, wizard.clone(), "daily").await;
        assert_eq!(turn.replies[0].text, RECURRENCE_NEEDS_DUE);
        assert_eq!(turn.next, Some(wizard));
    }

    #[tokio::test]
    async fn test_cancel_creates_nothing() {
        let (ctx, store) = setup();
        let (wizard, _) = AddWizard::start("Call bank");
        let turn = step(&ctx, wizard, "Cancel").await;
        assert!(turn.next.is_none());
        assert_eq!(turn.replies[0].text, "Add flow cancelled.");
        assert!(store.list_reminders(CHAT).unwrap().is_empty());
    }

    #[test]
    fn test_parse_extras() {
        assert_eq!(
            parse_extras("https://example.com"),
            Some(("https://example.com".to_string(), String::new()))
        );
        assert_eq!(
            parse_extras("bring the receipts"),
            Some((String::new(), "bring the receipts".to_string()))
        );
        assert_eq!(parse_extras("link:example.com"), None);
    }
}
