use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use nudge_core::format::format_detail;
use nudge_core::{ConversationId, ReminderId, Reply};

use super::{is_stop, Turn};
use crate::context::FlowContext;
use crate::error::Result;

static COMMAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(view|edit|clear)\s+#?(\d+)$").expect("valid regex"));

const MENU: &str = "Choose: `list`, `view <id>`, `edit <id>`, `clear <id>`, or `cancel`.";
const EDIT_PROMPT: &str = "Send new notes text now, or `clear` to remove, or `cancel`.";
const MAX_LISTED: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotesWizard {
    Menu,
    EditText { id: ReminderId },
}

impl NotesWizard {
    pub fn start() -> (NotesWizard, Reply) {
        (NotesWizard::Menu, menu_reply(format!("Notes wizard. {}", MENU)))
    }

    pub async fn handle(self, ctx: &FlowContext, conversation_id: ConversationId, text: &str) -> Result<Turn<NotesWizard>> {
        let raw = text.trim();
        let lowered = raw.to_lowercase();
        if is_stop(&lowered) {
            return Ok(Turn::done(vec![Reply::text("Notes flow cancelled.")]));
        }

        match self {
            NotesWizard::Menu => Self::menu(ctx, conversation_id, raw, &lowered).await,
            NotesWizard::EditText { id } => {
                let notes = if lowered == "clear" { "" } else { raw };
                let reply = match write_notes(ctx, conversation_id, id, notes).await? {
                    true => Reply::text(format!("Updated notes for #{}.", id)),
                    false => not_found(id),
                };
                Ok(Turn {
                    replies: vec![reply, menu_reply(format!("Notes wizard. {}", MENU))],
                    next: Some(NotesWizard::Menu),
                })
            }
        }
    }

    async fn menu(ctx: &FlowContext, conversation_id: ConversationId, raw: &str, lowered: &str) -> Result<Turn<NotesWizard>> {
        if lowered == "list" {
            return Ok(Turn::stay(NotesWizard::Menu, list_reply(ctx, conversation_id)?));
        }

        let Some(caps) = COMMAND_RE.captures(raw) else {
            return Ok(Turn::stay(NotesWizard::Menu, menu_reply(MENU.to_string())));
        };
        let Ok(id) = caps[2].parse::<ReminderId>() else {
            return Ok(Turn::stay(NotesWizard::Menu, menu_reply(MENU.to_string())));
        };

        let reply = match caps[1].to_lowercase().as_str() {
            "view" => match ctx.store().get_reminder(conversation_id, id)? {
                None => not_found(id),
                Some(r) if r.fields.notes.trim().is_empty() => {
                    Reply::text(format!("Reminder #{} has no notes.", id))
                }
                Some(r) => Reply::text(format_detail(&r, ctx.timezone)),
            },
            "edit" => {
                if ctx.store().get_reminder(conversation_id, id)?.is_none() {
                    not_found(id)
                } else {
                    return Ok(Turn::stay(
                        NotesWizard::EditText { id },
                        Reply::text(EDIT_PROMPT).with_action("Clear", "clear").with_action("Cancel", "cancel"),
                    ));
                }
            }
            _ => match write_notes(ctx, conversation_id, id, "").await? {
                true => Reply::text(format!("Cleared notes for #{}.", id)),
                false => not_found(id),
            },
        };
        Ok(Turn::stay(NotesWizard::Menu, reply))
    }
}

fn list_reply(ctx: &FlowContext, conversation_id: ConversationId) -> Result<Reply> {
    let with_notes: Vec<_> = ctx
        .store()
        .list_reminders(conversation_id)?
        .into_iter()
        .filter(|r| !r.fields.notes.trim().is_empty())
        .take(MAX_LISTED)
        .collect();
    if with_notes.is_empty() {
        return Ok(Reply::text("No reminders with notes yet."));
    }

    let mut lines = vec!["Reminders with notes:".to_string()];
    lines.extend(with_notes.iter().map(|r| format!("- #{} {}", r.id, r.fields.title)));
    lines.push("\nUse `view <id>`, `edit <id>`, `clear <id>`, or `cancel`.".to_string());
    Ok(menu_reply(lines.join("\n")))
}

/// Replace the notes of one reminder and push the change to the calendar.
/// Returns `false` when the reminder does not exist.
async fn write_notes(ctx: &FlowContext, conversation_id: ConversationId, id: ReminderId, notes: &str) -> Result<bool> {
    let store = ctx.store();
    let Some(existing) = store.get_reminder(conversation_id, id)? else {
        return Ok(false);
    };
    let mut fields = existing.fields;
    fields.notes = notes.to_string();
    let updated = store.update_reminder(conversation_id, id, &fields)?;
    info!(conversation_id, reminder_id = id, cleared = notes.is_empty(), "Notes updated");

    // Sync failures are logged by the materializer and never undo the edit.
    ctx.materializer.resync(&updated).await;
    Ok(true)
}

fn not_found(id: ReminderId) -> Reply {
    Reply::text(format!("Reminder #{} not found.", id))
}

fn menu_reply(text: String) -> Reply {
    Reply::text(text)
        .with_action("List", "list")
        .with_action("Cancel", "cancel")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use nudge_core::{
        CalendarCall, Materializer, NewReminder, RecordingCalendar, ReminderFields, ReminderStore, SourceKind,
    };
    use nudge_storage::SqliteReminderStore;
    use nudge_temporal::TemporalResolver;

    const CHAT: ConversationId = 5;

    fn setup() -> (FlowContext, Arc<SqliteReminderStore>, Arc<RecordingCalendar>) {
        let store = Arc::new(SqliteReminderStore::in_memory().unwrap());
        let calendar = Arc::new(RecordingCalendar::new());
        let ctx = FlowContext::new(
            Materializer::new(store.clone(), calendar.clone()),
            TemporalResolver::new(),
            chrono_tz::UTC,
        );
        for (title, notes) in [("Pack bags", "passport, charger"), ("Water plants", "")] {
            store
                .create_reminder(&NewReminder {
                    conversation_id: CHAT,
                    source_kind: SourceKind::UserInput,
                    fields: ReminderFields {
                        title: title.to_string(),
                        notes: notes.to_string(),
                        ..Default::default()
                    },
                })
                .unwrap();
        }
        (ctx, store, calendar)
    }

    #[tokio::test]
    async fn test_list_only_shows_reminders_with_notes() {
        let (ctx, _store, _calendar) = setup();
        let turn = NotesWizard::Menu.handle(&ctx, CHAT, "list").await.unwrap();
        assert_eq!(turn.next, Some(NotesWizard::Menu));
        let text = &turn.replies[0].text;
        assert!(text.starts_with("Reminders with notes:\n- #1 Pack bags"));
        assert!(!text.contains("Water plants"));
    }

    #[tokio::test]
    async fn test_edit_then_write_notes() {
        let (ctx, store, calendar) = setup();
        let turn = NotesWizard::Menu.handle(&ctx, CHAT, "edit 2").await.unwrap();
        assert_eq!(turn.next, Some(NotesWizard::EditText { id: 2 }));
        assert_eq!(turn.replies[0].text, EDIT_PROMPT);

        let turn = turn.next.unwrap().handle(&ctx, CHAT, "twice a week").await.unwrap();
        assert_eq!(turn.next, Some(NotesWizard::Menu));
        assert_eq!(turn.replies[0].text, "Updated notes for #2.");
        assert_eq!(store.get_reminder(CHAT, 2).unwrap().unwrap().fields.notes, "twice a week");
        assert_eq!(calendar.calls(), vec![CalendarCall::Upsert(2)]);
    }

    #[tokio::test]
    async fn test_clear_and_view() {
        let (ctx, store, _calendar) = setup();
        let turn = NotesWizard::Menu.handle(&ctx, CHAT, "view 1").await.unwrap();
        assert!(turn.replies[0].text.contains("passport, charger"));

        let turn = NotesWizard::Menu.handle(&ctx, CHAT, "clear #1").await.unwrap();
        assert_eq!(turn.replies[0].text, "Cleared notes for #1.");
        assert!(store.get_reminder(CHAT, 1).unwrap().unwrap().fields.notes.is_empty());

        let turn = NotesWizard::Menu.handle(&ctx, CHAT, "view 1").await.unwrap();
        assert_eq!(turn.replies[0].text, "Reminder #1 has no notes.");
    }

    #[tokio::test]
    async fn test_unknown_id_and_cancel() {
        let (ctx, _store, _calendar) = setup();
        let turn = NotesWizard::Menu.handle(&ctx, CHAT, "edit 9").await.unwrap();
        assert_eq!(turn.next, Some(NotesWizard::Menu));
        assert_eq!(turn.replies[0].text, "Reminder #9 not found.");

        let turn = NotesWizard::EditText { id: 1 }.handle(&ctx, CHAT, "stop").await.unwrap();
        assert!(turn.next.is_none());
        assert_eq!(turn.replies[0].text, "Notes flow cancelled.");
    }
}
