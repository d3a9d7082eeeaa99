use tracing::{info, warn};

use nudge_core::{ConversationId, ReminderId, Reply};

use super::{is_stop, Turn};
use crate::context::FlowContext;
use crate::error::Result;

/// Two-step delete: pick an id, then confirm against the shown title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteWizard {
    AwaitingId,
    AwaitingConfirm { id: ReminderId, title: String },
}

impl DeleteWizard {
    pub fn start() -> (DeleteWizard, Reply) {
        (
            DeleteWizard::AwaitingId,
            Reply::text("Delete wizard: enter reminder ID to delete, or `cancel`.").with_action("Cancel", "cancel"),
        )
    }

    /// Skip the id step when the command already named one.
    pub fn for_id(ctx: &FlowContext, conversation_id: ConversationId, id: ReminderId) -> Result<Turn<DeleteWizard>> {
        match ctx.store().get_reminder(conversation_id, id)? {
            Some(reminder) => Ok(confirm_turn(id, reminder.fields.title)),
            None => Ok(Turn::done(vec![Reply::text(format!("Reminder #{} not found.", id))])),
        }
    }

    pub async fn handle(self, ctx: &FlowContext, conversation_id: ConversationId, text: &str) -> Result<Turn<DeleteWizard>> {
        let raw = text.trim();
        let lowered = raw.to_lowercase();
        if is_stop(&lowered) {
            return Ok(Turn::done(vec![Reply::text("Delete flow cancelled.")]));
        }

        match self {
            DeleteWizard::AwaitingId => match raw.trim_start_matches('#').parse::<ReminderId>() {
                Ok(id) => Self::for_id(ctx, conversation_id, id),
                Err(_) => Ok(Turn::stay(
                    DeleteWizard::AwaitingId,
                    Reply::text("Please enter a numeric reminder ID, or `cancel`."),
                )),
            },
            DeleteWizard::AwaitingConfirm { id, .. } => {
                if !matches!(lowered.as_str(), "yes" | "confirm" | "delete") {
                    return Ok(Turn::done(vec![Reply::text("Delete cancelled.")]));
                }
                Ok(Turn::done(vec![delete_reminder(ctx, conversation_id, id).await?]))
            }
        }
    }
}

fn confirm_turn(id: ReminderId, title: String) -> Turn<DeleteWizard> {
    let prompt = format!("Delete reminder #{} '{}'? Reply `yes` to confirm or `cancel`.", id, title);
    Turn::stay(
        DeleteWizard::AwaitingConfirm { id, title },
        Reply::text(prompt)
            .with_action("Delete", "yes")
            .with_action("Cancel", "cancel"),
    )
}

/// Remove the calendar mirror first, then the reminder. A failing calendar
/// hook is logged and never blocks the delete.
async fn delete_reminder(ctx: &FlowContext, conversation_id: ConversationId, id: ReminderId) -> Result<Reply> {
    let store = ctx.store();
    let Some(reminder) = store.get_reminder(conversation_id, id)? else {
        return Ok(Reply::text(format!("Reminder #{} not found.", id)));
    };
    if let Err(e) = ctx.materializer.calendar().delete(&reminder).await {
        warn!(reminder_id = id, error = %e, "Calendar delete failed");
    }
    if !store.delete_reminder(conversation_id, id)? {
        return Ok(Reply::text(format!("Reminder #{} not found.", id)));
    }
    info!(conversation_id, reminder_id = id, "Reminder deleted");
    Ok(Reply::text(format!("Reminder #{} permanently deleted.", id)))
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

    const CHAT: ConversationId = 2;

    fn setup(calendar: RecordingCalendar) -> (FlowContext, Arc<SqliteReminderStore>, Arc<RecordingCalendar>) {
        let store = Arc::new(SqliteReminderStore::in_memory().unwrap());
        let calendar = Arc::new(calendar);
        let ctx = FlowContext::new(
            Materializer::new(store.clone(), calendar.clone()),
            TemporalResolver::new(),
            chrono_tz::UTC,
        );
        store
            .create_reminder(&NewReminder {
                conversation_id: CHAT,
                source_kind: SourceKind::UserInput,
                fields: ReminderFields {
                    title: "Cancel gym".to_string(),
                    ..Default::default()
                },
            })
            .unwrap();
        (ctx, store, calendar)
    }

    #[tokio::test]
    async fn test_delete_after_confirmation() {
        let (ctx, store, calendar) = setup(RecordingCalendar::new());
        let (wizard, _) = DeleteWizard::start();

        let turn = wizard.handle(&ctx, CHAT, "abc").await.unwrap();
        assert_eq!(turn.next, Some(DeleteWizard::AwaitingId));

        let turn = turn.next.unwrap().handle(&ctx, CHAT, "1").await.unwrap();
        assert_eq!(
            turn.replies[0].text,
            "Delete reminder #1 'Cancel gym'? Reply `yes` to confirm or `cancel`."
        );

        let turn = turn.next.unwrap().handle(&ctx, CHAT, "yes").await.unwrap();
        assert!(turn.next.is_none());
        assert_eq!(turn.replies[0].text, "Reminder #1 permanently deleted.");
        assert!(store.get_reminder(CHAT, 1).unwrap().is_none());
        assert_eq!(calendar.calls(), vec![CalendarCall::Delete(1)]);
    }

    #[tokio::test]
    async fn test_anything_but_yes_keeps_reminder() {
        let (ctx, store, _calendar) = setup(RecordingCalendar::new());
        let wizard = DeleteWizard::AwaitingConfirm {
            id: 1,
            title: "Cancel gym".to_string(),
        };
        let turn = wizard.handle(&ctx, CHAT, "hmm").await.unwrap();
        assert!(turn.next.is_none());
        assert_eq!(turn.replies[0].text, "Delete cancelled.");
        assert!(store.get_reminder(CHAT, 1).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_id_ends_wizard() {
        let (ctx, _store, _calendar) = setup(RecordingCalendar::new());
        let turn = DeleteWizard::AwaitingId.handle(&ctx, CHAT, "42").await.unwrap();
        assert!(turn.next.is_none());
        assert_eq!(turn.replies[0].text, "Reminder #42 not found.");
    }

    #[tokio::test]
    async fn test_calendar_failure_does_not_block_delete() {
        let (ctx, store, _calendar) = setup(RecordingCalendar::failing());
        let wizard = DeleteWizard::AwaitingConfirm {
            id: 1,
            title: "Cancel gym".to_string(),
        };
        let turn = wizard.handle(&ctx, CHAT, "delete").await.unwrap();
        assert_eq!(turn.replies[0].text, "Reminder #1 permanently deleted.");
        assert!(store.get_reminder(CHAT, 1).unwrap().is_none());
    }
}
