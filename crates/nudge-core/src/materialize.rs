use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{NudgeError, Result};
use crate::ports::{CalendarSync, ReminderStore};
use crate::types::{NewReminder, Reminder};

/// Outcome of persisting a reminder.
#[derive(Debug, Clone)]
pub struct Materialized {
    pub reminder: Reminder,
    /// Set when the calendar hook failed. The reminder stays persisted.
    pub sync_error: Option<String>,
}

/// Turns a validated candidate into a persisted reminder.
///
/// Order is fixed: create the entity, attach topics, then call the calendar
/// hook. A failing hook is reported through [`Materialized::sync_error`] and
/// never undoes the earlier steps.
#[derive(Clone)]
pub struct Materializer {
    store: Arc<dyn ReminderStore>,
    calendar: Arc<dyn CalendarSync>,
}

impl Materializer {
    pub fn new(store: Arc<dyn ReminderStore>, calendar: Arc<dyn CalendarSync>) -> Self {
        Self { store, calendar }
    }

    pub fn store(&self) -> &Arc<dyn ReminderStore> {
        &self.store
    }

    pub fn calendar(&self) -> &Arc<dyn CalendarSync> {
        &self.calendar
    }

    pub async fn materialize(&self, new: NewReminder, topics: &[String]) -> Result<Materialized> {
        new.fields.validate().map_err(NudgeError::Validation)?;

        let created = self.store.create_reminder(&new)?;
        let conversation_id = created.conversation_id;

        // Once the row exists, later failures are logged only so a retry
        // never persists a second copy.
        if !topics.is_empty() {
            if let Err(e) = self.store.set_reminder_topics(conversation_id, created.id, topics) {
                warn!(reminder_id = created.id, error = %e, "Attaching topics failed");
            }
        }
        let reminder = match self.store.get_reminder(conversation_id, created.id) {
            Ok(Some(reminder)) => reminder,
            Ok(None) => created,
            Err(e) => {
                warn!(reminder_id = created.id, error = %e, "Re-reading created reminder failed");
                created
            }
        };

        info!(
            conversation_id,
            reminder_id = reminder.id,
            topics = reminder.topics.len(),
            "Reminder created"
        );

        let sync_error = match self.calendar.upsert(&reminder).await {
            Ok(()) => None,
            Err(e) => {
                warn!(reminder_id = reminder.id, error = %e, "Calendar sync failed");
                Some(e.to_string())
            }
        };

        Ok(Materialized {
            reminder,
            sync_error,
        })
    }

    /// Push an updated reminder to the calendar, logging failures.
    pub async fn resync(&self, reminder: &Reminder) -> Option<String> {
        match self.calendar.upsert(reminder).await {
            Ok(()) => None,
            Err(e) => {
                warn!(reminder_id = reminder.id, error = %e, "Calendar resync failed");
                Some(e.to_string())
            }
        }
    }
}
