//! Interfaces to the collaborators around the reminder core: the entity
//! store, the calendar mirror and the outbound message channel.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{NudgeError, Result};
use crate::types::{ConversationId, NewReminder, Reminder, ReminderFields, ReminderId, Topic, TopicId};

// =============================================================================
// Entity store
// =============================================================================

/// CRUD for reminders and topics, scoped by conversation.
///
/// Topic names are unique per conversation, compared case-insensitively.
pub trait ReminderStore: Send + Sync {
    fn create_reminder(&self, new: &NewReminder) -> Result<Reminder>;

    fn get_reminder(&self, conversation_id: ConversationId, id: ReminderId)
        -> Result<Option<Reminder>>;

    fn update_reminder(
        &self,
        conversation_id: ConversationId,
        id: ReminderId,
        fields: &ReminderFields,
    ) -> Result<Reminder>;

    /// Returns `false` when no such reminder existed.
    fn delete_reminder(&self, conversation_id: ConversationId, id: ReminderId) -> Result<bool>;

    fn list_reminders(&self, conversation_id: ConversationId) -> Result<Vec<Reminder>>;

    /// Replace the reminder's topic set. Names that are not in the
    /// conversation's vocabulary are ignored.
    fn set_reminder_topics(
        &self,
        conversation_id: ConversationId,
        id: ReminderId,
        topics: &[String],
    ) -> Result<()>;

    fn list_topics(&self, conversation_id: ConversationId) -> Result<Vec<Topic>>;

    /// Create a topic, or return the existing one with the same name.
    fn create_topic(&self, conversation_id: ConversationId, name: &str) -> Result<Topic>;

    fn rename_topic(&self, conversation_id: ConversationId, id: TopicId, name: &str)
        -> Result<Topic>;

    fn delete_topic(&self, conversation_id: ConversationId, id: TopicId) -> Result<bool>;

    /// Move every reminder from `from` onto `into`, then delete `from`.
    fn merge_topics(
        &self,
        conversation_id: ConversationId,
        from: TopicId,
        into: TopicId,
    ) -> Result<Topic>;

    /// The conversation's closed topic vocabulary.
    fn topic_names(&self, conversation_id: ConversationId) -> Result<Vec<String>> {
        Ok(self
            .list_topics(conversation_id)?
            .into_iter()
            .map(|t| t.name)
            .collect())
    }
}

// =============================================================================
// Calendar mirror
// =============================================================================

/// Best-effort mirroring of reminders into an external calendar.
#[async_trait]
pub trait CalendarSync: Send + Sync {
    async fn upsert(&self, reminder: &Reminder) -> Result<()>;
    async fn delete(&self, reminder: &Reminder) -> Result<()>;
}

/// Calendar hook used when no calendar is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCalendarSync;

#[async_trait]
impl CalendarSync for NoopCalendarSync {
    async fn upsert(&self, _reminder: &Reminder) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _reminder: &Reminder) -> Result<()> {
        Ok(())
    }
}

/// Calendar call as seen by [`RecordingCalendar`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarCall {
    Upsert(ReminderId),
    Delete(ReminderId),
}

/// Calendar double that records every call and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingCalendar {
    calls: Mutex<Vec<CalendarCall>>,
    fail: bool,
}

impl RecordingCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// A calendar whose every call fails after being recorded.
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<CalendarCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: CalendarCall) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if self.fail {
            return Err(NudgeError::CalendarSync("calendar unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CalendarSync for RecordingCalendar {
    async fn upsert(&self, reminder: &Reminder) -> Result<()> {
        self.record(CalendarCall::Upsert(reminder.id))
    }

    async fn delete(&self, reminder: &Reminder) -> Result<()> {
        self.record(CalendarCall::Delete(reminder.id))
    }
}

// =============================================================================
// Outbound messages
// =============================================================================

/// An inline action affordance attached to a reply (e.g. a button).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyAction {
    pub label: String,
    /// Text fed back into the dispatcher when the action is chosen.
    pub payload: String,
}

/// A text reply with optional actions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub actions: Vec<ReplyAction>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, label: impl Into<String>, payload: impl Into<String>) -> Self {
        self.actions.push(ReplyAction {
            label: label.into(),
            payload: payload.into(),
        });
        self
    }
}

/// Delivery of replies to a conversation.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, conversation_id: ConversationId, reply: &Reply) -> Result<()>;
}

/// Channel that only logs outgoing replies.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

#[async_trait]
impl MessageChannel for LogChannel {
    async fn send(&self, conversation_id: ConversationId, reply: &Reply) -> Result<()> {
        info!(conversation_id, actions = reply.actions.len(), "reply: {}", reply.text);
        Ok(())
    }
}
