//! Queue of reminders whose due date needs an explicit confirmation.
//!
//! Candidates with a low or medium confidence date wait here in FIFO order.
//! Only the head is ever discussed with the user; a correction replaces the
//! stored guess instead of queueing another round.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::info;

use nudge_core::{ConversationId, DueAt, NewReminder, Priority, Recurrence, ReminderFields, Reply, SourceKind};

use crate::context::FlowContext;
use crate::error::Result;

/// A reminder candidate awaiting confirmation of its due date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub title: String,
    pub topics: Vec<String>,
    pub priority: Priority,
    /// The current guess. Always set: candidates without a date never need
    /// confirmation.
    pub due_at: DueAt,
    pub recurrence: Option<Recurrence>,
    pub link: String,
    pub notes: String,
}

impl PendingConfirmation {
    fn to_new_reminder(&self, conversation_id: ConversationId) -> NewReminder {
        NewReminder {
            conversation_id,
            source_kind: SourceKind::UserInput,
            fields: ReminderFields {
                title: self.title.clone(),
                notes: self.notes.clone(),
                link: self.link.clone(),
                priority: self.priority,
                due_at: self.due_at,
                recurrence: self.recurrence,
            },
        }
    }
}

/// What the user meant by a reply to a pending confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyIntent {
    Confirm,
    Cancel,
    /// Anything else is read as a corrected date/time.
    Correction(String),
}

impl ReplyIntent {
    pub fn parse(text: &str) -> ReplyIntent {
        let trimmed = text.trim();
        match trimmed.to_lowercase().as_str() {
            "yes" | "y" | "confirm" | "ok" | "okay" => ReplyIntent::Confirm,
            "cancel" | "skip" => ReplyIntent::Cancel,
            _ => ReplyIntent::Correction(trimmed.to_string()),
        }
    }
}

/// Pending confirmations of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationQueue {
    items: VecDeque<PendingConfirmation>,
}

impl ConfirmationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: PendingConfirmation) {
        self.items.push_back(candidate);
    }

    pub fn head(&self) -> Option<&PendingConfirmation> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply one reply to the head of the queue.
    pub async fn handle_reply(
        &mut self,
        ctx: &FlowContext,
        conversation_id: ConversationId,
        text: &str,
    ) -> Result<Vec<Reply>> {
        let Some(head) = self.items.front() else {
            return Ok(Vec::new());
        };

        match ReplyIntent::parse(text) {
            ReplyIntent::Cancel => {
                self.items.pop_front();
                info!(conversation_id, remaining = self.items.len(), "Pending reminder skipped");
                let mut replies = vec![Reply::text("Skipped that reminder.")];
                replies.extend(self.announce_head(ctx));
                Ok(replies)
            }
            ReplyIntent::Confirm => self.commit_head(ctx, conversation_id).await,
            ReplyIntent::Correction(correction) => {
                let result = ctx.resolve(&correction).await;
                if !result.is_resolved() {
                    return Ok(vec![Reply::text(
                        "Could not parse that date/time. Reply `yes` to keep the guess, `cancel` to skip, or try `tomorrow 9am`.",
                    )]);
                }

                let due_at = result.due_at();
                let title = head.title.clone();
                if let Some(head) = self.items.front_mut() {
                    head.due_at = due_at;
                }
                if result.confidence == nudge_core::Confidence::High {
                    return self.commit_head(ctx, conversation_id).await;
                }

                info!(conversation_id, title = %title, confidence = %result.confidence, "Due guess replaced");
                Ok(vec![confirm_reply(format!(
                    "Updated guess: {} ({}). Reply `yes` to confirm, or send another date/time.",
                    ctx.due_display(&due_at),
                    ctx.timezone
                ))])
            }
        }
    }

    async fn commit_head(&mut self, ctx: &FlowContext, conversation_id: ConversationId) -> Result<Vec<Reply>> {
        let Some(head) = self.items.front() else {
            return Ok(Vec::new());
        };
        let done = ctx
            .materializer
            .materialize(head.to_new_reminder(conversation_id), &head.topics)
            .await?;
        self.items.pop_front();

        let mut replies = ctx.saved_replies(&done.reminder, done.sync_error);
        replies.extend(self.announce_head(ctx));
        Ok(replies)
    }

    /// The due-date question for the current head, if any.
    pub fn announce_head(&self, ctx: &FlowContext) -> Option<Reply> {
        self.head().map(|head| due_guess_reply(ctx, head))
    }
}

pub fn due_guess_reply(ctx: &FlowContext, candidate: &PendingConfirmation) -> Reply {
    confirm_reply(format!(
        "'{}': I read the due date as {} ({}). Reply `yes` to confirm, `cancel` to skip, or send the correct date/time.",
        candidate.title,
        ctx.due_display(&candidate.due_at),
        ctx.timezone
    ))
}

fn confirm_reply(text: String) -> Reply {
    Reply::text(text)
        .with_action("Yes", "yes")
        .with_action("Cancel", "cancel")
}
