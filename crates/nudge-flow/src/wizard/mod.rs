//! Step-based dialogs. Each wizard is a state value that consumes one user
//! reply and yields the next state, or `None` when the dialog is over.
//!
//! `cancel`/`stop` ends any wizard. Invalid input re-prompts and leaves the
//! state exactly as it was.

pub mod add;
pub mod delete;
pub mod edit;
pub mod notes;
pub mod topics;

use nudge_core::{ConversationId, Reply};

use crate::context::FlowContext;
use crate::error::Result;

pub use add::AddWizard;
pub use delete::DeleteWizard;
pub use edit::EditWizard;
pub use notes::NotesWizard;
pub use topics::TopicsWizard;

/// Replies produced by one wizard step plus the state that follows it.
#[derive(Debug, Clone)]
pub struct Turn<S> {
    pub replies: Vec<Reply>,
    pub next: Option<S>,
}

impl<S> Turn<S> {
    pub fn stay(state: S, reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            next: Some(state),
        }
    }

    pub fn done(replies: Vec<Reply>) -> Self {
        Self { replies, next: None }
    }

    pub fn map<T>(self, f: impl FnOnce(S) -> T) -> Turn<T> {
        Turn {
            replies: self.replies,
            next: self.next.map(f),
        }
    }
}

pub(crate) fn is_stop(lowered: &str) -> bool {
    matches!(lowered, "cancel" | "stop")
}

pub(crate) fn is_skip(lowered: &str) -> bool {
    matches!(lowered, "skip" | "none" | "no")
}

/// The active wizard of a conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Wizard {
    Add(AddWizard),
    Edit(EditWizard),
    Delete(DeleteWizard),
    Notes(NotesWizard),
    Topics(TopicsWizard),
}

impl Wizard {
    pub fn name(&self) -> &'static str {
        match self {
            Wizard::Add(_) => "add",
            Wizard::Edit(_) => "edit",
            Wizard::Delete(_) => "delete",
            Wizard::Notes(_) => "notes",
            Wizard::Topics(_) => "topics",
        }
    }

    pub async fn handle(
        self,
        ctx: &FlowContext,
        conversation_id: ConversationId,
        text: &str,
    ) -> Result<Turn<Wizard>> {
        Ok(match self {
            Wizard::Add(w) => w.handle(ctx, conversation_id, text).await?.map(Wizard::Add),
            Wizard::Edit(w) => w.handle(ctx, conversation_id, text).await?.map(Wizard::Edit),
            Wizard::Delete(w) => w.handle(ctx, conversation_id, text).await?.map(Wizard::Delete),
            Wizard::Notes(w) => w.handle(ctx, conversation_id, text).await?.map(Wizard::Notes),
            Wizard::Topics(w) => w.handle(ctx, conversation_id, text)?.map(Wizard::Topics),
        })
    }
}
