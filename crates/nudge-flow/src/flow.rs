use std::fmt;

use nudge_draft::DraftBatch;

use crate::confirmation::ConfirmationQueue;
use crate::wizard::Wizard;

/// The one interactive flow a conversation can have open at a time.
///
/// Keeping a single value per conversation makes the flows mutually
/// exclusive: starting one replaces whatever was there.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveFlow {
    Wizard(Wizard),
    Confirmation(ConfirmationQueue),
    DraftReview(DraftBatch),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    Wizard,
    Confirmation,
    DraftReview,
}

impl ActiveFlow {
    pub fn kind(&self) -> FlowKind {
        match self {
            ActiveFlow::Wizard(_) => FlowKind::Wizard,
            ActiveFlow::Confirmation(_) => FlowKind::Confirmation,
            ActiveFlow::DraftReview(_) => FlowKind::DraftReview,
        }
    }

    /// Flows that have run out of work are dropped instead of stored.
    pub fn is_finished(&self) -> bool {
        match self {
            ActiveFlow::Wizard(_) => false,
            ActiveFlow::Confirmation(queue) => queue.is_empty(),
            ActiveFlow::DraftReview(batch) => batch.is_empty(),
        }
    }
}

impl fmt::Display for ActiveFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveFlow::Wizard(w) => write!(f, "{} wizard", w.name()),
            ActiveFlow::Confirmation(q) => write!(f, "confirmation queue ({} pending)", q.len()),
            ActiveFlow::DraftReview(b) => write!(f, "draft review ({} drafts)", b.len()),
        }
    }
}
