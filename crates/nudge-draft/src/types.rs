use serde::{Deserialize, Serialize};

use nudge_core::{Confidence, ConversationId, DueAt, DueMode, Priority, SourceKind};

/// An unconfirmed reminder candidate proposed by the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderDraft {
    pub title: String,
    pub notes: String,
    pub link: String,
    pub priority: Priority,
    pub due_mode: DueMode,
    pub due_at: DueAt,
    pub confidence: Confidence,
    /// Only ever non-empty for high-confidence drafts.
    pub topics: Vec<String>,
    pub priority_reason: String,
    pub due_reason: String,
}

impl ReminderDraft {
    /// Whether the draft still needs user input before it can be saved.
    pub fn needs_clarification(&self) -> bool {
        self.title.trim().is_empty()
            || self.due_mode == DueMode::Unclear
            || (self.due_mode.claims_date() && !self.due_at.is_set())
    }
}

/// Drafts awaiting review in one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftBatch {
    pub conversation_id: ConversationId,
    pub source_kind: SourceKind,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub drafts: Vec<ReminderDraft>,
}

impl DraftBatch {
    pub fn new(conversation_id: ConversationId, source_kind: SourceKind, drafts: Vec<ReminderDraft>) -> Self {
        Self {
            conversation_id,
            source_kind,
            user_id: None,
            username: None,
            drafts,
        }
    }

    pub fn with_author(mut self, user_id: i64, username: Option<String>) -> Self {
        self.user_id = Some(user_id);
        self.username = username;
        self
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }
}

/// Outcome of a draft extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    /// At least one usable draft; nothing is persisted yet.
    Proposed(DraftBatch),
    /// Nothing to propose, with a user-facing reason.
    Declined { reason: String },
}

impl ExtractionResult {
    pub fn batch(&self) -> Option<&DraftBatch> {
        match self {
            ExtractionResult::Proposed(batch) => Some(batch),
            ExtractionResult::Declined { .. } => None,
        }
    }
}
