//! Nudge Draft crate - turns arbitrary content into reviewable reminder
//! drafts and applies the user's review commands to them.
//!
//! Extraction never persists anything. Drafts become reminders only through
//! an explicit confirm handled by [`DraftReviewer`].

pub mod extractor;
pub mod fields;
pub mod refine;
pub mod render;
pub mod review;
pub mod schema;
pub mod types;

pub use extractor::{DraftBatchExtractor, ExtractorSettings};
pub use fields::{is_no_due_text, split_fields, FieldSplit};
pub use render::{batch_reply, render_batch};
pub use review::{DraftReviewer, ReviewCommand, ReviewOutcome};
pub use types::{DraftBatch, ExtractionResult, ReminderDraft};
