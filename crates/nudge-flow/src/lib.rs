//! Conversational flows for the reminder assistant.
//!
//! A conversation owns at most one [`ActiveFlow`]: a wizard, the due-date
//! confirmation queue, or a draft batch under review. The [`Dispatcher`]
//! routes every inbound message to slash commands, the active flow, or
//! inline reminder creation, in that order.

pub mod commands;
pub mod confirmation;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod flow;
pub mod session;
pub mod topics;
pub mod wizard;

pub use commands::{Command, HELP_TEXT};
pub use confirmation::{ConfirmationQueue, PendingConfirmation, ReplyIntent};
pub use context::FlowContext;
pub use dispatcher::Dispatcher;
pub use error::{FlowError, Result};
pub use flow::{ActiveFlow, FlowKind};
pub use session::SessionStore;
pub use wizard::{AddWizard, DeleteWizard, EditWizard, NotesWizard, TopicsWizard, Turn, Wizard};
