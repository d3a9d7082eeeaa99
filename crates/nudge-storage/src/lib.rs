//! Nudge Storage crate - SQLite persistence for reminders and topics.
//!
//! Provides a WAL-mode SQLite database with migrations and a
//! [`ReminderStore`](nudge_core::ReminderStore) implementation scoped by
//! conversation id.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::SqliteReminderStore;
