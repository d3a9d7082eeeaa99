pub mod clock;
pub mod config;
pub mod due;
pub mod error;
pub mod format;
pub mod materialize;
pub mod ports;
pub mod types;

pub use clock::Clock;
pub use config::NudgeConfig;
pub use due::{DueAt, MAX_DUE_YEAR};
pub use error::{NudgeError, Result};
pub use materialize::{Materialized, Materializer};
pub use ports::{
    CalendarCall, CalendarSync, LogChannel, MessageChannel, NoopCalendarSync, RecordingCalendar,
    ReminderStore, Reply, ReplyAction,
};
pub use types::*;
