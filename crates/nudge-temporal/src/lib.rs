//! Natural-language date and time resolution for reminders.

pub mod fallback;
pub mod grammar;
pub mod normalize;
pub mod resolver;
pub mod service;
pub mod time_of_day;

pub use fallback::LlmFallbackResolver;
pub use normalize::normalize_typos;
pub use resolver::{localize, resolve, ParseResult, ParseStrategy};
pub use service::TemporalResolver;
pub use time_of_day::{extract_time_of_day, has_explicit_time};
