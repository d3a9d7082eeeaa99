use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::due::DueAt;

/// Identifier of a conversation (chat) that owns reminders, topics and flows.
pub type ConversationId = i64;

/// Identifier of a persisted reminder.
pub type ReminderId = i64;

/// Identifier of a persisted topic.
pub type TopicId = i64;

// =============================================================================
// Enums
// =============================================================================

/// Certainty of an interpreted date/time.
///
/// Ordered so that `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Parse a model- or user-supplied token, falling back to `default` for
    /// anything outside the closed set.
    pub fn parse_or(token: &str, default: Confidence) -> Confidence {
        token.trim().to_lowercase().parse().unwrap_or(default)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Confidence {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Confidence::Low),
            "medium" => Ok(Confidence::Medium),
            "high" => Ok(Confidence::High),
            _ => Err(format!("Unknown confidence: {}", s)),
        }
    }
}

/// Date precision semantics of a due expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueMode {
    /// A concrete date and time of day.
    Datetime,
    /// A date without a meaningful time (local midnight).
    AllDay,
    /// Explicitly no due date.
    None,
    /// A due date is implied but could not be pinned down.
    Unclear,
}

impl DueMode {
    /// Parse a token, falling back to `default` outside the closed set.
    pub fn parse_or(token: &str, default: DueMode) -> DueMode {
        token.trim().to_lowercase().parse().unwrap_or(default)
    }

    /// Whether this mode claims that a concrete date exists.
    pub fn claims_date(self) -> bool {
        matches!(self, DueMode::Datetime | DueMode::AllDay)
    }
}

impl fmt::Display for DueMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DueMode::Datetime => write!(f, "datetime"),
            DueMode::AllDay => write!(f, "all_day"),
            DueMode::None => write!(f, "none"),
            DueMode::Unclear => write!(f, "unclear"),
        }
    }
}

impl std::str::FromStr for DueMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "datetime" => Ok(DueMode::Datetime),
            "all_day" => Ok(DueMode::AllDay),
            "none" => Ok(DueMode::None),
            "unclear" => Ok(DueMode::Unclear),
            _ => Err(format!("Unknown due mode: {}", s)),
        }
    }
}

/// Reminder priority, closed set of four canonical values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Immediate,
    High,
    #[default]
    Mid,
    Low,
}

impl Priority {
    /// Parse a canonical name or a one-letter abbreviation (`i`, `h`, `m`, `l`).
    pub fn from_token(token: &str) -> Option<Priority> {
        match token.trim().to_lowercase().as_str() {
            "immediate" | "i" => Some(Priority::Immediate),
            "high" | "h" => Some(Priority::High),
            "mid" | "m" => Some(Priority::Mid),
            "low" | "l" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Immediate => write!(f, "immediate"),
            Priority::High => write!(f, "high"),
            Priority::Mid => write!(f, "mid"),
            Priority::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immediate" => Ok(Priority::Immediate),
            "high" => Ok(Priority::High),
            "mid" => Ok(Priority::Mid),
            "low" => Ok(Priority::Low),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Repeat interval of a recurring reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    /// Advance a due timestamp by one interval (monthly is a flat 30 days).
    pub fn next_due(self, current: DateTime<Utc>) -> DateTime<Utc> {
        let days = match self {
            Recurrence::Daily => 1,
            Recurrence::Weekly => 7,
            Recurrence::Monthly => 30,
        };
        current + chrono::Duration::days(days)
    }

    /// Storage form; `None` is stored as the empty string.
    pub fn to_storage(rule: Option<Recurrence>) -> String {
        rule.map(|r| r.to_string()).unwrap_or_default()
    }

    /// Inverse of [`Recurrence::to_storage`]; unknown rules read as `None`.
    pub fn from_storage(raw: &str) -> Option<Recurrence> {
        raw.trim().to_lowercase().parse().ok()
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::Daily => write!(f, "daily"),
            Recurrence::Weekly => write!(f, "weekly"),
            Recurrence::Monthly => write!(f, "monthly"),
        }
    }
}

impl std::str::FromStr for Recurrence {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            _ => Err(format!("Unknown recurrence: {}", s)),
        }
    }
}

/// Where a reminder came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    UserInput,
    ReplyMessage,
    Summary,
    Document,
    Image,
    Audio,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::UserInput => write!(f, "user_input"),
            SourceKind::ReplyMessage => write!(f, "reply_message"),
            SourceKind::Summary => write!(f, "summary"),
            SourceKind::Document => write!(f, "document"),
            SourceKind::Image => write!(f, "image"),
            SourceKind::Audio => write!(f, "audio"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_input" => Ok(SourceKind::UserInput),
            "reply_message" => Ok(SourceKind::ReplyMessage),
            "summary" => Ok(SourceKind::Summary),
            "document" => Ok(SourceKind::Document),
            "image" => Ok(SourceKind::Image),
            "audio" => Ok(SourceKind::Audio),
            _ => Err(format!("Unknown source kind: {}", s)),
        }
    }
}

// =============================================================================
// Entities
// =============================================================================

/// Editable fields of a reminder, shared by creation and update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReminderFields {
    pub title: String,
    pub notes: String,
    pub link: String,
    pub priority: Priority,
    pub due_at: DueAt,
    pub recurrence: Option<Recurrence>,
}

impl ReminderFields {
    /// Check the entity invariants before anything is persisted.
    ///
    /// A reminder needs a non-empty title, and a recurrence rule always
    /// requires a due timestamp.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title cannot be empty".to_string());
        }
        if self.recurrence.is_some() && !self.due_at.is_set() {
            return Err("recurrence requires a due date".to_string());
        }
        if !self.due_at.is_storable() {
            return Err("due date is out of range".to_string());
        }
        Ok(())
    }
}

/// A reminder that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReminder {
    pub conversation_id: ConversationId,
    pub source_kind: SourceKind,
    pub fields: ReminderFields,
}

/// A persisted reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub conversation_id: ConversationId,
    pub source_kind: SourceKind,
    pub fields: ReminderFields,
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A topic in a conversation's closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub name: String,
    /// Number of reminders currently tagged with this topic.
    pub reminder_count: u32,
}
