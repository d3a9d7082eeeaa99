//! SQLite-backed [`ReminderStore`].
//!
//! Every statement is scoped by conversation id. Due timestamps go through
//! [`DueAt::to_storage`] so the empty sentinel survives round trips.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use nudge_core::{
    ConversationId, DueAt, NewReminder, NudgeError, Priority, Recurrence, Reminder,
    ReminderFields, ReminderId, ReminderStore, Result, SourceKind, Topic, TopicId,
};

use crate::db::Database;

const REMINDER_COLUMNS: &str = "id, conversation_id, source_kind, title, notes, link, priority,
     due_at_utc, recurrence_rule, created_at, updated_at";

/// Reminder and topic repository over a shared [`Database`].
#[derive(Debug, Clone)]
pub struct SqliteReminderStore {
    db: Arc<Database>,
}

impl SqliteReminderStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store over a fresh in-memory database.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Arc::new(Database::in_memory()?)))
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}

impl ReminderStore for SqliteReminderStore {
    fn create_reminder(&self, new: &NewReminder) -> Result<Reminder> {
        ensure_storable_due(&new.fields)?;
        self.db.with_conn(|conn| {
            let now = timestamp_now();
            let fields = &new.fields;
            conn.execute(
                "INSERT INTO reminders (conversation_id, source_kind, title, notes, link, priority,
                                        due_at_utc, recurrence_rule, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    new.conversation_id,
                    new.source_kind.to_string(),
                    fields.title.trim(),
                    fields.notes,
                    fields.link,
                    fields.priority.to_string(),
                    fields.due_at.to_storage(),
                    Recurrence::to_storage(fields.recurrence),
                    now,
                ],
            )
            .map_err(|e| NudgeError::Storage(format!("Failed to create reminder: {}", e)))?;

            let id = conn.last_insert_rowid();
            debug!(conversation_id = new.conversation_id, reminder_id = id, "Inserted reminder");
            load_reminder(conn, new.conversation_id, id)?
                .ok_or_else(|| NudgeError::Storage(format!("Reminder #{} vanished after insert", id)))
        })
    }

    fn get_reminder(&self, conversation_id: ConversationId, id: ReminderId) -> Result<Option<Reminder>> {
        self.db.with_conn(|conn| load_reminder(conn, conversation_id, id))
    }

    fn update_reminder(
        &self,
        conversation_id: ConversationId,
        id: ReminderId,
        fields: &ReminderFields,
    ) -> Result<Reminder> {
        ensure_storable_due(fields)?;
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE reminders
                     SET title = ?1, notes = ?2, link = ?3, priority = ?4,
                         due_at_utc = ?5, recurrence_rule = ?6, updated_at = ?7
                     WHERE id = ?8 AND conversation_id = ?9",
                    params![
                        fields.title.trim(),
                        fields.notes,
                        fields.link,
                        fields.priority.to_string(),
                        fields.due_at.to_storage(),
                        Recurrence::to_storage(fields.recurrence),
                        timestamp_now(),
                        id,
                        conversation_id,
                    ],
                )
                .map_err(|e| NudgeError::Storage(format!("Failed to update reminder: {}", e)))?;
            if changed == 0 {
                return Err(NudgeError::NotFound(format!("reminder #{}", id)));
            }
            load_reminder(conn, conversation_id, id)?
                .ok_or_else(|| NudgeError::NotFound(format!("reminder #{}", id)))
        })
    }

    fn delete_reminder(&self, conversation_id: ConversationId, id: ReminderId) -> Result<bool> {
        self.db.with_conn(|conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM reminders WHERE id = ?1 AND conversation_id = ?2",
                    params![id, conversation_id],
                )
                .map_err(|e| NudgeError::Storage(format!("Failed to delete reminder: {}", e)))?;
            Ok(deleted > 0)
        })
    }

    fn list_reminders(&self, conversation_id: ConversationId) -> Result<Vec<Reminder>> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM reminders WHERE conversation_id = ?1 ORDER BY id ASC",
                REMINDER_COLUMNS
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| NudgeError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params![conversation_id], |row| Ok(row_to_reminder(row)))
                .map_err(|e| NudgeError::Storage(e.to_string()))?;

            let mut reminders = Vec::new();
            for row in rows {
                let mut reminder = row.map_err(|e| NudgeError::Storage(e.to_string()))??;
                reminder.topics = reminder_topic_names(conn, reminder.id)?;
                reminders.push(reminder);
            }
            Ok(reminders)
        })
    }

    fn set_reminder_topics(
        &self,
        conversation_id: ConversationId,
        id: ReminderId,
        topics: &[String],
    ) -> Result<()> {
        self.db.with_conn(|conn| {
            if load_reminder(conn, conversation_id, id)?.is_none() {
                return Err(NudgeError::NotFound(format!("reminder #{}", id)));
            }

            let tx = conn
                .unchecked_transaction()
                .map_err(|e| NudgeError::Storage(e.to_string()))?;
            tx.execute("DELETE FROM reminder_topics WHERE reminder_id = ?1", params![id])
                .map_err(|e| NudgeError::Storage(e.to_string()))?;

            for name in topics {
                let Some(topic) = find_topic_by_name(&tx, conversation_id, name)? else {
                    debug!(conversation_id, topic = %name, "Ignoring unknown topic");
                    continue;
                };
                tx.execute(
                    "INSERT OR IGNORE INTO reminder_topics (reminder_id, topic_id) VALUES (?1, ?2)",
                    params![id, topic.id],
                )
                .map_err(|e| NudgeError::Storage(e.to_string()))?;
            }

            tx.commit()
                .map_err(|e| NudgeError::Storage(format!("Failed to set topics: {}", e)))
        })
    }

    fn list_topics(&self, conversation_id: ConversationId) -> Result<Vec<Topic>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT t.id, t.name, COUNT(rt.reminder_id)
                     FROM topics t
                     LEFT JOIN reminder_topics rt ON rt.topic_id = t.id
                     WHERE t.conversation_id = ?1
                     GROUP BY t.id
                     ORDER BY t.name ASC",
                )
                .map_err(|e| NudgeError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params![conversation_id], row_to_topic)
                .map_err(|e| NudgeError::Storage(e.to_string()))?;

            rows.map(|row| row.map_err(|e| NudgeError::Storage(e.to_string())))
                .collect()
        })
    }

    fn create_topic(&self, conversation_id: ConversationId, name: &str) -> Result<Topic> {
        let name = validate_topic_name(name)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO topics (conversation_id, name) VALUES (?1, ?2)",
                params![conversation_id, name],
            )
            .map_err(|e| NudgeError::Storage(format!("Failed to create topic: {}", e)))?;
            find_topic_by_name(conn, conversation_id, name)?
                .ok_or_else(|| NudgeError::Storage(format!("Topic '{}' vanished after insert", name)))
        })
    }

    fn rename_topic(&self, conversation_id: ConversationId, id: TopicId, name: &str) -> Result<Topic> {
        let name = validate_topic_name(name)?;
        self.db.with_conn(|conn| {
            if let Some(existing) = find_topic_by_name(conn, conversation_id, name)? {
                if existing.id != id {
                    return Err(NudgeError::Validation(format!(
                        "topic '{}' already exists",
                        existing.name
                    )));
                }
            }
            let changed = conn
                .execute(
                    "UPDATE topics SET name = ?1 WHERE id = ?2 AND conversation_id = ?3",
                    params![name, id, conversation_id],
                )
                .map_err(|e| NudgeError::Storage(format!("Failed to rename topic: {}", e)))?;
            if changed == 0 {
                return Err(NudgeError::NotFound(format!("topic #{}", id)));
            }
            find_topic_by_id(conn, conversation_id, id)?
                .ok_or_else(|| NudgeError::NotFound(format!("topic #{}", id)))
        })
    }

    fn delete_topic(&self, conversation_id: ConversationId, id: TopicId) -> Result<bool> {
        self.db.with_conn(|conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM topics WHERE id = ?1 AND conversation_id = ?2",
                    params![id, conversation_id],
                )
                .map_err(|e| NudgeError::Storage(format!("Failed to delete topic: {}", e)))?;
            Ok(deleted > 0)
        })
    }

    fn merge_topics(&self, conversation_id: ConversationId, from: TopicId, into: TopicId) -> Result<Topic> {
        if from == into {
            return Err(NudgeError::Validation("cannot merge a topic into itself".to_string()));
        }
        self.db.with_conn(|conn| {
            for id in [from, into] {
                if find_topic_by_id(conn, conversation_id, id)?.is_none() {
                    return Err(NudgeError::NotFound(format!("topic #{}", id)));
                }
            }

            let tx = conn
                .unchecked_transaction()
                .map_err(|e| NudgeError::Storage(e.to_string()))?;
            tx.execute(
                "INSERT OR IGNORE INTO reminder_topics (reminder_id, topic_id)
                 SELECT reminder_id, ?1 FROM reminder_topics WHERE topic_id = ?2",
                params![into, from],
            )
            .map_err(|e| NudgeError::Storage(e.to_string()))?;
            tx.execute("DELETE FROM topics WHERE id = ?1", params![from])
                .map_err(|e| NudgeError::Storage(e.to_string()))?;
            tx.commit()
                .map_err(|e| NudgeError::Storage(format!("Failed to merge topics: {}", e)))?;

            find_topic_by_id(conn, conversation_id, into)?
                .ok_or_else(|| NudgeError::NotFound(format!("topic #{}", into)))
        })
    }
}

// =============================================================================
// Row helpers
// =============================================================================

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn validate_topic_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NudgeError::Validation("topic name cannot be empty".to_string()));
    }
    if name.contains(',') {
        return Err(NudgeError::Validation("topic name cannot contain ','".to_string()));
    }
    Ok(name)
}

fn load_reminder(conn: &Connection, conversation_id: ConversationId, id: ReminderId) -> Result<Option<Reminder>> {
    let sql = format!(
        "SELECT {} FROM reminders WHERE id = ?1 AND conversation_id = ?2",
        REMINDER_COLUMNS
    );
    let result = conn
        .query_row(&sql, params![id, conversation_id], |row| Ok(row_to_reminder(row)))
        .optional()
        .map_err(|e| NudgeError::Storage(e.to_string()))?;

    match result {
        Some(reminder) => {
            let mut reminder = reminder?;
            reminder.topics = reminder_topic_names(conn, id)?;
            Ok(Some(reminder))
        }
        None => Ok(None),
    }
}

fn reminder_topic_names(conn: &Connection, id: ReminderId) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.name FROM topics t
             JOIN reminder_topics rt ON rt.topic_id = t.id
             WHERE rt.reminder_id = ?1
             ORDER BY t.name ASC",
        )
        .map_err(|e| NudgeError::Storage(e.to_string()))?;
    let rows = stmt
        .query_map(params![id], |row| row.get::<_, String>(0))
        .map_err(|e| NudgeError::Storage(e.to_string()))?;
    rows.map(|row| row.map_err(|e| NudgeError::Storage(e.to_string())))
        .collect()
}

fn find_topic_by_name(conn: &Connection, conversation_id: ConversationId, name: &str) -> Result<Option<Topic>> {
    conn.query_row(
        "SELECT t.id, t.name,
                (SELECT COUNT(*) FROM reminder_topics rt WHERE rt.topic_id = t.id)
         FROM topics t WHERE t.conversation_id = ?1 AND t.name = ?2",
        params![conversation_id, name.trim()],
        row_to_topic,
    )
    .optional()
    .map_err(|e| NudgeError::Storage(e.to_string()))
}

fn find_topic_by_id(conn: &Connection, conversation_id: ConversationId, id: TopicId) -> Result<Option<Topic>> {
    conn.query_row(
        "SELECT t.id, t.name,
                (SELECT COUNT(*) FROM reminder_topics rt WHERE rt.topic_id = t.id)
         FROM topics t WHERE t.conversation_id = ?1 AND t.id = ?2",
        params![conversation_id, id],
        row_to_topic,
    )
    .optional()
    .map_err(|e| NudgeError::Storage(e.to_string()))
}

fn row_to_topic(row: &Row<'_>) -> rusqlite::Result<Topic> {
    let count: i64 = row.get(2)?;
    Ok(Topic {
        id: row.get(0)?,
        name: row.get(1)?,
        reminder_count: u32::try_from(count).unwrap_or(u32::MAX),
    })
}

/// Refuse due values whose stored form could not be read back.
fn ensure_storable_due(fields: &ReminderFields) -> Result<()> {
    if fields.due_at.is_storable() {
        Ok(())
    } else {
        Err(NudgeError::Validation(format!(
            "due date {} is out of range",
            fields.due_at.to_storage()
        )))
    }
}

/// A due value that does not parse is read as no due date so one bad row
/// cannot make the whole conversation unreadable.
fn read_due(id: ReminderId, raw: &str) -> DueAt {
    DueAt::from_storage(raw).unwrap_or_else(|e| {
        warn!(reminder_id = id, error = %e, "Unreadable due timestamp, treating as no due date");
        DueAt::NONE
    })
}

fn row_to_reminder(row: &Row<'_>) -> Result<Reminder> {
    let get_err = |e: rusqlite::Error| NudgeError::Storage(e.to_string());

    let source_kind: String = row.get(2).map_err(get_err)?;
    let priority: String = row.get(6).map_err(get_err)?;
    let due: String = row.get(7).map_err(get_err)?;
    let recurrence: String = row.get(8).map_err(get_err)?;
    let created_at: String = row.get(9).map_err(get_err)?;
    let updated_at: String = row.get(10).map_err(get_err)?;

    let id: ReminderId = row.get(0).map_err(get_err)?;

    Ok(Reminder {
        id,
        conversation_id: row.get(1).map_err(get_err)?,
        source_kind: source_kind
            .parse::<SourceKind>()
            .map_err(NudgeError::Storage)?,
        fields: ReminderFields {
            title: row.get(3).map_err(get_err)?,
            notes: row.get(4).map_err(get_err)?,
            link: row.get(5).map_err(get_err)?,
            priority: priority.parse::<Priority>().map_err(NudgeError::Storage)?,
            due_at: read_due(id, &due),
            recurrence: Recurrence::from_storage(&recurrence),
        },
        topics: Vec::new(),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| NudgeError::Storage(format!("Invalid timestamp '{}': {}", raw, e)))
}
