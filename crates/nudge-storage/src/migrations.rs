//! Database schema migrations.
//!
//! Version 1 creates the reminders, topics and reminder_topics tables.
//! Due timestamps are TEXT with `''` as the no-due sentinel, never NULL.

use rusqlite::Connection;
use tracing::info;

use nudge_core::NudgeError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), NudgeError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| NudgeError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| NudgeError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

fn apply_v1(conn: &Connection) -> Result<(), NudgeError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS reminders (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id INTEGER NOT NULL,
            source_kind     TEXT NOT NULL DEFAULT 'user_input',
            title           TEXT NOT NULL,
            notes           TEXT NOT NULL DEFAULT '',
            link            TEXT NOT NULL DEFAULT '',
            priority        TEXT NOT NULL DEFAULT 'mid'
                            CHECK (priority IN ('immediate', 'high', 'mid', 'low')),
            due_at_utc      TEXT NOT NULL DEFAULT '',
            recurrence_rule TEXT NOT NULL DEFAULT ''
                            CHECK (recurrence_rule IN ('', 'daily', 'weekly', 'monthly')),
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            CHECK (recurrence_rule = '' OR due_at_utc != '')
        );

        CREATE INDEX IF NOT EXISTS idx_reminders_conversation
            ON reminders (conversation_id, id);

        CREATE TABLE IF NOT EXISTS topics (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id INTEGER NOT NULL,
            name            TEXT NOT NULL COLLATE NOCASE,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            UNIQUE (conversation_id, name)
        );

        CREATE TABLE IF NOT EXISTS reminder_topics (
            reminder_id     INTEGER NOT NULL,
            topic_id        INTEGER NOT NULL,
            PRIMARY KEY (reminder_id, topic_id),
            FOREIGN KEY (reminder_id) REFERENCES reminders(id) ON DELETE CASCADE,
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_reminder_topics_topic
            ON reminder_topics (topic_id);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| NudgeError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_due_defaults_to_empty_sentinel() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO reminders (conversation_id, title, created_at, updated_at)
             VALUES (1, 'x', '', '')",
            [],
        )
        .unwrap();
        let due: String = conn
            .query_row("SELECT due_at_utc FROM reminders", [], |row| row.get(0))
            .unwrap();
        assert_eq!(due, "");
    }

    #[test]
    fn test_recurrence_without_due_rejected() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO reminders (conversation_id, title, recurrence_rule, created_at, updated_at)
             VALUES (1, 'x', 'daily', '', '')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_topic_names_unique_case_insensitive() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        conn.execute("INSERT INTO topics (conversation_id, name) VALUES (1, 'Work')", [])
            .unwrap();
        let dup = conn.execute("INSERT INTO topics (conversation_id, name) VALUES (1, 'work')", []);
        assert!(dup.is_err());
        conn.execute("INSERT INTO topics (conversation_id, name) VALUES (2, 'work')", [])
            .unwrap();
    }
}
