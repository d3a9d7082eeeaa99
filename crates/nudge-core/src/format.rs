use chrono::Timelike;
use chrono_tz::Tz;

use crate::due::DueAt;
use crate::types::Reminder;

/// Render a due timestamp in `tz` as `dd/mm/yy HH:MM`.
///
/// Local midnight renders date-only; an unset due renders `(none)`.
pub fn format_due(due: &DueAt, tz: Tz) -> String {
    let Some(local) = due.local(tz) else {
        return "(none)".to_string();
    };
    if local.hour() == 0 && local.minute() == 0 {
        local.format("%d/%m/%y").to_string()
    } else {
        local.format("%d/%m/%y %H:%M").to_string()
    }
}

/// Three-line summary used in confirmations.
pub fn format_brief(reminder: &Reminder, tz: Tz) -> String {
    format!(
        "ID: {}\nTitle: {}\nDate: {}",
        reminder.id,
        reminder.fields.title.trim(),
        format_due(&reminder.fields.due_at, tz)
    )
}

/// Full detail view including priority, topics and notes.
pub fn format_detail(reminder: &Reminder, tz: Tz) -> String {
    let fields = &reminder.fields;
    let mut lines = vec![
        format!("ID: {}", reminder.id),
        format!("Title: {}", fields.title),
        format!("Date: {}", format_due(&fields.due_at, tz)),
        format!("Priority: {}", fields.priority),
    ];
    if let Some(rule) = fields.recurrence {
        lines.push(format!("Repeats: {}", rule));
    }
    if !reminder.topics.is_empty() {
        lines.push(format!("Topics: {}", reminder.topics.join(", ")));
    }
    if !fields.link.is_empty() {
        lines.push(format!("Link: {}", fields.link));
    }
    let notes = fields.notes.trim();
    if !notes.is_empty() {
        lines.push("Details:".to_string());
        lines.push(notes.to_string());
    }
    lines.join("\n")
}
