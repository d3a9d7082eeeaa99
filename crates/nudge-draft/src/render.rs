use chrono_tz::Tz;

use nudge_core::format::format_due;
use nudge_core::{Confidence, DueMode, Reply};

use crate::types::{DraftBatch, ReminderDraft};

const NOTES_PREVIEW_CHARS: usize = 100;

pub const HELP_TEXT: &str = "I still have draft reminders waiting.\n\
Try one of these:\n\
- 1 (save all)\n\
- 2 (save all + attach topics)\n\
- s 1,3 (save selected)\n\
- t 1,3 (save selected + topics)\n\
- e 2 title:... p:high at:tomorrow 9am\n\
- r 2\n\
- 3 (show)\n\
- 4 (cancel)";

fn due_display(draft: &ReminderDraft, tz: Tz) -> String {
    match draft.due_mode {
        DueMode::None => "(none)".to_string(),
        DueMode::Unclear => "(needs date/time)".to_string(),
        DueMode::Datetime | DueMode::AllDay => format_due(&draft.due_at, tz),
    }
}

/// The numbered review listing of a batch.
pub fn render_batch(batch: &DraftBatch, tz: Tz) -> String {
    let mut lines = vec![format!("Proposed reminders ({}) - not saved yet", batch.len())];

    for (i, draft) in batch.drafts.iter().enumerate() {
        lines.push(format!("{}) {}", i + 1, draft.title));
        lines.push(format!("   Due: {}", due_display(draft, tz)));

        let confidence_flag = match draft.confidence {
            Confidence::High => String::new(),
            other => format!(" | confidence:{}", other),
        };
        lines.push(format!("   Priority: {}{}", draft.priority, confidence_flag));

        if !draft.link.is_empty() {
            lines.push(format!("   Link: {}", draft.link));
        }

        let notes = draft.notes.trim();
        if !notes.is_empty() {
            let first_line = notes.lines().next().unwrap_or_default();
            let preview = match first_line.char_indices().nth(NOTES_PREVIEW_CHARS) {
                Some((idx, _)) => format!("{}...", first_line[..idx].trim_end()),
                None => first_line.to_string(),
            };
            lines.push(format!("   Notes: yes ({} chars)", draft.notes.chars().count()));
            lines.push(format!("   Notes preview: {}", preview));
        }

        if !draft.topics.is_empty() {
            lines.push(format!("   Topics: {}", draft.topics.join(", ")));
        }
        lines.push(String::new());
    }

    lines.extend(
        [
            "Actions",
            "1 = save all",
            "2 = save all + attach topics",
            "3 = show again",
            "4 = cancel",
            "s 1,3 = save selected",
            "t 1,3 = save selected + topics",
            "e 2 title:Submit concept p:high at:28 feb 11am = edit one",
            "r 2 = remove one",
            "confirm topics create:work,personal = create missing topics + save",
        ]
        .map(String::from),
    );
    lines.join("\n")
}

/// The listing with quick-action buttons.
pub fn batch_reply(batch: &DraftBatch, tz: Tz) -> Reply {
    Reply::text(render_batch(batch, tz))
        .with_action("Save All", "1")
        .with_action("Save + Topics", "2")
        .with_action("Show", "3")
        .with_action("Cancel", "4")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use nudge_core::{DueAt, Priority, SourceKind};

    fn draft(title: &str, mode: DueMode, confidence: Confidence) -> ReminderDraft {
        ReminderDraft {
            title: title.to_string(),
            notes: String::new(),
            link: String::new(),
            priority: Priority::Mid,
            due_mode: mode,
            due_at: DueAt::NONE,
            confidence,
            topics: vec![],
            priority_reason: String::new(),
            due_reason: String::new(),
        }
    }

    #[test]
    fn test_render_batch() {
        let sg: Tz = "Asia/Singapore".parse().unwrap();
        let mut first = draft("Submit concept", DueMode::Datetime, Confidence::High);
        first.due_at = DueAt::at(Utc.with_ymd_and_hms(2026, 2, 28, 3, 0, 0).unwrap());
        first.topics = vec!["Work".to_string()];
        first.notes = format!("{}\nsecond line", "n".repeat(150));
        let second = draft("Call vendor", DueMode::Unclear, Confidence::Low);

        let batch = DraftBatch::new(1, SourceKind::Summary, vec![first, second]);
        let text = render_batch(&batch, sg);

        assert!(text.starts_with("Proposed reminders (2) - not saved yet"));
        assert!(text.contains("1) Submit concept\n   Due: 28/02/26 11:00\n   Priority: mid\n"));
        assert!(text.contains("   Notes: yes (162 chars)"));
        assert!(text.contains(&format!("   Notes preview: {}...", "n".repeat(100))));
        assert!(text.contains("   Topics: Work"));
        assert!(text.contains("2) Call vendor\n   Due: (needs date/time)\n   Priority: mid | confidence:low"));
        assert!(text.ends_with("confirm topics create:work,personal = create missing topics + save"));

        let reply = batch_reply(&batch, sg);
        assert_eq!(reply.actions.len(), 4);
        assert_eq!(reply.actions[1].payload, "2");
    }
}
