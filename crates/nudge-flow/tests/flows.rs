//! End-to-end conversations through the dispatcher, backed by an in-memory
//! store and a scripted model.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;

use nudge_core::{CalendarCall, Clock, ConversationId, Materializer, RecordingCalendar, ReminderStore, SourceKind};
use nudge_draft::{DraftBatchExtractor, ExtractionResult, ExtractorSettings};
use nudge_flow::wizard::add::{INVALID_PRIORITY, PRIORITY_PROMPT, TOPIC_PROMPT};
use nudge_flow::{Dispatcher, FlowContext, FlowKind};
use nudge_llm::ScriptedCompletion;
use nudge_storage::SqliteReminderStore;
use nudge_temporal::TemporalResolver;

const CHAT: ConversationId = 4242;

struct Harness {
    dispatcher: Dispatcher,
    store: Arc<SqliteReminderStore>,
    calendar: Arc<RecordingCalendar>,
    llm: Arc<ScriptedCompletion>,
}

fn harness(model_outputs: Vec<&str>) -> Harness {
    let tz: Tz = "Asia/Singapore".parse().unwrap();
    let clock = Clock::fixed(tz.with_ymd_and_hms(2026, 2, 21, 10, 0, 0).unwrap().with_timezone(&Utc));
    let store = Arc::new(SqliteReminderStore::in_memory().unwrap());
    let calendar = Arc::new(RecordingCalendar::new());
    let llm = Arc::new(ScriptedCompletion::new(model_outputs));

    let ctx = FlowContext::new(
        Materializer::new(store.clone(), calendar.clone()),
        TemporalResolver::new(),
        tz,
    )
    .with_clock(clock);
    let settings = ExtractorSettings {
        timezone: tz,
        long_notes_threshold: 250,
        max_prompt_chars: 22_000,
    };
    let extractor =
        DraftBatchExtractor::new(llm.clone(), store.clone(), TemporalResolver::new(), settings).with_clock(clock);

    Harness {
        dispatcher: Dispatcher::new(ctx, extractor),
        store,
        calendar,
        llm,
    }
}

#[tokio::test]
async fn test_confirming_last_item_empties_queue() {
    let h = harness(vec![]);
    h.dispatcher.handle_message(CHAT, "/add Pay rent at:tomorrow").await;
    let replies = h.dispatcher.handle_message(CHAT, "/add Call bank at:monday").await;
    assert!(replies[0].text.starts_with("Queued 'Call bank'."));
    assert_eq!(h.dispatcher.sessions().pending_confirmations(CHAT), 2);

    // Confirming the head announces the next one.
    let replies = h.dispatcher.handle_message(CHAT, "yes").await;
    assert!(replies[0].text.contains("Title: Pay rent"));
    assert!(replies.last().unwrap().text.starts_with("'Call bank': I read the due date as"));

    h.dispatcher.handle_message(CHAT, "ok").await;
    assert_eq!(h.dispatcher.sessions().pending_confirmations(CHAT), 0);
    assert_eq!(h.dispatcher.sessions().kind(CHAT), None);
    assert_eq!(h.store.list_reminders(CHAT).unwrap().len(), 2);
    assert_eq!(
        h.calendar.calls(),
        vec![CalendarCall::Upsert(1), CalendarCall::Upsert(2)]
    );
}

#[tokio::test]
async fn test_not_appropriate_batch_creates_nothing() {
    let h = harness(vec![
        r#"{"schema_version":"2","appropriate":false,"reason":"Just small talk.","reminders":[]}"#,
    ]);
    let replies = h.dispatcher.handle_message(CHAT, "/extract hey, how was the weekend?").await;
    assert_eq!(replies[0].text, "No reminders to propose: Just small talk.");
    assert_eq!(h.dispatcher.sessions().kind(CHAT), None);

    // With no batch open, a confirm has nothing to act on.
    h.dispatcher.handle_message(CHAT, "confirm").await;
    assert!(h.store.list_reminders(CHAT).unwrap().is_empty());
    assert_eq!(h.llm.calls(), 1);
}

#[tokio::test]
async fn test_repaired_batch_confirmed_subset() {
    let h = harness(vec![
        r#"{"reminders": ["#,
        r#"{"schema_version":"2","appropriate":true,"reason":"",
            "reminders":[
              {"title":"Submit concept note","due_mode":"datetime","due_text":"28 feb 11am","confidence":"high"},
              {"title":"Book venue","due_mode":"none","confidence":"medium"}
            ]}"#,
    ]);
    let result = h
        .dispatcher
        .extract_draft_batch(CHAT, SourceKind::Summary, "Concept note due 28 Feb 11am. Venue TBD.", "")
        .await
        .unwrap();
    assert!(matches!(result, ExtractionResult::Proposed(_)));
    assert_eq!(h.llm.calls(), 2);
    assert_eq!(h.dispatcher.sessions().kind(CHAT), Some(FlowKind::DraftReview));

    h.dispatcher.handle_message(CHAT, "confirm 1").await;
    let saved = h.store.list_reminders(CHAT).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].fields.title, "Submit concept note");
    assert_eq!(saved[0].source_kind, SourceKind::Summary);
    assert_eq!(saved[0].fields.due_at.to_storage(), "2026-02-28T03:00:00+00:00");
}

#[tokio::test]
async fn test_wizard_rejects_invalid_priority() {
    let h = harness(vec![]);
    h.dispatcher.handle_message(CHAT, "/add Water plants").await;
    let replies = h.dispatcher.handle_message(CHAT, "tomorrow 9am").await;
    assert_eq!(replies[0].text, PRIORITY_PROMPT);

    let replies = h.dispatcher.handle_message(CHAT, "urgent").await;
    assert_eq!(replies[0].text, INVALID_PRIORITY);
    assert_eq!(h.dispatcher.sessions().kind(CHAT), Some(FlowKind::Wizard));
    assert!(h.store.list_reminders(CHAT).unwrap().is_empty());

    let replies = h.dispatcher.handle_message(CHAT, "h").await;
    assert_eq!(replies[0].text, TOPIC_PROMPT);
}

#[tokio::test]
async fn test_starting_wizard_discards_draft_batch() {
    let h = harness(vec![
        r#"{"schema_version":"2","appropriate":true,"reason":"",
            "reminders":[{"title":"Renew passport","due_mode":"none","confidence":"medium"}]}"#,
    ]);
    h.dispatcher
        .extract_draft_batch(CHAT, SourceKind::Document, "Passport expires in May.", "")
        .await
        .unwrap();
    assert!(h.dispatcher.sessions().draft_batch(CHAT).is_some());

    h.dispatcher.handle_message(CHAT, "/delete").await;
    assert_eq!(h.dispatcher.sessions().kind(CHAT), Some(FlowKind::Wizard));
    assert!(h.dispatcher.sessions().draft_batch(CHAT).is_none());

    // "1" now answers the delete wizard, not the discarded batch.
    let replies = h.dispatcher.handle_message(CHAT, "1").await;
    assert_eq!(replies[0].text, "Reminder #1 not found.");
    assert!(h.store.list_reminders(CHAT).unwrap().is_empty());
}

#[tokio::test]
async fn test_topics_wizard_then_inline_add_with_hashtag() {
    let h = harness(vec![]);
    h.dispatcher.handle_message(CHAT, "/topics").await;
    h.dispatcher.handle_message(CHAT, "create Home").await;
    h.dispatcher.handle_message(CHAT, "cancel").await;

    let replies = h.dispatcher.handle_message(CHAT, "/add Fix tap #hom at:none").await;
    assert!(replies[0].text.contains("Did you mean: Home?"));

    h.dispatcher.handle_message(CHAT, "/add Fix tap #home at:none").await;
    let saved = h.store.list_reminders(CHAT).unwrap();
    assert_eq!(saved[0].topics, vec!["Home".to_string()]);
    assert!(!saved[0].fields.due_at.is_set());
}

#[tokio::test]
async fn test_ingest_document_opens_review() {
    let h = harness(vec![
        r#"{"schema_version":"2","appropriate":true,"reason":"",
            "reminders":[{"title":"Pay invoice 118","due_mode":"datetime","due_text":"tomorrow 9am","confidence":"high"}]}"#,
    ]);
    let replies = h
        .dispatcher
        .ingest(CHAT, SourceKind::Document, "Invoice 118 is due tomorrow 9am.", "")
        .await;
    assert_eq!(replies.len(), 1);
    assert!(replies[0].text.contains("Pay invoice 118"));
    assert_eq!(replies[0].actions.len(), 4);
    assert_eq!(h.dispatcher.sessions().kind(CHAT), Some(FlowKind::DraftReview));

    h.dispatcher.handle_message(CHAT, "1").await;
    let saved = h.store.list_reminders(CHAT).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].source_kind, SourceKind::Document);
    assert_eq!(saved[0].fields.due_at.to_storage(), "2026-02-22T01:00:00+00:00");
}

#[tokio::test]
async fn test_far_future_due_never_reaches_store() {
    let h = harness(vec![]);
    h.dispatcher.handle_message(CHAT, "/add Pay rent at:none").await;

    let replies = h.dispatcher.handle_message(CHAT, "/add Time capsule at:in 99999 years").await;
    assert!(replies[0].text.starts_with("Could not understand the due date"));
    assert_eq!(h.dispatcher.sessions().pending_confirmations(CHAT), 0);

    let replies = h.dispatcher.handle_message(CHAT, "/list").await;
    assert!(replies[0].text.contains("Pay rent"));
    assert_eq!(h.store.list_reminders(CHAT).unwrap().len(), 1);
}
