//! LLM-assisted extraction of reminder drafts from arbitrary content.

use std::sync::Arc;

use chrono::{NaiveTime, Timelike};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use nudge_core::{Clock, Confidence, ConversationId, DueAt, DueMode, NudgeConfig, ReminderStore, SourceKind};
use nudge_llm::prompts::{draft_reminder_prompt, repair_reminder_json_prompt};
use nudge_llm::{parse_json_object, CompletionRequest, CompletionService};
use nudge_temporal::{localize, TemporalResolver};

use crate::refine::{extract_first_url, filter_topics_by_relevance, refine_generic_title};
use crate::schema::{filter_to_vocabulary, normalize_payload, DraftPayload, DraftRecord, MAX_DRAFT_TOPICS};
use crate::types::{DraftBatch, ExtractionResult, ReminderDraft};

const UNPARSEABLE_REASON: &str = "Could not parse reminder suggestions.";
const NOTHING_DETECTED_REASON: &str = "No reminder-worthy items were detected.";
const NO_USABLE_DRAFTS_REASON: &str = "The suggestions did not contain any usable reminders.";

/// Extractor settings, usually derived from [`NudgeConfig`].
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub timezone: Tz,
    /// Source content at least this long replaces the model's notes.
    pub long_notes_threshold: usize,
    pub max_prompt_chars: usize,
}

impl ExtractorSettings {
    pub fn from_config(config: &NudgeConfig) -> Self {
        Self {
            timezone: config.timezone(),
            long_notes_threshold: config.flows.long_notes_threshold,
            max_prompt_chars: config.llm.max_prompt_chars,
        }
    }
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self::from_config(&NudgeConfig::default())
    }
}

/// Builds [`DraftBatch`]es from content with one model call plus at most
/// one repair call. Nothing here persists anything.
#[derive(Clone)]
pub struct DraftBatchExtractor {
    llm: Arc<dyn CompletionService>,
    store: Arc<dyn ReminderStore>,
    resolver: TemporalResolver,
    settings: ExtractorSettings,
    clock: Clock,
}

impl DraftBatchExtractor {
    pub fn new(
        llm: Arc<dyn CompletionService>,
        store: Arc<dyn ReminderStore>,
        resolver: TemporalResolver,
        settings: ExtractorSettings,
    ) -> Self {
        Self {
            llm,
            store,
            resolver,
            settings,
            clock: Clock::System,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    /// Extract drafts from `content`. Model failures and malformed output
    /// come back as [`ExtractionResult::Declined`], never as errors.
    pub async fn extract(
        &self,
        conversation_id: ConversationId,
        source_kind: SourceKind,
        content: &str,
        instruction: &str,
    ) -> ExtractionResult {
        let payload = self.extract_payload(conversation_id, content, instruction).await;

        if !payload.appropriate {
            let reason = if payload.reason.is_empty() {
                NOTHING_DETECTED_REASON.to_string()
            } else {
                payload.reason
            };
            info!(conversation_id, reason = %reason, "Draft extraction declined");
            return ExtractionResult::Declined { reason };
        }

        let drafts = self.build_drafts(&payload.reminders, content);
        if drafts.is_empty() {
            info!(conversation_id, "Draft extraction produced no usable drafts");
            return ExtractionResult::Declined {
                reason: NO_USABLE_DRAFTS_REASON.to_string(),
            };
        }

        info!(conversation_id, drafts = drafts.len(), "Draft batch proposed");
        ExtractionResult::Proposed(DraftBatch::new(conversation_id, source_kind, drafts))
    }

    /// Run the model with one repair round and return a normalized payload
    /// whose topics are restricted to the conversation's vocabulary.
    pub async fn extract_payload(
        &self,
        conversation_id: ConversationId,
        content: &str,
        instruction: &str,
    ) -> DraftPayload {
        let vocabulary = match self.store.topic_names(conversation_id) {
            Ok(names) => names,
            Err(e) => {
                warn!(conversation_id, error = %e, "Could not load topic vocabulary");
                Vec::new()
            }
        };

        let prompt = draft_reminder_prompt(instruction, content, &vocabulary, self.settings.max_prompt_chars);
        let raw = match self.llm.complete(CompletionRequest::text(prompt)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(conversation_id, error = %e, "Draft extraction call failed");
                return DraftPayload::declined(UNPARSEABLE_REASON);
            }
        };

        let mut payload = match parse_and_validate(&raw) {
            Some(payload) => payload,
            None => {
                warn!(conversation_id, "Draft output malformed, requesting one repair");
                let repair = repair_reminder_json_prompt(&raw, self.settings.max_prompt_chars);
                let repaired = match self.llm.complete(CompletionRequest::text(repair)).await {
                    Ok(repaired) => parse_and_validate(&repaired),
                    Err(e) => {
                        warn!(conversation_id, error = %e, "Draft repair call failed");
                        None
                    }
                };
                match repaired {
                    Some(payload) => payload,
                    None => return DraftPayload::declined(UNPARSEABLE_REASON),
                }
            }
        };

        for record in &mut payload.reminders {
            record.topics = filter_to_vocabulary(&record.topics, &vocabulary);
        }
        payload
    }

    fn build_drafts(&self, records: &[DraftRecord], source: &str) -> Vec<ReminderDraft> {
        records
            .iter()
            .filter(|record| !record.title.trim().is_empty())
            .map(|record| self.build_draft(record, source))
            .collect()
    }

    fn build_draft(&self, record: &DraftRecord, source: &str) -> ReminderDraft {
        let mut notes = record.notes.clone();
        if notes.is_empty() || source.trim().chars().count() >= self.settings.long_notes_threshold {
            notes = source.trim().to_string();
        }

        let title = refine_generic_title(&record.title, &notes, source, record.confidence);

        let link = if record.link.is_empty() {
            extract_first_url(&notes)
                .or_else(|| extract_first_url(source))
                .unwrap_or_default()
        } else {
            record.link.clone()
        };

        let (due_mode, due_at) = self.resolve_due(record, &notes, source);

        let topics = if record.confidence == Confidence::High {
            let capped: Vec<String> = record.topics.iter().take(MAX_DRAFT_TOPICS).cloned().collect();
            filter_topics_by_relevance(&capped, &format!("{}\n{}\n{}", title, notes, source))
        } else {
            Vec::new()
        };

        ReminderDraft {
            title,
            notes,
            link,
            priority: record.priority,
            due_mode,
            due_at,
            confidence: record.confidence,
            topics,
            priority_reason: record.priority_reason.clone(),
            due_reason: record.due_reason.clone(),
        }
    }

    /// A claimed date that cannot be resolved is downgraded to `none`. A
    /// draft left without a date gets one inference pass over its notes and
    /// the source content.
    fn resolve_due(&self, record: &DraftRecord, notes: &str, source: &str) -> (DueMode, DueAt) {
        let tz = self.settings.timezone;
        let now = self.clock.now();
        let mut mode = record.due_mode;
        let mut due = DueAt::NONE;

        if !record.due_text.is_empty() {
            if let Some(value) = self.resolver.resolve(&record.due_text, tz, now).value {
                let value = if mode == DueMode::AllDay {
                    localize(tz, value.date_naive().and_time(NaiveTime::MIN)).unwrap_or(value)
                } else {
                    value
                };
                due = DueAt::from_zoned(&value);
            }
        }

        if !due.is_set() && mode.claims_date() {
            debug!(due_text = %record.due_text, "Claimed due date did not resolve");
            mode = DueMode::None;
        }

        if !due.is_set() {
            let combined = format!("{}\n{}", notes, source);
            if let Some(value) = self.resolver.resolve(&combined, tz, now).value {
                due = DueAt::from_zoned(&value);
                mode = if value.time().num_seconds_from_midnight() == 0 {
                    DueMode::AllDay
                } else {
                    DueMode::Datetime
                };
            }
        }

        (mode, due)
    }
}

fn parse_and_validate(raw: &str) -> Option<DraftPayload> {
    let parsed = parse_json_object(raw)?;
    let payload = normalize_payload(&parsed);
    payload.is_valid().then_some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use nudge_llm::ScriptedCompletion;
    use nudge_storage::SqliteReminderStore;

    const CHAT: ConversationId = 9;

    fn singapore() -> Tz {
        "Asia/Singapore".parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        singapore()
            .with_ymd_and_hms(2026, 2, 21, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn extractor(outputs: Vec<&str>) -> (DraftBatchExtractor, Arc<ScriptedCompletion>, Arc<SqliteReminderStore>) {
        let llm = Arc::new(ScriptedCompletion::new(outputs));
        let store = Arc::new(SqliteReminderStore::in_memory().unwrap());
        let settings = ExtractorSettings {
            timezone: singapore(),
            long_notes_threshold: 250,
            max_prompt_chars: 22_000,
        };
        let extractor = DraftBatchExtractor::new(llm.clone(), store.clone(), TemporalResolver::new(), settings)
            .with_clock(Clock::fixed(now()));
        (extractor, llm, store)
    }

    fn local(due: &DueAt) -> String {
        due.local(singapore()).unwrap().format("%Y-%m-%d %H:%M").to_string()
    }

    #[tokio::test]
    async fn test_valid_payload_proposes_batch() {
        let (extractor, llm, store) = extractor(vec![
            r#"{"schema_version":"2","appropriate":true,"reason":"",
                "reminders":[{"title":"Submit concept note","notes":"Portal closes soon",
                "priority":"high","due_mode":"datetime","due_text":"28 feb 11am",
                "confidence":"high","topics":["work","garden"]}]}"#,
        ]);
        store.create_topic(CHAT, "Work").unwrap();

        let result = extractor
            .extract(CHAT, SourceKind::Summary, "Work: submit the concept note by 28 Feb 11am", "")
            .await;
        let batch = result.batch().unwrap();
        let draft = &batch.drafts[0];

        assert_eq!(batch.source_kind, SourceKind::Summary);
        assert_eq!(draft.title, "Submit concept note");
        assert_eq!(draft.due_mode, DueMode::Datetime);
        assert_eq!(local(&draft.due_at), "2026-02-28 11:00");
        assert_eq!(draft.topics, vec!["Work".to_string()]);
        assert_eq!(llm.calls(), 1);
        assert!(llm.prompts()[0].contains("Available topics: Work"));
    }

    #[tokio::test]
    async fn test_truncated_json_repaired_once() {
        let (extractor, llm, _store) = extractor(vec![
            r#"{"reminders": ["#,
            r#"{"schema_version":"2","appropriate":true,"reason":"",
                "reminders":[{"title":"Pay invoice","due_mode":"none","confidence":"medium"}]}"#,
        ]);

        let result = extractor.extract(CHAT, SourceKind::Document, "Invoice attached.", "").await;
        assert_eq!(result.batch().unwrap().drafts[0].title, "Pay invoice");
        assert_eq!(llm.calls(), 2);
        assert!(llm.prompts()[1].contains(r#"{"reminders": ["#));
    }

    #[tokio::test]
    async fn test_failed_repair_declines_without_error() {
        let (extractor, llm, _store) = extractor(vec![r#"{"reminders": ["#, "still not json"]);

        let payload = extractor.extract_payload(CHAT, "Invoice attached.", "").await;
        assert!(!payload.appropriate);
        assert_eq!(payload.reason, UNPARSEABLE_REASON);
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_model_error_declines() {
        let (extractor, _llm, _store) = extractor(vec![]);
        let result = extractor.extract(CHAT, SourceKind::Summary, "anything", "").await;
        assert!(matches!(result, ExtractionResult::Declined { .. }));
    }

    #[tokio::test]
    async fn test_not_appropriate_declines_with_reason() {
        let (extractor, llm, _store) = extractor(vec![
            r#"{"schema_version":"2","appropriate":false,"reason":"Just a greeting.","reminders":[]}"#,
        ]);
        let result = extractor.extract(CHAT, SourceKind::Summary, "hello!", "").await;
        assert_eq!(
            result,
            ExtractionResult::Declined {
                reason: "Just a greeting.".to_string()
            }
        );
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_topics_dropped_unless_high_confidence() {
        let (extractor, _llm, store) = extractor(vec![
            r#"{"schema_version":"2","appropriate":true,"reason":"",
                "reminders":[{"title":"Book venue","confidence":"medium","due_mode":"none",
                "topics":["Work"]}]}"#,
        ]);
        store.create_topic(CHAT, "Work").unwrap();

        let result = extractor.extract(CHAT, SourceKind::Summary, "Work offsite planning", "").await;
        assert!(result.batch().unwrap().drafts[0].topics.is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_claimed_date_downgraded() {
        let (extractor, _llm, _store) = extractor(vec![
            r#"{"schema_version":"2","appropriate":true,"reason":"",
                "reminders":[{"title":"Renew lease","due_mode":"datetime","due_text":"when the landlord calls",
                "confidence":"medium"}]}"#,
        ]);
        let result = extractor.extract(CHAT, SourceKind::Summary, "Lease renewal pending.", "").await;
        let draft = &result.batch().unwrap().drafts[0];
        assert_eq!(draft.due_mode, DueMode::None);
        assert!(!draft.due_at.is_set());
        assert!(!draft.needs_clarification());
    }

    #[tokio::test]
    async fn test_all_day_forced_to_midnight_and_inference() {
        let (extractor, _llm, _store) = extractor(vec![
            r#"{"schema_version":"2","appropriate":true,"reason":"",
                "reminders":[
                  {"title":"File taxes","due_mode":"all_day","due_text":"2026-03-31 17:00","confidence":"high"},
                  {"title":"Send slides","due_mode":"unclear","due_text":"","notes":"Send the slides tomorrow 9am","confidence":"medium"}
                ]}"#,
        ]);
        let result = extractor.extract(CHAT, SourceKind::Summary, "Quarter-end admin.", "").await;
        let drafts = &result.batch().unwrap().drafts;

        assert_eq!(local(&drafts[0].due_at), "2026-03-31 00:00");
        assert_eq!(drafts[1].due_mode, DueMode::Datetime);
        assert_eq!(local(&drafts[1].due_at), "2026-02-22 09:00");
    }

    #[tokio::test]
    async fn test_notes_and_link_recovered_from_source() {
        let source = format!(
            "{} Details at https://example.com/brief.",
            "Long meeting transcript. ".repeat(12)
        );
        let (extractor, _llm, _store) = extractor(vec![
            r#"{"schema_version":"2","appropriate":true,"reason":"",
                "reminders":[{"title":"Read brief","notes":"short","due_mode":"none","confidence":"medium"}]}"#,
        ]);
        let result = extractor.extract(CHAT, SourceKind::Audio, &source, "").await;
        let draft = &result.batch().unwrap().drafts[0];
        assert_eq!(draft.notes, source.trim());
        assert_eq!(draft.link, "https://example.com/brief");
    }
}
