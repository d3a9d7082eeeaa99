//! Last-resort date resolution through the generative model.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use nudge_core::DueMode;
use nudge_llm::json::str_field;
use nudge_llm::prompts::datetime_fallback_prompt;
use nudge_llm::{parse_json_object, CompletionRequest, CompletionService};

use crate::resolver::{localize, resolve};
use crate::time_of_day::has_explicit_time;

/// Asks the model to restate a date expression in parseable form.
#[derive(Clone)]
pub struct LlmFallbackResolver {
    llm: Arc<dyn CompletionService>,
}

impl LlmFallbackResolver {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    /// Returns `None` on any failure: transport error, unusable JSON, a
    /// rejected mode or confidence, or a `due_text` the rules cannot parse.
    pub async fn resolve(&self, text: &str, tz: Tz, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
        let now_local = now.with_timezone(&tz);
        let prompt = datetime_fallback_prompt(text, tz.name(), &now_local.to_rfc3339());
        let raw = match self.llm.complete(CompletionRequest::text(prompt)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Date fallback call failed");
                return None;
            }
        };
        interpret_fallback_response(&raw, tz, now)
    }
}

/// Validate a fallback response and resolve its `due_text`.
pub fn interpret_fallback_response(raw: &str, tz: Tz, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
    let Some(map) = parse_json_object(raw) else {
        debug!("Date fallback returned no JSON object");
        return None;
    };

    let confidence = str_field(&map, "confidence").to_lowercase();
    if confidence != "high" && confidence != "medium" {
        debug!(confidence = %confidence, "Date fallback confidence rejected");
        return None;
    }

    let mode = match str_field(&map, "due_mode") {
        "" => DueMode::Datetime,
        token => DueMode::parse_or(token, DueMode::Datetime),
    };
    if !mode.claims_date() {
        return None;
    }

    let due_text = str_field(&map, "due_text");
    if due_text.is_empty() {
        return None;
    }

    let value = resolve(due_text, tz, now).value?;
    if mode == DueMode::AllDay && !has_explicit_time(due_text) {
        return localize(tz, value.date_naive().and_time(NaiveTime::MIN));
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use nudge_llm::ScriptedCompletion;

    fn singapore() -> Tz {
        "Asia/Singapore".parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        singapore()
            .with_ymd_and_hms(2026, 2, 21, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_accepts_datetime_response() {
        let raw = r#"{"due_text": "2026-03-17 09:00", "due_mode": "datetime", "confidence": "high"}"#;
        let value = interpret_fallback_response(raw, singapore(), now()).unwrap();
        assert_eq!(
            value.naive_local(),
            NaiveDate::from_ymd_opt(2026, 3, 17).unwrap().and_hms_opt(9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_all_day_forced_to_midnight() {
        let raw = r#"Here: {"due_text": "2026-03-31", "due_mode": "all_day", "confidence": "medium"}"#;
        let value = interpret_fallback_response(raw, singapore(), now()).unwrap();
        assert_eq!(value.naive_local().time(), NaiveTime::MIN);
    }

    #[test]
    fn test_all_day_with_explicit_time_keeps_time() {
        let raw = r#"{"due_text": "2026-03-31 17:00", "due_mode": "all_day", "confidence": "high"}"#;
        let value = interpret_fallback_response(raw, singapore(), now()).unwrap();
        assert_eq!(value.naive_local().time(), NaiveTime::from_hms_opt(17, 0, 0).unwrap());
    }

    #[test]
    fn test_rejections() {
        let cases = [
            r#"{"due_text": "2026-03-17", "due_mode": "none", "confidence": "high"}"#,
            r#"{"due_text": "2026-03-17", "due_mode": "unclear", "confidence": "high"}"#,
            r#"{"due_text": "2026-03-17", "due_mode": "datetime", "confidence": "low"}"#,
            r#"{"due_text": "", "due_mode": "datetime", "confidence": "high"}"#,
            r#"{"due_text": "whenever", "due_mode": "datetime", "confidence": "high"}"#,
            r#"{"due_text": "2026-03-17""#,
            "not json",
        ];
        for raw in cases {
            assert!(interpret_fallback_response(raw, singapore(), now()).is_none(), "{raw}");
        }
    }

    #[test]
    fn test_unknown_mode_treated_as_datetime() {
        let raw = r#"{"due_text": "2026-03-17 08:30", "due_mode": "exact", "confidence": "high"}"#;
        assert!(interpret_fallback_response(raw, singapore(), now()).is_some());
    }

    #[tokio::test]
    async fn test_resolver_sends_context_and_survives_errors() {
        let llm = Arc::new(
            ScriptedCompletion::new([
                r#"{"due_text": "2026-04-01", "due_mode": "all_day", "confidence": "high"}"#,
            ])
            .then_fail("connection refused"),
        );
        let fallback = LlmFallbackResolver::new(llm.clone());

        let first = fallback.resolve("april fools", singapore(), now()).await;
        assert!(first.is_some());
        let second = fallback.resolve("april fools", singapore(), now()).await;
        assert!(second.is_none());

        let prompts = llm.prompts();
        assert!(prompts[0].contains("Timezone: Asia/Singapore"));
        assert!(prompts[0].contains("Input: april fools"));
    }
}
