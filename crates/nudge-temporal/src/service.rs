use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

use nudge_core::Confidence;
use nudge_llm::CompletionService;

use crate::fallback::LlmFallbackResolver;
use crate::resolver::{resolve, ParseResult, ParseStrategy};

/// Rule-based resolution with an optional model fallback.
#[derive(Clone, Default)]
pub struct TemporalResolver {
    fallback: Option<LlmFallbackResolver>,
    verbose: bool,
}

impl TemporalResolver {
    /// Rules only.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(llm: Arc<dyn CompletionService>) -> Self {
        Self {
            fallback: Some(LlmFallbackResolver::new(llm)),
            verbose: false,
        }
    }

    /// Log every decision at info level instead of debug.
    pub fn verbose(mut self, on: bool) -> Self {
        self.verbose = on;
        self
    }

    pub fn resolve(&self, text: &str, tz: Tz, now: DateTime<Utc>) -> ParseResult {
        let result = resolve(text, tz, now);
        self.log(text, &result);
        result
    }

    /// Rules first; the model is consulted only when they find nothing. A
    /// model answer is never trusted above medium confidence.
    pub async fn resolve_with_fallback(&self, text: &str, tz: Tz, now: DateTime<Utc>) -> ParseResult {
        let result = self.resolve(text, tz, now);
        if result.is_resolved() || text.trim().is_empty() {
            return result;
        }
        let Some(fallback) = &self.fallback else {
            return result;
        };

        let result = match fallback.resolve(text, tz, now).await {
            Some(value) => ParseResult {
                value: Some(value),
                confidence: Confidence::Medium,
                matched_span: text.trim().to_string(),
                strategy: ParseStrategy::LlmFallback,
            },
            None => ParseResult::unresolved(ParseStrategy::None),
        };
        self.log(text, &result);
        result
    }

    fn log(&self, input: &str, result: &ParseResult) {
        let value = result.value.map(|v| v.to_rfc3339()).unwrap_or_default();
        if self.verbose {
            info!(
                strategy = %result.strategy,
                confidence = %result.confidence,
                matched = %result.matched_span,
                value = %value,
                "Resolved date input {:?}",
                input
            );
        } else {
            debug!(
                strategy = %result.strategy,
                confidence = %result.confidence,
                matched = %result.matched_span,
                value = %value,
                "Resolved date input {:?}",
                input
            );
        }
    }
}
