use std::sync::Arc;

use chrono_tz::Tz;

use nudge_core::format::{format_brief, format_due};
use nudge_core::{Clock, DueAt, Materializer, NudgeConfig, Reminder, ReminderStore, Reply};
use nudge_temporal::{ParseResult, TemporalResolver};

/// Collaborators and settings shared by every flow handler.
#[derive(Clone)]
pub struct FlowContext {
    pub materializer: Materializer,
    pub resolver: TemporalResolver,
    pub timezone: Tz,
    pub clock: Clock,
    /// Adding a reminder requires at least one topic.
    pub require_topic: bool,
}

impl FlowContext {
    pub fn new(materializer: Materializer, resolver: TemporalResolver, timezone: Tz) -> Self {
        Self {
            materializer,
            resolver,
            timezone,
            clock: Clock::System,
            require_topic: false,
        }
    }

    pub fn from_config(config: &NudgeConfig, materializer: Materializer, resolver: TemporalResolver) -> Self {
        Self::new(materializer, resolver, config.timezone())
            .with_require_topic(config.flows.require_topic_on_add)
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_require_topic(mut self, on: bool) -> Self {
        self.require_topic = on;
        self
    }

    pub fn store(&self) -> &Arc<dyn ReminderStore> {
        self.materializer.store()
    }

    /// Rules, then the model fallback when the rules find nothing.
    pub async fn resolve(&self, text: &str) -> ParseResult {
        self.resolver
            .resolve_with_fallback(text, self.timezone, self.clock.now())
            .await
    }

    /// Rules only, for scanning free text.
    pub fn resolve_rules(&self, text: &str) -> ParseResult {
        self.resolver.resolve(text, self.timezone, self.clock.now())
    }

    pub fn brief(&self, reminder: &Reminder) -> String {
        format_brief(reminder, self.timezone)
    }

    pub fn due_display(&self, due: &DueAt) -> String {
        format_due(due, self.timezone)
    }

    /// The brief of a saved reminder, plus a notice when the calendar
    /// mirror could not be updated.
    pub fn saved_replies(&self, reminder: &Reminder, sync_error: Option<String>) -> Vec<Reply> {
        let mut replies = vec![Reply::text(self.brief(reminder))];
        if let Some(err) = sync_error {
            replies.push(Reply::text(format!("Saved, but calendar sync failed: {}", err)));
        }
        replies
    }
}
