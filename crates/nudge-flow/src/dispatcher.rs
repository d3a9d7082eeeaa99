//! Routes each inbound message: slash commands first, then the
//! conversation's active flow, then natural-language reminder requests.

use tracing::{debug, error, info};

use nudge_core::format::format_detail;
use nudge_core::{Confidence, ConversationId, DueAt, NewReminder, ReminderFields, Reply, SourceKind};
use nudge_draft::{batch_reply, DraftBatchExtractor, DraftReviewer, ExtractionResult};
use nudge_temporal::ParseResult;

use crate::commands::{
    apply_topic_edit, has_reminder_intent, looks_like_inline_add_payload, parse_add_payload, parse_edit_payload,
    parse_reminder_id, Command, DueEdit, DueSpec, TopicEdit, ADD_USAGE, EDIT_USAGE, HELP_TEXT, MISSING_DUE,
    MISSING_TITLE,
};
use crate::confirmation::{due_guess_reply, PendingConfirmation};
use crate::context::FlowContext;
use crate::error::Result;
use crate::flow::{ActiveFlow, FlowKind};
use crate::session::SessionStore;
use crate::topics::check_topics;
use crate::wizard::add::TOPIC_REQUIRED;
use crate::wizard::{AddWizard, DeleteWizard, EditWizard, NotesWizard, TopicsWizard, Wizard};

const NOT_UNDERSTOOD: &str = "I did not catch that. Send /help to see what I can do.";
const EXTRACT_USAGE: &str = "Usage: /extract <text to scan for reminders>";

pub struct Dispatcher {
    ctx: FlowContext,
    sessions: SessionStore,
    extractor: DraftBatchExtractor,
    reviewer: DraftReviewer,
}

impl Dispatcher {
    pub fn new(ctx: FlowContext, extractor: DraftBatchExtractor) -> Self {
        let reviewer = DraftReviewer::new(ctx.materializer.clone(), ctx.resolver.clone(), ctx.timezone)
            .with_clock(ctx.clock);
        Self {
            ctx,
            sessions: SessionStore::new(),
            extractor,
            reviewer,
        }
    }

    pub fn context(&self) -> &FlowContext {
        &self.ctx
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Resolve a date/time phrase in the configured timezone, with the
    /// model fallback when the rules find nothing.
    pub async fn resolve(&self, text: &str) -> ParseResult {
        self.ctx.resolve(text).await
    }

    /// Handle one inbound message. Failures are logged and answered with a
    /// short apology; they never escape.
    pub async fn handle_message(&self, conversation_id: ConversationId, text: &str) -> Vec<Reply> {
        match self.route(conversation_id, text).await {
            Ok(replies) => replies,
            Err(e) => {
                error!(conversation_id, error = %e, "Message handling failed");
                vec![Reply::text(format!("Sorry, that did not work: {}", e))]
            }
        }
    }

    async fn route(&self, conversation_id: ConversationId, text: &str) -> Result<Vec<Reply>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(command) = Command::parse(text) {
            debug!(conversation_id, ?command, "Command received");
            return self.run_command(conversation_id, command).await;
        }
        if let Some(replies) = self.followup(conversation_id, text).await? {
            return Ok(replies);
        }
        if has_reminder_intent(text) {
            return self.inline_add(conversation_id, text).await;
        }
        Ok(vec![Reply::text(NOT_UNDERSTOOD)])
    }

    /// Offer `text` to the conversation's active flow. `None` means no flow
    /// owns the conversation and the caller should fall through.
    pub async fn handle_followup(&self, conversation_id: ConversationId, text: &str) -> Option<Vec<Reply>> {
        match self.followup(conversation_id, text).await {
            Ok(handled) => handled,
            Err(e) => {
                error!(conversation_id, error = %e, "Flow follow-up failed");
                Some(vec![Reply::text(format!("Sorry, that did not work: {}", e))])
            }
        }
    }

    async fn followup(&self, conversation_id: ConversationId, text: &str) -> Result<Option<Vec<Reply>>> {
        let Some(flow) = self.sessions.take(conversation_id)? else {
            return Ok(None);
        };
        debug!(conversation_id, %flow, "Routing to active flow");

        match flow {
            ActiveFlow::Wizard(wizard) => {
                // A failed step leaves the wizard where it was.
                let before = wizard.clone();
                match wizard.handle(&self.ctx, conversation_id, text).await {
                    Ok(turn) => {
                        if let Some(next) = turn.next {
                            self.sessions.put(conversation_id, ActiveFlow::Wizard(next))?;
                        }
                        Ok(Some(turn.replies))
                    }
                    Err(e) => {
                        self.sessions.put(conversation_id, ActiveFlow::Wizard(before))?;
                        Err(e)
                    }
                }
            }
            ActiveFlow::Confirmation(mut queue) => {
                let result = queue.handle_reply(&self.ctx, conversation_id, text).await;
                self.sessions.put(conversation_id, ActiveFlow::Confirmation(queue))?;
                result.map(Some)
            }
            ActiveFlow::DraftReview(mut batch) => {
                let outcome = self.reviewer.handle(&mut batch, text).await;
                if !outcome.finished {
                    self.sessions.put(conversation_id, ActiveFlow::DraftReview(batch))?;
                }
                Ok(Some(outcome.replies))
            }
        }
    }

    /// Queue a candidate whose due date needs the user's confirmation. Only
    /// the head of the queue is announced.
    pub fn enqueue_confirmation(&self, conversation_id: ConversationId, candidate: PendingConfirmation) -> Result<Reply> {
        let title = candidate.title.clone();
        let reply = due_guess_reply(&self.ctx, &candidate);
        let is_head = self.sessions.enqueue_confirmation(conversation_id, candidate)?;
        info!(conversation_id, title = %title, is_head, "Reminder awaiting due confirmation");
        if is_head {
            return Ok(reply);
        }
        Ok(Reply::text(format!(
            "Queued '{}'. I will ask about its due date after the current one ({} pending).",
            title,
            self.sessions.pending_confirmations(conversation_id)
        )))
    }

    /// Propose reminders found in `content` and open a review of them.
    /// Nothing is saved until the user confirms.
    pub async fn extract_draft_batch(
        &self,
        conversation_id: ConversationId,
        source_kind: SourceKind,
        content: &str,
        instruction: &str,
    ) -> Result<ExtractionResult> {
        let result = self
            .extractor
            .extract(conversation_id, source_kind, content, instruction)
            .await;
        if let ExtractionResult::Proposed(batch) = &result {
            self.sessions.begin(conversation_id, ActiveFlow::DraftReview(batch.clone()))?;
        }
        Ok(result)
    }

    /// Extract drafts from content that arrived outside a command (a
    /// document, a summary, a transcript) and present them for review.
    pub async fn ingest(
        &self,
        conversation_id: ConversationId,
        source_kind: SourceKind,
        content: &str,
        instruction: &str,
    ) -> Vec<Reply> {
        match self.propose(conversation_id, source_kind, content, instruction).await {
            Ok(replies) => replies,
            Err(e) => {
                error!(conversation_id, error = %e, "Ingest failed");
                vec![Reply::text(format!("Sorry, that did not work: {}", e))]
            }
        }
    }

    async fn propose(
        &self,
        conversation_id: ConversationId,
        source_kind: SourceKind,
        content: &str,
        instruction: &str,
    ) -> Result<Vec<Reply>> {
        let result = self
            .extract_draft_batch(conversation_id, source_kind, content, instruction)
            .await?;
        Ok(vec![match result {
            ExtractionResult::Proposed(batch) => batch_reply(&batch, self.ctx.timezone),
            ExtractionResult::Declined { reason } => Reply::text(format!("No reminders to propose: {}", reason)),
        }])
    }

    // =========================================================================
    // Commands
    // =========================================================================

    async fn run_command(&self, conversation_id: ConversationId, command: Command) -> Result<Vec<Reply>> {
        match command {
            Command::Help => Ok(vec![Reply::text(HELP_TEXT)]),
            Command::Cancel => Ok(vec![match self.sessions.clear(conversation_id)? {
                Some(flow) => Reply::text(format!("Cancelled the {}.", flow)),
                None => Reply::text("Nothing to cancel."),
            }]),
            Command::Add(args) => self.add_command(conversation_id, &args).await,
            Command::Edit(args) => self.edit_command(conversation_id, &args).await,
            Command::Delete(args) => self.delete_command(conversation_id, &args),
            Command::Detail(args) => {
                let Some(id) = parse_reminder_id(&args) else {
                    return Ok(vec![Reply::text("Usage: /detail <id>")]);
                };
                Ok(vec![match self.ctx.store().get_reminder(conversation_id, id)? {
                    Some(reminder) => Reply::text(format_detail(&reminder, self.ctx.timezone)),
                    None => Reply::text(format!("Reminder #{} not found.", id)),
                }])
            }
            Command::List => self.list(conversation_id),
            Command::Notes => {
                let (wizard, reply) = NotesWizard::start();
                self.begin_wizard(conversation_id, Wizard::Notes(wizard))?;
                Ok(vec![reply])
            }
            Command::Topics => {
                let (wizard, reply) = TopicsWizard::start(&self.ctx, conversation_id)?;
                self.begin_wizard(conversation_id, Wizard::Topics(wizard))?;
                Ok(vec![reply])
            }
            Command::Extract(content) => {
                if content.is_empty() {
                    return Ok(vec![Reply::text(EXTRACT_USAGE)]);
                }
                self.propose(conversation_id, SourceKind::UserInput, &content, "").await
            }
            Command::Unknown(name) => Ok(vec![Reply::text(format!(
                "Unknown command /{}. Send /help for the list.",
                name
            ))]),
        }
    }

    fn begin_wizard(&self, conversation_id: ConversationId, wizard: Wizard) -> Result<()> {
        info!(conversation_id, wizard = wizard.name(), "Wizard started");
        self.sessions.begin(conversation_id, ActiveFlow::Wizard(wizard))?;
        Ok(())
    }

    async fn add_command(&self, conversation_id: ConversationId, args: &str) -> Result<Vec<Reply>> {
        if args.is_empty() {
            return Ok(vec![Reply::text(ADD_USAGE)]);
        }
        if !looks_like_inline_add_payload(args) {
            let (wizard, reply) = AddWizard::start(args);
            self.begin_wizard(conversation_id, Wizard::Add(wizard))?;
            return Ok(vec![reply]);
        }
        self.inline_add(conversation_id, args).await
    }

    /// One-shot add. A confidently parsed due date saves immediately; a
    /// guess goes to the confirmation queue.
    async fn inline_add(&self, conversation_id: ConversationId, raw: &str) -> Result<Vec<Reply>> {
        // Pending confirmations survive; any other flow yields to the add.
        self.sessions.clear_except(conversation_id, FlowKind::Confirmation)?;

        let payload = match parse_add_payload(raw) {
            Ok(payload) => payload,
            Err(message) => return Ok(vec![Reply::text(message)]),
        };

        let (due_at, confidence, span) = match &payload.due {
            DueSpec::NoDue => (DueAt::NONE, Confidence::High, None),
            DueSpec::Explicit(due_text) => {
                let parsed = self.ctx.resolve(due_text).await;
                if !parsed.is_resolved() {
                    return Ok(vec![Reply::text(format!(
                        "Could not understand the due date '{}'. Try `at:tomorrow 9am`.",
                        due_text
                    ))]);
                }
                (parsed.due_at(), parsed.confidence, None)
            }
            DueSpec::Search => {
                let parsed = self.ctx.resolve_rules(&payload.text);
                if !parsed.is_resolved() {
                    let reply = if payload.title(None).is_none() { MISSING_TITLE } else { MISSING_DUE };
                    return Ok(vec![Reply::text(reply)]);
                }
                (parsed.due_at(), parsed.confidence, Some(parsed.matched_span))
            }
        };

        let Some(title) = payload.title(span.as_deref()) else {
            return Ok(vec![Reply::text(MISSING_TITLE)]);
        };
        if self.ctx.require_topic && payload.topics.is_empty() {
            return Ok(vec![Reply::text(TOPIC_REQUIRED)]);
        }
        if let Some(message) = check_topics(self.ctx.store().as_ref(), conversation_id, &payload.topics)? {
            return Ok(vec![Reply::text(message)]);
        }

        let fields = ReminderFields {
            title,
            notes: payload.notes,
            link: payload.link,
            priority: payload.priority,
            due_at,
            recurrence: payload.recurrence,
        };
        if let Err(message) = fields.validate() {
            return Ok(vec![Reply::text(format!("Cannot add that reminder: {}.", message))]);
        }

        if due_at.is_set() && confidence != Confidence::High {
            let candidate = PendingConfirmation {
                title: fields.title,
                topics: payload.topics,
                priority: fields.priority,
                due_at,
                recurrence: fields.recurrence,
                link: fields.link,
                notes: fields.notes,
            };
            return Ok(vec![self.enqueue_confirmation(conversation_id, candidate)?]);
        }

        let new = NewReminder {
            conversation_id,
            source_kind: SourceKind::UserInput,
            fields,
        };
        let done = self.ctx.materializer.materialize(new, &payload.topics).await?;
        Ok(self.ctx.saved_replies(&done.reminder, done.sync_error))
    }

    async fn edit_command(&self, conversation_id: ConversationId, args: &str) -> Result<Vec<Reply>> {
        let (id_text, rest) = match args.split_once(char::is_whitespace) {
            Some((id, rest)) => (id, rest.trim()),
            None => (args, ""),
        };
        if id_text.is_empty() {
            return Ok(vec![Reply::text(EDIT_USAGE)]);
        }
        let Some(id) = parse_reminder_id(id_text) else {
            return Ok(vec![Reply::text("Reminder id must be a number.")]);
        };
        let store = self.ctx.store();
        let Some(existing) = store.get_reminder(conversation_id, id)? else {
            return Ok(vec![Reply::text(format!("Reminder #{} not found.", id))]);
        };

        if rest.is_empty() {
            let (wizard, reply) = EditWizard::start(&self.ctx, &existing);
            self.begin_wizard(conversation_id, Wizard::Edit(wizard))?;
            return Ok(vec![reply]);
        }

        self.sessions.clear(conversation_id)?;
        let edit = match parse_edit_payload(rest) {
            Ok(edit) => edit,
            Err(message) => return Ok(vec![Reply::text(message)]),
        };

        let mut fields = existing.fields.clone();
        if let Some(title) = edit.title {
            fields.title = title.trim().to_string();
        }
        if let Some(notes) = edit.notes {
            fields.notes = notes;
        }
        if let Some(link) = edit.link {
            fields.link = link;
        }
        if let Some(priority) = edit.priority {
            fields.priority = priority;
        }
        if let Some(recurrence) = edit.recurrence {
            fields.recurrence = recurrence;
        }
        match edit.due {
            Some(DueEdit::Clear) => fields.due_at = DueAt::NONE,
            Some(DueEdit::Text(due_text)) => {
                let parsed = self.ctx.resolve(&due_text).await;
                if !parsed.is_resolved() {
                    return Ok(vec![Reply::text(format!(
                        "Could not understand the due date '{}'. Nothing was changed.",
                        due_text
                    ))]);
                }
                fields.due_at = parsed.due_at();
            }
            None => {}
        }
        if let Err(message) = fields.validate() {
            return Ok(vec![Reply::text(format!("Cannot save: {}.", message))]);
        }

        let topics = match &edit.topics {
            None => None,
            Some(topic_edit) => {
                if let TopicEdit::Add(named) | TopicEdit::Replace(named) = topic_edit {
                    if let Some(message) = check_topics(store.as_ref(), conversation_id, named)? {
                        return Ok(vec![Reply::text(message)]);
                    }
                }
                Some(apply_topic_edit(&existing.topics, topic_edit))
            }
        };

        store.update_reminder(conversation_id, id, &fields)?;
        if let Some(topics) = topics {
            store.set_reminder_topics(conversation_id, id, &topics)?;
        }
        let Some(updated) = store.get_reminder(conversation_id, id)? else {
            return Ok(vec![Reply::text(format!("Reminder #{} not found.", id))]);
        };
        info!(conversation_id, reminder_id = id, "Reminder edited inline");
        let sync_error = self.ctx.materializer.resync(&updated).await;
        Ok(self.ctx.saved_replies(&updated, sync_error))
    }

    fn delete_command(&self, conversation_id: ConversationId, args: &str) -> Result<Vec<Reply>> {
        if args.is_empty() {
            let (wizard, reply) = DeleteWizard::start();
            self.begin_wizard(conversation_id, Wizard::Delete(wizard))?;
            return Ok(vec![reply]);
        }
        let Some(id) = parse_reminder_id(args) else {
            return Ok(vec![Reply::text("Reminder id must be a number.")]);
        };
        let turn = DeleteWizard::for_id(&self.ctx, conversation_id, id)?;
        if let Some(next) = turn.next {
            self.begin_wizard(conversation_id, Wizard::Delete(next))?;
        }
        Ok(turn.replies)
    }

    fn list(&self, conversation_id: ConversationId) -> Result<Vec<Reply>> {
        let reminders = self.ctx.store().list_reminders(conversation_id)?;
        if reminders.is_empty() {
            return Ok(vec![Reply::text("No reminders yet. Add one with /add.")]);
        }
        let mut lines = vec!["Your reminders:".to_string()];
        for reminder in &reminders {
            lines.push(format!(
                "#{} {} - {} [{}]",
                reminder.id,
                reminder.fields.title,
                self.ctx.due_display(&reminder.fields.due_at),
                reminder.fields.priority
            ));
        }
        lines.push("Use /detail <id> for notes and links.".to_string());
        Ok(vec![Reply::text(lines.join("\n"))])
    }
}
