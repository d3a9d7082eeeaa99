//! Menu-driven edit dialog. Edits are collected locally and committed as a
//! single update on `save`.

use nudge_core::{ConversationId, DueAt, Priority, Recurrence, Reminder, ReminderFields, ReminderId, Reply};
use nudge_draft::refine::is_valid_link;

use super::{is_stop, Turn};
use crate::context::FlowContext;
use crate::error::Result;
use crate::topics::{check_topics, dedupe_topics, split_topics};

const TOPIC_OPTIONS: &str = "Topic options: `add`, `remove`, `replace`, `clear`, `back`.";

/// A single-value field reachable from the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    Title,
    Due,
    Priority,
    Interval,
    Link,
    Notes,
}

impl EditField {
    fn parse(token: &str) -> Option<EditField> {
        match token {
            "title" => Some(EditField::Title),
            "due" => Some(EditField::Due),
            "priority" => Some(EditField::Priority),
            "interval" => Some(EditField::Interval),
            "link" => Some(EditField::Link),
            "notes" => Some(EditField::Notes),
            _ => None,
        }
    }

    fn prompt(self) -> &'static str {
        match self {
            EditField::Title => "Enter new title (or `skip`):",
            EditField::Due => "Enter new due date/time (`none` to clear, or `skip`):",
            EditField::Priority => "Enter priority (`immediate|high|mid|low`, or `skip`):",
            EditField::Interval => "Enter interval (`daily|weekly|monthly|none`, or `skip`):",
            EditField::Link => "Enter link (`https://...`, `none` to clear, or `skip`):",
            EditField::Notes => "Enter notes (`none` to clear, or `skip`):",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicAction {
    Add,
    Remove,
    Replace,
}

impl TopicAction {
    fn verb(self) -> &'static str {
        match self {
            TopicAction::Add => "add",
            TopicAction::Remove => "remove",
            TopicAction::Replace => "replace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Menu,
    Input(EditField),
    TopicMenu,
    TopicInput(TopicAction),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditWizard {
    pub id: ReminderId,
    pub fields: ReminderFields,
    pub topics: Vec<String>,
    pub mode: EditMode,
}

impl EditWizard {
    /// Open the menu for an existing reminder.
    pub fn start(ctx: &FlowContext, reminder: &Reminder) -> (EditWizard, Reply) {
        let wizard = EditWizard {
            id: reminder.id,
            fields: reminder.fields.clone(),
            topics: reminder.topics.clone(),
            mode: EditMode::Menu,
        };
        let reply = wizard.menu_reply(ctx);
        (wizard, reply)
    }

    pub fn render_menu(&self, ctx: &FlowContext) -> String {
        let or_none = |value: &str| {
            if value.is_empty() {
                "(none)".to_string()
            } else {
                value.to_string()
            }
        };
        let interval = self.fields.recurrence.map(|r| r.to_string()).unwrap_or_default();
        let notes = if self.fields.notes.trim().is_empty() { "(none)" } else { "yes" };

        format!(
            "Editing #{}\n- title: {}\n- due: {}\n- priority: {}\n- topic: {}\n- interval: {}\n- link: {}\n- notes: {}\n\n\
             Choose what to edit: `title`, `due`, `priority`, `topic`, `interval`, `link`, `notes`\n\
             Then `save` to apply, or `cancel`.",
            self.id,
            self.fields.title,
            ctx.due_display(&self.fields.due_at),
            self.fields.priority,
            or_none(&self.topics.join(", ")),
            or_none(&interval),
            or_none(&self.fields.link),
            notes
        )
    }

    fn menu_reply(&self, ctx: &FlowContext) -> Reply {
        Reply::text(self.render_menu(ctx))
            .with_action("Save", "save")
            .with_action("Cancel", "cancel")
    }

    fn back_to_menu(mut self, ctx: &FlowContext) -> Turn<EditWizard> {
        self.mode = EditMode::Menu;
        let reply = self.menu_reply(ctx);
        Turn::stay(self, reply)
    }

    pub async fn handle(self, ctx: &FlowContext, conversation_id: ConversationId, text: &str) -> Result<Turn<EditWizard>> {
        let raw = text.trim();
        let lowered = raw.to_lowercase();
        if is_stop(&lowered) {
            return Ok(Turn::done(vec![Reply::text("Edit flow cancelled.")]));
        }

        let mode = self.mode;
        match mode {
            EditMode::Menu => self.on_menu(ctx, conversation_id, &lowered).await,
            EditMode::Input(field) => Ok(self.on_input(ctx, field, raw, &lowered).await),
            EditMode::TopicMenu => Ok(self.on_topic_menu(ctx, &lowered)),
            EditMode::TopicInput(action) => self.on_topic_input(ctx, conversation_id, action, raw, &lowered),
        }
    }

    async fn on_menu(mut self, ctx: &FlowContext, conversation_id: ConversationId, lowered: &str) -> Result<Turn<EditWizard>> {
        if matches!(lowered, "save" | "done") {
            return self.save(ctx, conversation_id).await;
        }
        if lowered == "topic" {
            self.mode = EditMode::TopicMenu;
            return Ok(Turn::stay(self, Reply::text(TOPIC_OPTIONS)));
        }
        if let Some(field) = EditField::parse(lowered) {
            self.mode = EditMode::Input(field);
            return Ok(Turn::stay(self, Reply::text(field.prompt())));
        }
        Ok(self.back_to_menu(ctx))
    }

    async fn on_input(mut self, ctx: &FlowContext, field: EditField, raw: &str, lowered: &str) -> Turn<EditWizard> {
        if matches!(lowered, "skip" | "no") {
            return self.back_to_menu(ctx);
        }
        let clear = matches!(lowered, "none" | "clear");

        match field {
            EditField::Title => {
                if !raw.is_empty() {
                    self.fields.title = raw.to_string();
                }
            }
            EditField::Due => {
                if clear {
                    if self.fields.recurrence.is_some() {
                        return Turn::stay(
                            self,
                            Reply::text("This reminder repeats. Clear the interval before removing the due date."),
                        );
                    }
                    self.fields.due_at = DueAt::NONE;
                } else {
                    let result = ctx.resolve(raw).await;
                    if !result.is_resolved() {
                        return Turn::stay(self, Reply::text("Could not parse date/time. Try again or `skip`."));
                    }
                    self.fields.due_at = result.due_at();
                }
            }
            EditField::Priority => match Priority::from_token(lowered) {
                Some(priority) => self.fields.priority = priority,
                None => return Turn::stay(self, Reply::text("Invalid priority. Try again or `skip`.")),
            },
            EditField::Interval => {
                if clear {
                    self.fields.recurrence = None;
                } else {
                    match lowered.parse::<Recurrence>() {
                        Ok(_) if !self.fields.due_at.is_set() => {
                            return Turn::stay(
                                self,
                                Reply::text("A repeat interval needs a due date. Set `due` first or `skip`."),
                            )
                        }
                        Ok(rule) => self.fields.recurrence = Some(rule),
                        Err(_) => return Turn::stay(self, Reply::text("Invalid interval. Try again or `skip`.")),
                    }
                }
            }
            EditField::Link => {
                if clear {
                    self.fields.link.clear();
                } else if is_valid_link(raw) {
                    self.fields.link = raw.to_string();
                } else {
                    return Turn::stay(self, Reply::text("Invalid link. Use https://... or `none`/`skip`."));
                }
            }
            EditField::Notes => {
                self.fields.notes = if clear { String::new() } else { raw.to_string() };
            }
        }
        self.back_to_menu(ctx)
    }

    fn on_topic_menu(mut self, ctx: &FlowContext, lowered: &str) -> Turn<EditWizard> {
        let action = match lowered {
            "back" | "menu" => return self.back_to_menu(ctx),
            "clear" | "none" => {
                self.topics.clear();
                return self.back_to_menu(ctx);
            }
            "add" => TopicAction::Add,
            "remove" => TopicAction::Remove,
            "replace" => TopicAction::Replace,
            _ => return Turn::stay(self, Reply::text(TOPIC_OPTIONS)),
        };
        self.mode = EditMode::TopicInput(action);
        let prompt = format!("Enter topic names to {} (comma-separated), or `back`.", action.verb());
        Turn::stay(self, Reply::text(prompt))
    }

    fn on_topic_input(
        mut self,
        ctx: &FlowContext,
        conversation_id: ConversationId,
        action: TopicAction,
        raw: &str,
        lowered: &str,
    ) -> Result<Turn<EditWizard>> {
        if matches!(lowered, "back" | "menu") {
            self.mode = EditMode::TopicMenu;
            return Ok(Turn::stay(self, Reply::text(TOPIC_OPTIONS)));
        }

        let topics = split_topics(raw);
        if action != TopicAction::Remove {
            if let Some(message) = check_topics(ctx.store().as_ref(), conversation_id, &topics)? {
                return Ok(Turn::stay(self, Reply::text(message)));
            }
        }

        self.topics = match action {
            TopicAction::Add => dedupe_topics(self.topics.iter().cloned().chain(topics)),
            TopicAction::Remove => self
                .topics
                .iter()
                .filter(|t| !topics.iter().any(|r| r.eq_ignore_ascii_case(t)))
                .cloned()
                .collect(),
            TopicAction::Replace => topics,
        };
        Ok(self.back_to_menu(ctx))
    }

    async fn save(self, ctx: &FlowContext, conversation_id: ConversationId) -> Result<Turn<EditWizard>> {
        if let Err(reason) = self.fields.validate() {
            return Ok(Turn::stay(self, Reply::text(format!("Cannot save: {}.", reason))));
        }

        let store = ctx.store();
        if store.get_reminder(conversation_id, self.id)?.is_none() {
            return Ok(Turn::done(vec![Reply::text(format!("Reminder #{} not found.", self.id))]));
        }
        store.update_reminder(conversation_id, self.id, &self.fields)?;
        store.set_reminder_topics(conversation_id, self.id, &self.topics)?;

        let Some(updated) = store.get_reminder(conversation_id, self.id)? else {
            return Ok(Turn::done(vec![Reply::text(format!("Reminder #{} not found.", self.id))]));
        };
        let sync_error = ctx.materializer.resync(&updated).await;
        Ok(Turn::done(ctx.saved_replies(&updated, sync_error)))
    }
}
