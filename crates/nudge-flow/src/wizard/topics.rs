use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use nudge_core::{ConversationId, NudgeError, Reply, TopicId};

use super::{is_stop, Turn};
use crate::context::FlowContext;
use crate::error::{FlowError, Result};

static CREATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^create\s+(.+)$").expect("valid regex"));
static RENAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^rename\s+(\d+)\s+(.+)$").expect("valid regex"));
static DELETE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^delete\s+(\d+)$").expect("valid regex"));
static MERGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^merge\s+(\d+)\s+(\d+)$").expect("valid regex"));

const HELP: &str =
    "Topics wizard commands: `list`, `create <name>`, `rename <id> <new>`, `delete <id>`, `merge <from> <to>`, `cancel`.";

/// Manages the conversation's topic vocabulary. Stays open until cancelled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicsWizard;

impl TopicsWizard {
    pub fn start(ctx: &FlowContext, conversation_id: ConversationId) -> Result<(TopicsWizard, Reply)> {
        Ok((TopicsWizard, list_reply(ctx, conversation_id)?))
    }

    pub fn handle(self, ctx: &FlowContext, conversation_id: ConversationId, text: &str) -> Result<Turn<TopicsWizard>> {
        let raw = text.trim();
        let lowered = raw.to_lowercase();
        if is_stop(&lowered) {
            return Ok(Turn::done(vec![Reply::text("Topics flow cancelled.")]));
        }
        let reply = match apply(ctx, conversation_id, raw, &lowered) {
            Ok(reply) => reply,
            // Bad names and unknown ids are the user's to fix; keep the wizard open.
            Err(FlowError::Core(NudgeError::Validation(msg))) => Reply::text(format!("Cannot do that: {}.", msg)),
            Err(FlowError::Core(NudgeError::NotFound(what))) => Reply::text(format!("No {} in this chat.", what)),
            Err(e) => return Err(e),
        };
        Ok(Turn::stay(self, reply))
    }
}

fn apply(ctx: &FlowContext, conversation_id: ConversationId, raw: &str, lowered: &str) -> Result<Reply> {
    let store = ctx.store();
    if lowered == "list" {
        return list_reply(ctx, conversation_id);
    }

    if let Some(caps) = CREATE_RE.captures(raw) {
        let topic = store.create_topic(conversation_id, caps[1].trim())?;
        info!(conversation_id, topic = %topic.name, "Topic created");
        return Ok(Reply::text(format!("Topic created: {}", topic.name)));
    }

    if let Some(caps) = RENAME_RE.captures(raw) {
        let id = parse_id(&caps[1])?;
        let topic = store.rename_topic(conversation_id, id, caps[2].trim())?;
        info!(conversation_id, topic_id = id, topic = %topic.name, "Topic renamed");
        return Ok(Reply::text(format!("Topic #{} renamed to {}", id, topic.name)));
    }

    if let Some(caps) = DELETE_RE.captures(raw) {
        let id = parse_id(&caps[1])?;
        if !store.delete_topic(conversation_id, id)? {
            return Err(NudgeError::NotFound(format!("topic #{}", id)).into());
        }
        info!(conversation_id, topic_id = id, "Topic deleted");
        return Ok(Reply::text(format!("Topic #{} deleted.", id)));
    }

    if let Some(caps) = MERGE_RE.captures(raw) {
        let (from, into) = (parse_id(&caps[1])?, parse_id(&caps[2])?);
        let topic = store.merge_topics(conversation_id, from, into)?;
        info!(conversation_id, from, into, "Topics merged");
        return Ok(Reply::text(format!("Merged topic #{} into #{} ({}).", from, into, topic.name)));
    }

    Ok(topics_reply(HELP.to_string()))
}

fn parse_id(raw: &str) -> Result<TopicId> {
    raw.parse::<TopicId>()
        .map_err(|_| NudgeError::Validation(format!("'{}' is not a topic id", raw)).into())
}

fn list_reply(ctx: &FlowContext, conversation_id: ConversationId) -> Result<Reply> {
    let topics = ctx.store().list_topics(conversation_id)?;
    if topics.is_empty() {
        return Ok(topics_reply(format!("No topics yet. Use `create <name>` to add one.\n{}", HELP)));
    }
    let mut lines = vec!["Topics:".to_string()];
    for (idx, topic) in topics.iter().enumerate() {
        lines.push(format!("{}) [{}] {} - reminders:{}", idx + 1, topic.id, topic.name, topic.reminder_count));
    }
    Ok(topics_reply(lines.join("\n")))
}

fn topics_reply(text: String) -> Reply {
    Reply::text(text)
        .with_action("List", "list")
        .with_action("Cancel", "cancel")
}
