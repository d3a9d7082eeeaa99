//! Line-oriented console transport.
//!
//! Every stdin line is one inbound message for a single conversation.
//! Lines starting with `:` are console directives that never reach the
//! dispatcher as text.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use nudge_core::{ConversationId, MessageChannel, NudgeError, Reply, SourceKind};
use nudge_flow::Dispatcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Message(String),
    /// Read a file and propose reminders from it.
    Document { path: PathBuf, instruction: String },
    Quit,
    Empty,
}

pub const CONSOLE_HELP: &str = "Console: `:doc <path> [instruction]` proposes reminders from a file, `:quit` exits.";

pub fn parse_line(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Empty;
    }
    let Some(directive) = line.strip_prefix(':') else {
        return ConsoleInput::Message(line.to_string());
    };
    let (name, rest) = match directive.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (directive, ""),
    };
    match name.to_lowercase().as_str() {
        "q" | "quit" | "exit" => ConsoleInput::Quit,
        "doc" if !rest.is_empty() => {
            let (path, instruction) = match rest.split_once(char::is_whitespace) {
                Some((path, instruction)) => (path, instruction.trim()),
                None => (rest, ""),
            };
            ConsoleInput::Document {
                path: PathBuf::from(path),
                instruction: instruction.to_string(),
            }
        }
        _ => ConsoleInput::Message(line.to_string()),
    }
}

/// Render a reply for the terminal, listing its actions by payload.
pub fn render_reply(reply: &Reply) -> String {
    let mut out = reply.text.clone();
    if !reply.actions.is_empty() {
        let actions: Vec<String> = reply
            .actions
            .iter()
            .map(|a| format!("[{}] {}", a.payload, a.label))
            .collect();
        out.push('\n');
        out.push_str(&actions.join("  "));
    }
    out
}

/// Delivers replies to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutChannel;

#[async_trait]
impl MessageChannel for StdoutChannel {
    async fn send(&self, _conversation_id: ConversationId, reply: &Reply) -> nudge_core::Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("{}\n", render_reply(reply)).as_bytes())
            .await
            .map_err(|e| NudgeError::Delivery(e.to_string()))?;
        stdout.flush().await.map_err(|e| NudgeError::Delivery(e.to_string()))
    }
}

pub struct Console {
    dispatcher: Dispatcher,
    channel: Box<dyn MessageChannel>,
    conversation_id: ConversationId,
}

impl Console {
    pub fn new(dispatcher: Dispatcher, channel: Box<dyn MessageChannel>, conversation_id: ConversationId) -> Self {
        Self {
            dispatcher,
            channel,
            conversation_id,
        }
    }

    /// Read stdin until EOF or `:quit`.
    pub async fn run(&self) -> std::io::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        self.deliver(&[Reply::text(format!("{}\n{}", nudge_flow::HELP_TEXT, CONSOLE_HELP))])
            .await;

        while let Some(line) = lines.next_line().await? {
            let replies = match parse_line(&line) {
                ConsoleInput::Quit => break,
                ConsoleInput::Empty => continue,
                ConsoleInput::Message(text) => self.dispatcher.handle_message(self.conversation_id, &text).await,
                ConsoleInput::Document { path, instruction } => self.ingest_file(path, &instruction).await,
            };
            self.deliver(&replies).await;
        }

        info!(conversation_id = self.conversation_id, "Console closed");
        Ok(())
    }

    async fn deliver(&self, replies: &[Reply]) {
        for reply in replies {
            if let Err(e) = self.channel.send(self.conversation_id, reply).await {
                warn!(conversation_id = self.conversation_id, error = %e, "Reply delivery failed");
            }
        }
    }

    async fn ingest_file(&self, path: PathBuf, instruction: &str) -> Vec<Reply> {
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                info!(path = %path.display(), chars = content.chars().count(), "Document read");
                self.dispatcher
                    .ingest(self.conversation_id, SourceKind::Document, &content, instruction)
                    .await
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read document");
                vec![Reply::text(format!("Could not read {}: {}", path.display(), e))]
            }
        }
    }
}
