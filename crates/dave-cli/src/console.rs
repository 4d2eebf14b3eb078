//! Console chat transport.
//!
//! Every stdin line is a message from the local user in chat `1`. A line of
//! the form `>ID text` replies to message `ID`. Bot output goes to stdout,
//! prefixed with the id the console assigned to it.

use async_trait::async_trait;
use chrono::Utc;
use dave_application::FifoMap;
use dave_core::Result;
use dave_core::conversation::{ChatId, IncomingMessage, MessageId, RepliedMessage, Sender};
use dave_core::transport::ChatTransport;
use std::io::Write;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{Mutex, RwLock};

pub const CONSOLE_CHAT: ChatId = 1;
pub const CONSOLE_USER_ID: i64 = 1000;
pub const BOT_USER_ID: i64 = 1;
pub const BOT_USERNAME: &str = "crazy_dave";
pub const SOURCE_CHANNEL: &str = "console";

const FIRST_MESSAGE_ID: MessageId = 1;

struct Posted {
    sender_id: i64,
    text: String,
}

/// Splits `>ID text` into the parent id and the text.
///
/// Anything else is a plain message. Returns `None` for blank lines.
pub fn parse_line(line: &str) -> Option<(Option<MessageId>, &str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some(rest) = line.strip_prefix('>') {
        let (id, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if let Ok(id) = id.parse::<MessageId>() {
            return Some((Some(id), text.trim()));
        }
    }
    Some((None, line))
}

/// Local terminal standing in for a group chat.
///
/// Only the latest `capacity` messages can be replied to.
pub struct ConsoleTransport {
    next_id: AtomicI64,
    posted: RwLock<FifoMap<MessageId, Posted>>,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleTransport {
    pub fn new(out: Box<dyn Write + Send>, capacity: usize) -> Self {
        Self {
            next_id: AtomicI64::new(FIRST_MESSAGE_ID),
            posted: RwLock::new(FifoMap::new(capacity)),
            out: Mutex::new(out),
        }
    }

    pub fn stdout(capacity: usize) -> Self {
        Self::new(Box::new(std::io::stdout()), capacity)
    }

    fn allocate_id(&self) -> MessageId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn remember(&self, id: MessageId, sender_id: i64, text: &str) {
        self.posted.write().await.put(
            id,
            Posted {
                sender_id,
                text: text.to_string(),
            },
        );
    }

    async fn print(&self, line: &str) -> Result<()> {
        let mut out = self.out.lock().await;
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }

    /// Turns one input line into a message from the local user.
    ///
    /// A reply to an id the console never assigned, or no longer remembers,
    /// is treated as a plain message.
    pub async fn incoming(&self, line: &str) -> Result<Option<IncomingMessage>> {
        let Some((parent, text)) = parse_line(line) else {
            return Ok(None);
        };

        let reply_to = match parent {
            Some(parent) => {
                let posted = self.posted.read().await;
                match posted.get(&parent) {
                    Some(found) => Some(RepliedMessage {
                        id: parent,
                        sender_id: found.sender_id,
                        text: found.text.clone(),
                    }),
                    None => {
                        tracing::debug!(parent, "Reply to unknown message");
                        None
                    }
                }
            }
            None => None,
        };

        let id = self.allocate_id();
        self.remember(id, CONSOLE_USER_ID, text).await;
        self.print(&format!("  (#{id})")).await?;

        Ok(Some(IncomingMessage {
            id,
            chat_id: CONSOLE_CHAT,
            sender: Sender {
                id: CONSOLE_USER_ID,
                first_name: "You".to_string(),
                last_name: None,
                username: None,
            },
            timestamp: Utc::now(),
            text: text.to_string(),
            reply_to,
        }))
    }
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<MessageId> {
        let id = self.allocate_id();
        self.remember(id, BOT_USER_ID, text).await;
        self.print(&format!("[#{id}] {BOT_USERNAME}@{chat}: {text}"))
            .await?;
        Ok(id)
    }

    async fn reply(&self, chat: ChatId, to: MessageId, text: &str) -> Result<MessageId> {
        let id = self.allocate_id();
        self.remember(id, BOT_USER_ID, text).await;
        self.print(&format!("[#{id}] {BOT_USERNAME}@{chat} (re #{to}): {text}"))
            .await?;
        Ok(id)
    }

    async fn send_typing(&self, chat: ChatId) -> Result<()> {
        tracing::trace!(chat, "Typing");
        Ok(())
    }
}
