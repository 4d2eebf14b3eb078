//! Conversation message types.
//!
//! `IncomingMessage` is what the chat transport hands us; `HistoryMessage` is
//! the trimmed, tagged record the history log keeps and drains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport-assigned message identifier, unique per conversation.
pub type MessageId = i64;

/// Transport-assigned conversation identifier.
pub type ChatId = i64;

/// The author of an incoming message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl Sender {
    /// "First Last", or just the first name when there is no last name.
    pub fn display_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// The message an incoming message replies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepliedMessage {
    pub id: MessageId,
    pub sender_id: i64,
    pub text: String,
}

/// A message observed on the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    #[serde(default)]
    pub reply_to: Option<RepliedMessage>,
}

impl IncomingMessage {
    /// True when this message replies to something authored by `user_id`.
    pub fn replies_to_user(&self, user_id: i64) -> bool {
        self.reply_to
            .as_ref()
            .is_some_and(|parent| parent.sender_id == user_id)
    }
}

/// Who the bot is on the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub user_id: i64,
    pub username: String,
}

impl BotIdentity {
    pub fn new(user_id: i64, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
        }
    }

    /// The token that explicitly addresses the bot, e.g. `@crazy_dave`.
    pub fn mention_token(&self) -> String {
        format!("@{}", self.username)
    }
}

/// Heuristic tags attached to each logged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTags {
    pub contains_rtl_script: bool,
    pub source_channel: String,
}

/// One entry of the conversation history.
///
/// `text` is always trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub sender_display_name: String,
    pub sender_id: i64,
    pub timestamp: i64,
    pub text: String,
    pub tags: MessageTags,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(last_name: Option<&str>) -> Sender {
        Sender {
            id: 7,
            first_name: "Ada".to_string(),
            last_name: last_name.map(str::to_string),
            username: None,
        }
    }

    #[test]
    fn test_display_name() {
        assert_eq!(sender(Some("Lovelace")).display_name(), "Ada Lovelace");
        assert_eq!(sender(None).display_name(), "Ada");
        assert_eq!(sender(Some("")).display_name(), "Ada");
    }

    #[test]
    fn test_mention_token() {
        assert_eq!(BotIdentity::new(1, "crazy_dave").mention_token(), "@crazy_dave");
    }

    #[test]
    fn test_replies_to_user() {
        let message = IncomingMessage {
            id: 10,
            chat_id: 1,
            sender: sender(None),
            timestamp: Utc::now(),
            text: "hi".to_string(),
            reply_to: Some(RepliedMessage {
                id: 9,
                sender_id: 42,
                text: "hello".to_string(),
            }),
        };
        assert!(message.replies_to_user(42));
        assert!(!message.replies_to_user(7));
    }
}
