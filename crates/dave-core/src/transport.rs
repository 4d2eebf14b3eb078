//! Collaborator traits around the core: chat delivery, binding persistence
//! and history draining.

use crate::conversation::{ChatId, HistoryMessage, MessageId};
use crate::error::Result;
use async_trait::async_trait;

/// The chat transport the bot speaks through.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Posts `text` into `chat` and returns the id the transport assigned.
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<MessageId>;

    /// Posts `text` into `chat` as a reply to message `to`.
    async fn reply(&self, chat: ChatId, to: MessageId, text: &str) -> Result<MessageId>;

    /// Shows a typing indicator in `chat`. Best effort.
    async fn send_typing(&self, chat: ChatId) -> Result<()>;
}

/// Persists which conversation the bot is bound to.
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// Loads the persisted chat id.
    ///
    /// Returns `Ok(None)` when nothing was persisted or the stored value is
    /// not a valid id.
    async fn load(&self) -> Result<Option<ChatId>>;

    /// Persists `chat` as the bound conversation.
    async fn save(&self, chat: ChatId) -> Result<()>;
}

/// Receives drained history snapshots.
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Stores the full ordered history.
    async fn upload(&self, history: &[HistoryMessage]) -> Result<()>;
}
