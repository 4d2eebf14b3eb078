//! Which conversation the bot listens to, and who the bot is.

use dave_core::Result;
use dave_core::conversation::{BotIdentity, ChatId};
use dave_core::transport::BindingStore;
use rand::RngCore;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-scoped binding state.
///
/// Holds the bot identity, the bound conversation and the one-shot key a
/// chat must present (`/bind_group <key>`) to become the bound conversation.
/// The key rotates after every successful bind.
pub struct ConversationBinding {
    identity: BotIdentity,
    chat: RwLock<Option<ChatId>>,
    key: RwLock<String>,
    store: Arc<dyn BindingStore>,
}

impl ConversationBinding {
    /// Creates an unbound binding with a fresh key.
    pub fn new(identity: BotIdentity, store: Arc<dyn BindingStore>) -> Self {
        Self {
            identity,
            chat: RwLock::new(None),
            key: RwLock::new(generate_key()),
            store,
        }
    }

    pub fn identity(&self) -> &BotIdentity {
        &self.identity
    }

    /// Loads the persisted conversation, if any, and binds to it.
    pub async fn restore(&self) -> Result<Option<ChatId>> {
        let restored = self.store.load().await?;
        if let Some(chat) = restored {
            *self.chat.write().await = Some(chat);
            tracing::info!(chat, "Restored bound conversation");
        }
        Ok(restored)
    }

    pub async fn bound_chat(&self) -> Option<ChatId> {
        *self.chat.read().await
    }

    pub async fn is_bound_to(&self, chat: ChatId) -> bool {
        self.bound_chat().await == Some(chat)
    }

    /// The key currently accepted by `try_bind`.
    pub async fn binding_key(&self) -> String {
        self.key.read().await.clone()
    }

    /// Binds to `chat` when `token` matches the current key.
    ///
    /// A matching token always rotates the key, even if persisting the
    /// binding fails.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: bound and persisted
    /// - `Ok(false)`: token did not match; nothing changed
    /// - `Err(_)`: bound in memory, but persisting failed
    pub async fn try_bind(&self, chat: ChatId, token: &str) -> Result<bool> {
        {
            let mut key = self.key.write().await;
            if *key != token {
                return Ok(false);
            }
            *key = generate_key();
            tracing::warn!(key = %key.as_str(), "Binding key changed");
        }

        *self.chat.write().await = Some(chat);
        self.store.save(chat).await?;
        tracing::info!(chat, "Bound to conversation");
        Ok(true)
    }
}

/// 16 random bytes, hex encoded.
fn generate_key() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dave_core::DaveError;
    use std::sync::Mutex;

    // In-memory BindingStore for testing
    struct MockBindingStore {
        saved: Mutex<Option<ChatId>>,
        fail_saves: bool,
    }

    impl MockBindingStore {
        fn new(saved: Option<ChatId>) -> Self {
            Self {
                saved: Mutex::new(saved),
                fail_saves: false,
            }
        }
    }

    #[async_trait]
    impl BindingStore for MockBindingStore {
        async fn load(&self) -> Result<Option<ChatId>> {
            Ok(*self.saved.lock().unwrap())
        }

        async fn save(&self, chat: ChatId) -> Result<()> {
            if self.fail_saves {
                return Err(DaveError::io("disk full"));
            }
            *self.saved.lock().unwrap() = Some(chat);
            Ok(())
        }
    }

    fn binding(store: Arc<MockBindingStore>) -> ConversationBinding {
        ConversationBinding::new(BotIdentity::new(1, "crazy_dave"), store)
    }

    #[test]
    fn test_generated_key_shape() {
        let key = generate_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_key());
    }

    #[tokio::test]
    async fn test_bind_with_correct_key_rotates_and_persists() {
        let store = Arc::new(MockBindingStore::new(None));
        let binding = binding(store.clone());
        let key = binding.binding_key().await;

        assert!(binding.try_bind(-500, &key).await.unwrap());
        assert!(binding.is_bound_to(-500).await);
        assert_eq!(*store.saved.lock().unwrap(), Some(-500));
        assert_ne!(binding.binding_key().await, key);

        // The old key is single-use
        assert!(!binding.try_bind(-600, &key).await.unwrap());
        assert!(binding.is_bound_to(-500).await);
    }

    #[tokio::test]
    async fn test_bind_with_wrong_key_changes_nothing() {
        let binding = binding(Arc::new(MockBindingStore::new(None)));
        let key = binding.binding_key().await;

        assert!(!binding.try_bind(-500, "nope").await.unwrap());
        assert_eq!(binding.bound_chat().await, None);
        assert_eq!(binding.binding_key().await, key);
    }

    #[tokio::test]
    async fn test_failed_persist_still_rotates() {
        let store = Arc::new(MockBindingStore {
            saved: Mutex::new(None),
            fail_saves: true,
        });
        let binding = binding(store);
        let key = binding.binding_key().await;

        assert!(binding.try_bind(-500, &key).await.is_err());
        assert_ne!(binding.binding_key().await, key);
        assert!(binding.is_bound_to(-500).await);
    }

    #[tokio::test]
    async fn test_restore() {
        let binding = binding(Arc::new(MockBindingStore::new(Some(-42))));
        assert_eq!(binding.bound_chat().await, None);
        assert_eq!(binding.restore().await.unwrap(), Some(-42));
        assert!(binding.is_bound_to(-42).await);
    }
}
