//! File-backed binding persistence.
//!
//! The bound chat id is stored as plain decimal text in `{data_dir}/chat_group`.

use async_trait::async_trait;
use dave_core::Result;
use dave_core::conversation::ChatId;
use dave_core::transport::BindingStore;
use std::path::{Path, PathBuf};

pub const BINDING_FILE_NAME: &str = "chat_group";

/// Stores the bound conversation in a single text file.
#[derive(Debug, Clone)]
pub struct FileBindingStore {
    path: PathBuf,
}

impl FileBindingStore {
    /// Creates a store persisting to `{data_dir}/chat_group`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(BINDING_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BindingStore for FileBindingStore {
    async fn load(&self) -> Result<Option<ChatId>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match content.trim().parse::<ChatId>() {
            Ok(chat) => Ok(Some(chat)),
            Err(_) => {
                tracing::warn!(path = %self.path.display(), "Ignoring malformed binding file");
                Ok(None)
            }
        }
    }

    async fn save(&self, chat: ChatId) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, chat.to_string()).await?;
        tracing::debug!(path = %self.path.display(), chat, "Binding persisted");
        Ok(())
    }
}
