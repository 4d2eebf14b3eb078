//! File-backed history sink.
//!
//! Every drain rewrites `{history_dir}/dataset_v2/{started_at}.json` with the
//! full ordered history, where `started_at` is the process start in Unix
//! seconds. Later drains supersede earlier ones.

use async_trait::async_trait;
use chrono::Utc;
use dave_core::Result;
use dave_core::conversation::HistoryMessage;
use dave_core::transport::HistorySink;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub const DATASET_DIR_NAME: &str = "dataset_v2";

/// Writes history snapshots as a JSON array.
#[derive(Debug)]
pub struct FileHistorySink {
    path: PathBuf,
    // One upload at a time
    write_lock: Mutex<()>,
}

impl FileHistorySink {
    /// Creates a sink whose file name is the current time.
    pub fn new(history_dir: impl AsRef<Path>) -> Self {
        Self::with_start_time(history_dir, Utc::now().timestamp())
    }

    /// Creates a sink for an explicit process start time.
    pub fn with_start_time(history_dir: impl AsRef<Path>, started_at: i64) -> Self {
        let path = history_dir
            .as_ref()
            .join(DATASET_DIR_NAME)
            .join(format!("{started_at}.json"));
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistorySink for FileHistorySink {
    async fn upload(&self, history: &[HistoryMessage]) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let json = serde_json::to_vec_pretty(history)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write to a sibling then rename so readers never see a partial file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::info!(
            path = %self.path.display(),
            entries = history.len(),
            "History uploaded"
        );
        Ok(())
    }
}
