use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct DaveConfig {
    pub backends: BackendConfig,
    pub engagement: EngagementConfig,
    pub provenance: ProvenanceConfig,
    pub schedule: ScheduleConfig,
    pub storage: StorageConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the legacy backend (`LSTM_URL`).
    pub legacy_url: String,
    /// Base URL of the modern backend (`S2S_URL`).
    pub modern_url: String,
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            legacy_url: "http://127.0.0.1:8001/".to_string(),
            modern_url: "http://127.0.0.1:8002/".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngagementConfig {
    /// Chance of replying to a message nobody addressed to the bot.
    pub ambient_probability: f64,
    /// Chance of feeding (parent, reply) instead of just the reply.
    pub thread_pair_probability: f64,
    /// Chance of feeding the history window instead of the last message.
    pub window_probability: f64,
    pub window_size: usize,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            ambient_probability: 0.1,
            thread_pair_probability: 0.5,
            window_probability: 0.5,
            window_size: 5,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProvenanceConfig {
    pub capacity: usize,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self { capacity: 128 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub update_interval_secs: u64,
    pub upload_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 600,
            upload_interval_secs: 600,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Where the bound conversation id is persisted.
    pub data_dir: PathBuf,
    /// Where drained history snapshots are written.
    pub history_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/data"),
            history_dir: PathBuf::from("/data/history"),
        }
    }
}
