//! Configuration service implementation.
//!
//! Loads `DaveConfig` from a TOML file (default
//! `~/.config/crazy-dave/config.toml`) and applies environment overrides.

use dave_core::config::DaveConfig;
use dave_core::{DaveError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Base URL of the legacy backend.
pub const ENV_LEGACY_URL: &str = "LSTM_URL";
/// Base URL of the modern backend.
pub const ENV_MODERN_URL: &str = "S2S_URL";
pub const ENV_DATA_DIR: &str = "DAVE_DATA_DIR";
pub const ENV_AMBIENT_PROBABILITY: &str = "DAVE_AMBIENT_PROBABILITY";

/// Loads the bot configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: Option<PathBuf>,
}

impl ConfigService {
    /// Uses `path` if given, the default location otherwise.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path: path.or_else(default_config_path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reads the file (a missing file means all defaults), then applies
    /// overrides from the process environment.
    pub fn load(&self) -> Result<DaveConfig> {
        let env: HashMap<String, String> = std::env::vars().collect();
        self.load_with_env(&env)
    }

    /// Like `load`, with an explicit environment.
    pub fn load_with_env(&self, env: &HashMap<String, String>) -> Result<DaveConfig> {
        let mut config = match &self.path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                tracing::info!(path = %path.display(), "Loaded configuration");
                toml::from_str(&content)?
            }
            Some(path) => {
                tracing::info!(path = %path.display(), "No configuration file; using defaults");
                DaveConfig::default()
            }
            None => DaveConfig::default(),
        };

        apply_overrides(&mut config, env)?;
        Ok(config)
    }
}

/// Returns ~/.config/crazy-dave/config.toml
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("crazy-dave").join("config.toml"))
}

/// Applies environment overrides on top of a loaded configuration.
pub fn apply_overrides(config: &mut DaveConfig, env: &HashMap<String, String>) -> Result<()> {
    if let Some(url) = env.get(ENV_LEGACY_URL) {
        config.backends.legacy_url = url.clone();
    }
    if let Some(url) = env.get(ENV_MODERN_URL) {
        config.backends.modern_url = url.clone();
    }
    if let Some(dir) = env.get(ENV_DATA_DIR) {
        let dir = PathBuf::from(dir);
        config.storage.history_dir = dir.join("history");
        config.storage.data_dir = dir;
    }
    if let Some(raw) = env.get(ENV_AMBIENT_PROBABILITY) {
        let probability: f64 = raw.parse().map_err(|_| {
            DaveError::config(format!("{ENV_AMBIENT_PROBABILITY} is not a number: {raw}"))
        })?;
        config.engagement.ambient_probability = probability;
    }
    validate(config)
}

fn validate(config: &DaveConfig) -> Result<()> {
    let engagement = &config.engagement;
    for (name, value) in [
        ("ambient_probability", engagement.ambient_probability),
        ("thread_pair_probability", engagement.thread_pair_probability),
        ("window_probability", engagement.window_probability),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(DaveError::config(format!(
                "engagement.{name} must be within [0, 1], got {value}"
            )));
        }
    }
    if config.provenance.capacity == 0 {
        return Err(DaveError::config("provenance.capacity must be at least 1"));
    }
    if config.engagement.window_size == 0 {
        return Err(DaveError::config("engagement.window_size must be at least 1"));
    }
    if config.schedule.update_interval_secs == 0 || config.schedule.upload_interval_secs == 0 {
        return Err(DaveError::config("schedule intervals must be at least 1 second"));
    }
    Ok(())
}
