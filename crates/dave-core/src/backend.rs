//! Backend gateway trait.
//!
//! Defines the thin transport the Predictor uses to reach a generation
//! backend. Implementations live in `dave-interaction`.

use crate::error::Result;
use async_trait::async_trait;

/// Issues calls against a backend endpoint and returns its JSON body.
///
/// # Implementation Notes
///
/// Implementations must map network failures, non-2xx statuses and non-JSON
/// bodies to `DaveError::Transport`. They must not retry.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Calls `url` with the given query pairs.
    ///
    /// # Returns
    ///
    /// - `Ok(Value)`: the decoded JSON body
    /// - `Err(DaveError::Transport)`: the call did not produce a JSON body
    async fn call(&self, url: &str, query: &[(&str, String)]) -> Result<serde_json::Value>;

    /// Releases the held connection resource.
    ///
    /// Called once during shutdown; no calls are made afterwards.
    async fn close(&self) {}
}
