//! HttpBackendGateway - reqwest implementation of `BackendGateway`.

use async_trait::async_trait;
use dave_core::backend::BackendGateway;
use dave_core::{DaveError, Result};
use reqwest::Client;
use std::time::Duration;
use tokio::sync::RwLock;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway that issues GET requests with query parameters.
///
/// Holds one pooled `Client` until `close` drops it.
pub struct HttpBackendGateway {
    client: RwLock<Option<Client>>,
    timeout: Duration,
}

impl HttpBackendGateway {
    /// Creates a gateway with the default 30 second request timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates a gateway with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: RwLock::new(Some(Client::new())),
            timeout,
        }
    }

    async fn client(&self, url: &str) -> Result<Client> {
        // Client is reference counted; cloning shares the pool.
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| DaveError::transport(url, "gateway closed"))
    }
}

impl Default for HttpBackendGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendGateway for HttpBackendGateway {
    async fn call(&self, url: &str, query: &[(&str, String)]) -> Result<serde_json::Value> {
        let client = self.client(url).await?;

        tracing::debug!(url, params = query.len(), "Calling backend");

        let response = client
            .get(url)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| DaveError::transport(url, format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(DaveError::transport(
                url,
                format!("backend returned {status}: {body_text}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|err| DaveError::transport(url, format!("failed to read body: {err}")))?;

        serde_json::from_str(&body)
            .map_err(|err| DaveError::transport(url, format!("body is not JSON: {err}")))
    }

    async fn close(&self) {
        if self.client.write().await.take().is_some() {
            tracing::info!("Backend gateway closed");
        }
    }
}
