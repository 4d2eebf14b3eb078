//! Predictor - dual-backend dispatch and model version polling.

use crate::http_gateway::HttpBackendGateway;
use crate::normalizer;
use dave_core::backend::BackendGateway;
use dave_core::config::BackendConfig;
use dave_core::generation::{
    Backend, Context, GenerationRequest, GenerationResult, VersionTransition, select_backend,
};
use dave_core::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const INFER_PATH: &str = "infer";
const UPDATE_PATH: &str = "update";

/// Routes predictions to the legacy or modern backend and polls both for
/// model upgrades.
///
/// Version polls are serialized by an instance-scoped lock so two overlapping
/// schedules cannot both observe (and report) the same transition. `predict`
/// never takes that lock.
pub struct Predictor {
    gateway: Arc<dyn BackendGateway>,
    legacy_url: String,
    modern_url: String,
    update_lock: Mutex<()>,
}

impl Predictor {
    /// Creates a predictor over an arbitrary gateway.
    ///
    /// # Arguments
    ///
    /// * `gateway` - Transport used for every backend call
    /// * `legacy_url` - Base URL of the legacy backend
    /// * `modern_url` - Base URL of the modern backend
    pub fn new(
        gateway: Arc<dyn BackendGateway>,
        legacy_url: impl Into<String>,
        modern_url: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            legacy_url: legacy_url.into(),
            modern_url: modern_url.into(),
            update_lock: Mutex::new(()),
        }
    }

    /// Creates a predictor backed by `HttpBackendGateway`.
    pub fn from_config(config: &BackendConfig) -> Self {
        let gateway = HttpBackendGateway::with_timeout(Duration::from_secs(
            config.request_timeout_secs,
        ));
        Self::new(Arc::new(gateway), &config.legacy_url, &config.modern_url)
    }

    fn endpoint(&self, backend: Backend, path: &str) -> String {
        let base = match backend {
            Backend::Legacy => &self.legacy_url,
            Backend::Modern => &self.modern_url,
        };
        format!("{}/{}", base.trim_end_matches('/'), path)
    }

    /// Generates a reply for `context`.
    ///
    /// Backend choice follows `select_backend`: Legacy when `force_legacy` is
    /// set or the context has more than one utterance, Modern otherwise.
    ///
    /// # Errors
    ///
    /// * `Transport` - the backend could not be reached or answered garbage
    /// * `BackendUnavailable` - the payload lacks a usable `response` field
    /// * `InvalidContext` - the context has no utterances
    pub async fn predict(
        &self,
        context: impl Into<Context>,
        force_legacy: bool,
    ) -> Result<GenerationResult> {
        let context = context.into();
        let backend = select_backend(&context, force_legacy);
        let request = GenerationRequest::new(context, backend);
        let query = normalizer::build_query(&request)?;
        let url = self.endpoint(backend, INFER_PATH);

        tracing::debug!(%backend, utterances = request.context.len(), "Predicting");

        let raw = self.gateway.call(&url, &query).await?;
        log::trace!("Raw {} response: {}", backend, raw);

        let rendered_text = normalizer::parse_response(backend, &raw)?;

        Ok(GenerationResult {
            rendered_text,
            raw_response: raw,
            original_request: request,
            backend,
        })
    }

    /// Polls both backends for a model swap.
    ///
    /// Both version calls are in flight together; the lock is held until
    /// both have completed and is released on every exit path.
    ///
    /// # Returns
    ///
    /// `(legacy, modern)` transitions.
    pub async fn update_models(&self) -> Result<(VersionTransition, VersionTransition)> {
        let _guard = self.update_lock.lock().await;

        let (legacy, modern) = tokio::join!(
            self.poll_version(Backend::Legacy),
            self.poll_version(Backend::Modern)
        );
        let (legacy, modern) = (legacy?, modern?);

        for (backend, transition) in [(Backend::Legacy, &legacy), (Backend::Modern, &modern)] {
            if transition.updated {
                tracing::info!(
                    %backend,
                    from = transition.previous_version.as_deref().unwrap_or(""),
                    to = %transition.current_version,
                    "Model updated"
                );
            } else {
                tracing::debug!(%backend, version = %transition.current_version, "Model unchanged");
            }
        }

        Ok((legacy, modern))
    }

    async fn poll_version(&self, backend: Backend) -> Result<VersionTransition> {
        let url = self.endpoint(backend, UPDATE_PATH);
        let raw = self.gateway.call(&url, &[]).await?;
        normalizer::parse_version(backend, &raw)
    }

    /// Releases the gateway's connection resource.
    pub async fn close(&self) {
        self.gateway.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dave_core::DaveError;
    use serde_json::{Value, json};
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    const LEGACY: &str = "http://legacy:8000";
    const MODERN: &str = "http://modern:8000/";

    #[derive(Debug, Clone)]
    struct CallRecord {
        url: String,
        query: Vec<(String, String)>,
        started: Instant,
        finished: Instant,
    }

    // Scripted gateway that records every call and its timing
    struct MockGateway {
        calls: StdMutex<Vec<CallRecord>>,
        update_delay: Duration,
        fail_updates: AtomicUsize,
        closed: AtomicUsize,
    }

    impl MockGateway {
        fn new() -> Self {
            Self::with_update_delay(Duration::ZERO)
        }

        fn with_update_delay(update_delay: Duration) -> Self {
            Self {
                calls: StdMutex::new(Vec::new()),
                update_delay,
                fail_updates: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> Vec<CallRecord> {
            self.calls.lock().unwrap().clone()
        }

        fn respond(url: &str) -> Value {
            if url.ends_with("/update") {
                if url.starts_with(LEGACY) {
                    json!({"updated": true, "version": 2, "old": 1})
                } else {
                    json!({"updated": false, "version": "s2s-7"})
                }
            } else if url.starts_with(LEGACY) {
                json!({"sentence": "a;b", "response": ";foo;bar;"})
            } else {
                json!({"sentence": "hello", "response": "fooEOSbarEOS"})
            }
        }
    }

    #[async_trait]
    impl BackendGateway for MockGateway {
        async fn call(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
            let started = Instant::now();
            if url.ends_with("/update") {
                tokio::time::sleep(self.update_delay).await;
                let remaining = self.fail_updates.load(Ordering::SeqCst);
                if remaining > 0 {
                    self.fail_updates.store(remaining - 1, Ordering::SeqCst);
                    return Err(DaveError::transport(url, "connection refused"));
                }
            }
            let finished = Instant::now();

            self.calls.lock().unwrap().push(CallRecord {
                url: url.to_string(),
                query: query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                started,
                finished,
            });
            Ok(Self::respond(url))
        }

        async fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn predictor(gateway: Arc<MockGateway>) -> Predictor {
        Predictor::new(gateway, LEGACY, MODERN)
    }

    #[tokio::test]
    async fn test_single_utterance_goes_to_modern() {
        let gateway = Arc::new(MockGateway::new());
        let result = predictor(gateway.clone()).predict("hello", false).await.unwrap();

        assert_eq!(result.backend, Backend::Modern);
        assert_eq!(result.rendered_text, "foo bar");

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "http://modern:8000/infer");
        assert_eq!(
            calls[0].query,
            vec![
                ("sentence".to_string(), "hello".to_string()),
                ("temp".to_string(), "1".to_string()),
                ("n".to_string(), "1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_sequence_goes_to_legacy() {
        let gateway = Arc::new(MockGateway::new());
        let context = Context::Sequence(vec!["a".into(), "b ".into()]);
        let result = predictor(gateway.clone()).predict(context, false).await.unwrap();

        assert_eq!(result.backend, Backend::Legacy);
        assert_eq!(result.rendered_text, "foo bar");
        assert_eq!(result.raw_response["response"], ";foo;bar;");

        let calls = gateway.calls();
        assert_eq!(calls[0].url, "http://legacy:8000/infer");
        assert_eq!(calls[0].query[0], ("sentence".to_string(), "a;b".to_string()));
        assert_eq!(calls[0].query[4], ("mode".to_string(), "beam".to_string()));
    }

    #[tokio::test]
    async fn test_force_legacy_for_single_utterance() {
        let gateway = Arc::new(MockGateway::new());
        let result = predictor(gateway).predict("hello", true).await.unwrap();
        assert_eq!(result.backend, Backend::Legacy);
        assert_eq!(result.original_request.backend, Backend::Legacy);
    }

    #[tokio::test]
    async fn test_update_models_reports_both_transitions() {
        let gateway = Arc::new(MockGateway::new());
        let (legacy, modern) = predictor(gateway.clone()).update_models().await.unwrap();

        assert_eq!(legacy, VersionTransition::upgraded("1", "2"));
        assert_eq!(modern, VersionTransition::unchanged("s2s-7"));
        assert_eq!(gateway.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_updates_never_interleave() {
        let gateway = Arc::new(MockGateway::with_update_delay(Duration::from_millis(30)));
        let predictor = predictor(gateway.clone());

        let (first, second) = tokio::join!(predictor.update_models(), predictor.update_models());
        first.unwrap();
        second.unwrap();

        let mut calls = gateway.calls();
        assert_eq!(calls.len(), 4);
        calls.sort_by_key(|call| call.started);

        let first_pair_end = calls[0].finished.max(calls[1].finished);
        let second_pair_start = calls[2].started.min(calls[3].started);
        assert!(
            first_pair_end <= second_pair_start,
            "second poll started before the first finished"
        );
    }

    #[tokio::test]
    async fn test_predict_not_blocked_by_update_lock() {
        let gateway = Arc::new(MockGateway::with_update_delay(Duration::from_millis(100)));
        let predictor = predictor(gateway);

        let update = predictor.update_models();
        let predict = async {
            let result = predictor.predict("hello", false).await.unwrap();
            (result, Instant::now())
        };
        let (update_result, (_, predicted_at)) = tokio::join!(update, predict);
        let updated_at = Instant::now();

        update_result.unwrap();
        assert!(predicted_at < updated_at);
        assert!(updated_at.duration_since(predicted_at) >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_failed_update_releases_lock() {
        let gateway = Arc::new(MockGateway::new());
        gateway.fail_updates.store(1, Ordering::SeqCst);
        let predictor = predictor(gateway);

        let err = predictor.update_models().await.unwrap_err();
        assert!(err.is_transport());

        let retried = tokio::time::timeout(Duration::from_secs(1), predictor.update_models())
            .await
            .expect("update lock was left held");
        assert!(retried.is_ok());
    }

    #[tokio::test]
    async fn test_close_reaches_gateway() {
        let gateway = Arc::new(MockGateway::new());
        predictor(gateway.clone()).close().await;
        assert_eq!(gateway.closed.load(Ordering::SeqCst), 1);
    }
}
