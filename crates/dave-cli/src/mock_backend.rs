//! Local stand-in for a generation backend.
//!
//! Serves `/infer` (a fixed response), `/update` (model swap check) and
//! `/inc_version` (stages the next model version) so the bot can be run
//! without real backends.

use anyhow::Result;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

pub const DEFAULT_RESPONSE: &str = "阿巴阿巴";

#[derive(Debug)]
struct Versions {
    current: u64,
    next: u64,
}

#[derive(Clone)]
struct MockState {
    response: Arc<String>,
    versions: Arc<Mutex<Versions>>,
}

#[derive(Debug, Deserialize)]
struct InferParams {
    sentence: String,
}

/// Routes of one mock backend answering `response` to every inference.
pub fn router(response: impl Into<String>) -> Router {
    let state = MockState {
        response: Arc::new(response.into()),
        versions: Arc::new(Mutex::new(Versions { current: 1, next: 1 })),
    };

    Router::new()
        .route("/infer", get(infer))
        .route("/update", get(update))
        .route("/inc_version", get(inc_version))
        .with_state(state)
}

async fn infer(State(state): State<MockState>, Query(params): Query<InferParams>) -> Json<Value> {
    tracing::debug!(sentence = %params.sentence, "Mock inference");
    Json(json!({ "sentence": params.sentence, "response": state.response.as_str() }))
}

async fn update(State(state): State<MockState>) -> Json<Value> {
    let mut versions = state.versions.lock().await;
    if versions.current == versions.next {
        return Json(json!({ "updated": false, "version": versions.current }));
    }
    let old = versions.current;
    versions.current = versions.next;
    Json(json!({ "updated": true, "version": versions.current, "old": old }))
}

async fn inc_version(State(state): State<MockState>) -> Json<Value> {
    let mut versions = state.versions.lock().await;
    versions.next += 1;
    Json(json!({ "current": versions.current, "next": versions.next }))
}

/// Serves the mock backend on `127.0.0.1:port` until the process ends.
pub async fn serve(port: u16, response: String) -> Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "Mock backend listening");
    axum::serve(listener, router(response)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dave_core::backend::BackendGateway;
    use dave_core::generation::{Backend, VersionTransition};
    use dave_interaction::{HttpBackendGateway, Predictor};

    async fn spawn_backend(response: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(response);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn test_predict_over_http() {
        let legacy = spawn_backend(";legacy;line;").await;
        let modern = spawn_backend("modernEOSlineEOS").await;
        let predictor = Predictor::new(Arc::new(HttpBackendGateway::new()), &legacy, &modern);

        let single = predictor.predict("hello", false).await.unwrap();
        assert_eq!(single.backend, Backend::Modern);
        assert_eq!(single.rendered_text, "modern line");
        assert_eq!(single.raw_response["sentence"], "hello");

        let pair = predictor
            .predict(vec!["hi".to_string(), "there".to_string()], false)
            .await
            .unwrap();
        assert_eq!(pair.backend, Backend::Legacy);
        assert_eq!(pair.rendered_text, "legacy line");
        assert_eq!(pair.raw_response["sentence"], "hi;there");
    }

    #[tokio::test]
    async fn test_version_bump_is_reported_once() {
        let legacy = spawn_backend(DEFAULT_RESPONSE).await;
        let modern = spawn_backend(DEFAULT_RESPONSE).await;
        let gateway = Arc::new(HttpBackendGateway::new());
        let predictor = Predictor::new(gateway.clone(), &legacy, &modern);

        let (l, m) = predictor.update_models().await.unwrap();
        assert_eq!(l, VersionTransition::unchanged("1"));
        assert_eq!(m, VersionTransition::unchanged("1"));

        gateway
            .call(&format!("{legacy}inc_version"), &[])
            .await
            .unwrap();

        let (l, m) = predictor.update_models().await.unwrap();
        assert_eq!(l, VersionTransition::upgraded("1", "2"));
        assert_eq!(m, VersionTransition::unchanged("1"));

        let (l, _) = predictor.update_models().await.unwrap();
        assert_eq!(l, VersionTransition::unchanged("2"));
    }

    #[tokio::test]
    async fn test_infer_without_sentence_is_a_transport_error() {
        let base = spawn_backend(DEFAULT_RESPONSE).await;
        let err = HttpBackendGateway::new()
            .call(&format!("{base}infer"), &[])
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }
}
