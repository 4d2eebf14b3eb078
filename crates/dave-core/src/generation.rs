//! Generation request/result types.
//!
//! These are the units the Predictor produces and the ProvenanceCache stores.
//! Everything here is immutable once built and JSON round-trippable, since a
//! `GenerationResult` is what `/blame` dumps back into the chat.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default sampling temperature for both backends.
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
/// Default beam width for the legacy backend.
pub const DEFAULT_BEAM_WIDTH: u32 = 20;
/// Default beam top-k for the legacy backend.
pub const DEFAULT_BEAM_TOP_K: u32 = 5;
/// Default decoding mode for the legacy backend.
pub const DEFAULT_DECODING_MODE: &str = "beam";
/// Default sample count for the modern backend.
pub const DEFAULT_SAMPLE_COUNT: u32 = 1;

/// The two interchangeable text-generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backend {
    Legacy,
    Modern,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Legacy => "Legacy",
            Backend::Modern => "Modern",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The utterances a prediction is conditioned on.
///
/// Serialized untagged: a single utterance is a JSON string, a sequence a
/// JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Context {
    Single(String),
    Sequence(Vec<String>),
}

impl Context {
    /// Number of utterances carried by this context.
    pub fn len(&self) -> usize {
        match self {
            Context::Single(_) => 1,
            Context::Sequence(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The utterances in order.
    pub fn utterances(&self) -> Vec<&str> {
        match self {
            Context::Single(text) => vec![text.as_str()],
            Context::Sequence(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for Context {
    fn from(text: &str) -> Self {
        Context::Single(text.to_string())
    }
}

impl From<String> for Context {
    fn from(text: String) -> Self {
        Context::Single(text)
    }
}

impl From<Vec<String>> for Context {
    fn from(items: Vec<String>) -> Self {
        Context::Sequence(items)
    }
}

/// Chooses the backend for a context.
///
/// Legacy when forced, or when the context carries more than one utterance;
/// Modern otherwise.
pub fn select_backend(context: &Context, force_legacy: bool) -> Backend {
    let multi_utterance = matches!(context, Context::Sequence(items) if items.len() > 1);
    if force_legacy || multi_utterance {
        Backend::Legacy
    } else {
        Backend::Modern
    }
}

/// Backend-specific tuning knobs, named after their wire fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerationParameters {
    Legacy {
        #[serde(rename = "temp")]
        temperature: f32,
        #[serde(rename = "b")]
        beam_width: u32,
        #[serde(rename = "b_topk")]
        beam_top_k: u32,
        mode: String,
    },
    Modern {
        #[serde(rename = "temp")]
        temperature: f32,
        #[serde(rename = "n")]
        samples: u32,
    },
}

impl GenerationParameters {
    /// Default parameters for the given backend.
    pub fn defaults_for(backend: Backend) -> Self {
        match backend {
            Backend::Legacy => GenerationParameters::Legacy {
                temperature: DEFAULT_TEMPERATURE,
                beam_width: DEFAULT_BEAM_WIDTH,
                beam_top_k: DEFAULT_BEAM_TOP_K,
                mode: DEFAULT_DECODING_MODE.to_string(),
            },
            Backend::Modern => GenerationParameters::Modern {
                temperature: DEFAULT_TEMPERATURE,
                samples: DEFAULT_SAMPLE_COUNT,
            },
        }
    }

    /// Query pairs in wire order, excluding the framed sentence.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            GenerationParameters::Legacy {
                temperature,
                beam_width,
                beam_top_k,
                mode,
            } => vec![
                ("temp", temperature.to_string()),
                ("b", beam_width.to_string()),
                ("b_topk", beam_top_k.to_string()),
                ("mode", mode.clone()),
            ],
            GenerationParameters::Modern {
                temperature,
                samples,
            } => vec![
                ("temp", temperature.to_string()),
                ("n", samples.to_string()),
            ],
        }
    }
}

/// A fully resolved request: what was asked, of which backend, with which knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub context: Context,
    pub backend: Backend,
    pub parameters: GenerationParameters,
}

impl GenerationRequest {
    /// Builds a request for an explicitly chosen backend with default parameters.
    pub fn new(context: Context, backend: Backend) -> Self {
        Self {
            context,
            backend,
            parameters: GenerationParameters::defaults_for(backend),
        }
    }
}

/// One completed generation. This is the unit of provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub rendered_text: String,
    pub raw_response: serde_json::Value,
    pub original_request: GenerationRequest,
    pub backend: Backend,
}

impl GenerationResult {
    /// Serializes the result for the provenance query surface.
    pub fn dump(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Outcome of polling one backend for a model swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTransition {
    pub updated: bool,
    pub current_version: String,
    /// Present iff `updated`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
}

impl VersionTransition {
    pub fn unchanged(current_version: impl Into<String>) -> Self {
        Self {
            updated: false,
            current_version: current_version.into(),
            previous_version: None,
        }
    }

    pub fn upgraded(previous_version: impl Into<String>, current_version: impl Into<String>) -> Self {
        Self {
            updated: true,
            current_version: current_version.into(),
            previous_version: Some(previous_version.into()),
        }
    }
}
