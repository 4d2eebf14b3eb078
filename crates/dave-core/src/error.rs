//! Error types for the Crazy Dave bot.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire bot.
///
/// Prediction and polling failures (`Transport`, `BackendUnavailable`) are
/// surfaced to the immediate caller and never retried inside the core.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum DaveError {
    /// Network failure, non-2xx status or non-JSON body from a backend
    #[error("Transport error at {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The backend answered, but not with the payload shape we expect
    #[error("Backend unavailable ({backend}): {message}")]
    BackendUnavailable { backend: String, message: String },

    /// The prediction context cannot be framed (e.g. empty sequence)
    #[error("Invalid context: {0}")]
    InvalidContext(String),

    /// The chat transport refused or failed to deliver a message
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DaveError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Transport error
    pub fn transport(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a BackendUnavailable error
    pub fn backend_unavailable(backend: impl ToString, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend: backend.to_string(),
            message: message.into(),
        }
    }

    /// Creates an InvalidContext error
    pub fn invalid_context(message: impl Into<String>) -> Self {
        Self::InvalidContext(message.into())
    }

    /// Creates a Delivery error
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a Transport error
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Check if this is a BackendUnavailable error
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    /// Check if this is a config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true for every failure that means "the generation did not happen".
    ///
    /// The engagement path logs these as a skipped turn and anything else
    /// as an error; both end the turn without a reply.
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::BackendUnavailable { .. } | Self::InvalidContext(_)
        )
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for DaveError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for DaveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for DaveError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from anyhow::Error (used at the binary boundary)
impl From<anyhow::Error> for DaveError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, DaveError>`.
pub type Result<T> = std::result::Result<T, DaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_failures() {
        assert!(DaveError::transport("http://x/infer", "refused").is_generation_failure());
        assert!(DaveError::backend_unavailable("Legacy", "no response").is_generation_failure());
        assert!(!DaveError::config("bad").is_generation_failure());
    }

    #[test]
    fn test_display_includes_endpoint() {
        let err = DaveError::transport("http://legacy/infer", "status 502");
        assert_eq!(
            err.to_string(),
            "Transport error at http://legacy/infer: status 502"
        );
    }

    #[test]
    fn test_io_conversion() {
        let err: DaveError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, DaveError::Io { .. }));
    }
}
