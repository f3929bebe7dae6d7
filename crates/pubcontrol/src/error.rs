//! Error types for publish operations.

use thiserror::Error;

/// PubControl error type.
#[derive(Error, Debug)]
pub enum PubControlError {
    /// Malformed item or configuration (e.g. two formats with the same name).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network or transport-level HTTP error from reqwest.
    ///
    /// Includes connection failures, timeouts, and TLS errors.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("failed to publish: HTTP {status}: {body}")]
    Publish {
        /// The HTTP status code returned by the endpoint.
        status: u16,
        /// The response body, as text.
        body: String,
    },

    /// The client or orchestrator has already been shut down.
    #[error("publisher is closed")]
    Closed,

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Async publishing was attempted outside a tokio runtime.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result type alias using PubControlError.
pub type PubControlResult<T> = Result<T, PubControlError>;
