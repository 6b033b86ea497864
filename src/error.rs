//! Error types for PocketLLM.
//!
//! A single [`PortalError`] enum covers every failure the library can
//! report. HTTP handlers convert it into a status code and a JSON body via
//! the `IntoResponse` impl in [`crate::api::server`].

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Invalid or unloadable configuration (including a non-positive cache
    /// capacity).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or unrecognised credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to perform the action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist (or belongs to someone else).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request was well-formed JSON but semantically invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The inference backend failed to produce a response.
    #[error("Inference error: {0}")]
    Inference(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PortalError>;
