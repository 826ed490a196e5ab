//! Error types for the crossport core library
//!
//! This module defines the error handling system for crossport, using
//! thiserror for ergonomic error definitions and anyhow for flexible error
//! sources. Per-field resolution misses are never errors: they fold into the
//! kind-specific empty/zero sentinel at the call site. The variants here
//! cover boundary failures only.

use thiserror::Error;

/// Main error type for crossport operations
#[derive(Error, Debug)]
pub enum Error {
    /// Remote natural-key lookup failures (transport or protocol level)
    #[error("Remote lookup error: {message}")]
    Remote {
        message: String,
        status_code: Option<u16>,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// HTTP client construction errors
    #[error("HTTP client error: {message}")]
    HttpClient {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}
