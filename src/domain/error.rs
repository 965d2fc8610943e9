//! Domain-level error types for collab-archiver.
//!
//! All errors are typed with `thiserror` and carry enough context to be shown
//! to the operator as a one-line diagnostic.

use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration or environment error. Fatal at startup.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Transport-level HTTP failure (connect, timeout, non-2xx status).
    #[error("HTTP error: {message}")]
    Http {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The remote service answered but reported an error in its payload.
    #[error("{service} API error: {message}")]
    Api { service: String, message: String },

    /// Invalid or unexpected data returned by a service.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create an HTTP error from a reqwest error.
    pub fn http(err: reqwest::Error) -> Self {
        Self::Http {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an API error for a named service.
    pub fn api(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
