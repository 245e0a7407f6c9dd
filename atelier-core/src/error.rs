/// Structured error types for atelier-core.
///
/// Library consumers get `thiserror` enums they can match on. The CLI wraps
/// them in `anyhow` with context at its own boundary.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for configuration and file-level operations
#[derive(Error, Debug)]
pub enum AtelierError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Config file could not be parsed
    #[error("Invalid config file {path:?}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    /// Config file is missing
    #[error("Config not found at {path:?}\n\nRun: atelier config init")]
    ConfigNotFound { path: PathBuf },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

/// Result type alias for atelier-core operations
pub type Result<T> = std::result::Result<T, AtelierError>;

impl AtelierError {
    /// Create an invalid config error
    pub fn invalid_config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

/// Failure talking to the REST API.
///
/// Kept free of any HTTP client types so the core crate does not depend on
/// one; `atelier-client` maps its transport errors into these variants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Request never produced a response (DNS, connect, timeout)
    #[error("request failed: {0}")]
    Transport(String),

    /// Server answered with a non-success status
    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Id cannot be used as a URL path segment
    #[error("invalid id {0:?}")]
    InvalidId(String),
}

impl ApiError {
    /// Maximum number of bytes of an error body kept in the message
    pub const MAX_BODY_LEN: usize = 500;

    /// Create a status error, truncating long response bodies
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = if body.len() > Self::MAX_BODY_LEN {
            let mut cut = Self::MAX_BODY_LEN;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}...", &body[..cut])
        } else {
            body
        };
        Self::Status { status, message }
    }
}

/// Validation error raised before any network call is made
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Field exceeds maximum length
    #[error("{field} exceeds maximum length of {max} characters")]
    TooLong { field: &'static str, max: usize },
}
