//! Error types for docchat.

use thiserror::Error;

/// Library-level error type for docchat operations.
#[derive(Error, Debug)]
pub enum DocChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Error connecting to the warehouse: {0}")]
    Connection(String),

    #[error("Query failed ({code}): {message}")]
    Query { code: String, message: String },

    #[error("Unexpected warehouse response: {0}")]
    Protocol(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Completion failed: {0}")]
    Completion(String),

    #[error("Timed out after {seconds}s waiting for {operation}")]
    Timeout { operation: String, seconds: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for docchat operations.
pub type Result<T> = std::result::Result<T, DocChatError>;
