//! Error types for lexrag.

use thiserror::Error;

/// Result type alias using lexrag's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lexrag operations.
#[derive(Error, Debug)]
pub enum Error {
    /// PDF could not be read or parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Document contained no extractable text
    #[error("Empty document: {0}")]
    EmptyDocument(String),

    /// Vector index has not been loaded
    #[error("Vector index not loaded")]
    IndexNotReady,

    /// Embedding provider call failed
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// LLM completion failed or timed out
    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    /// Input rejected by the validator; carries violation categories only
    #[error("Input validation failed: {}", .violations.join(", "))]
    ValidationFailed {
        violations: Vec<String>,
        risk_score: f64,
    },

    /// Chat session was deleted and accepts no further operations
    #[error("Session terminated: {0}")]
    SessionTerminated(String),

    /// Chat session id is unknown
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Object store or index storage unreachable
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl Error {
    /// Short machine-readable kind for API responses and audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Parse(_) => "parse_error",
            Error::EmptyDocument(_) => "empty_document",
            Error::IndexNotReady => "index_not_ready",
            Error::EmbeddingUnavailable(_) => "embedding_unavailable",
            Error::LlmUnavailable(_) => "llm_unavailable",
            Error::ValidationFailed { .. } => "validation_failed",
            Error::SessionTerminated(_) => "session_terminated",
            Error::SessionNotFound(_) => "session_not_found",
            Error::StorageUnavailable(_) => "storage_unavailable",
            Error::Config(_) => "config_error",
            Error::InvalidInput(_) => "invalid_input",
            Error::Request(_) => "request_error",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_index_not_ready() {
        assert_eq!(Error::IndexNotReady.to_string(), "Vector index not loaded");
    }

    #[test]
    fn test_validation_failed_lists_categories() {
        let err = Error::ValidationFailed {
            violations: vec!["length".to_string(), "xss".to_string()],
            risk_score: 0.7,
        };
        assert_eq!(err.to_string(), "Input validation failed: length, xss");
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(Error::IndexNotReady.kind(), "index_not_ready");
        assert_eq!(
            Error::LlmUnavailable("timeout".into()).kind(),
            "llm_unavailable"
        );
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
