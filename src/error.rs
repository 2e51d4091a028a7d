//! Error types for LoopClaw
//!
//! This module defines all error types used throughout the LoopClaw runtime.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured provider error classification.
///
/// Provides fine-grained categorization of LLM transport failures so the
/// retry pipeline can tell transient failures from fatal ones without
/// string matching.
#[derive(Debug)]
pub enum ProviderError {
    /// 401 — Invalid API key or authentication failure
    Auth(String),
    /// 429 — Rate limit or quota exceeded
    RateLimit(String),
    /// 402 — Payment required or billing issue
    Billing(String),
    /// 500/502/504 — Server-side errors
    ServerError(String),
    /// 400 — Bad request, invalid JSON, malformed parameters
    InvalidRequest(String),
    /// 404 — Model not found or endpoint not available
    ModelNotFound(String),
    /// Connection or read timeout
    Timeout(String),
    /// Connection-level failure with no HTTP status (DNS, refused, reset)
    Connection(String),
    /// 503 / `overloaded_error`
    Overloaded(String),
    /// Catch-all for unrecognized errors
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::Billing(msg) => write!(f, "Billing error: {}", msg),
            ProviderError::ServerError(msg) => write!(f, "Server error: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Connection(msg) => write!(f, "Connection error: {}", msg),
            ProviderError::Overloaded(msg) => write!(f, "Overloaded error: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
        }
    }
}

impl ProviderError {
    /// Returns `true` if this error is transient and the request should be retried.
    ///
    /// Retryable errors: RateLimit, Connection, Timeout. Everything else
    /// propagates on the first failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit(_) | ProviderError::Connection(_) | ProviderError::Timeout(_)
        )
    }

    /// Returns the HTTP status code associated with this error, if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Auth(_) => Some(401),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::Billing(_) => Some(402),
            ProviderError::ServerError(_) => Some(500),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Overloaded(_) => Some(503),
            ProviderError::Timeout(_) | ProviderError::Connection(_) | ProviderError::Unknown(_) => {
                None
            }
        }
    }
}

impl From<ProviderError> for LoopError {
    fn from(err: ProviderError) -> Self {
        LoopError::ProviderTyped(err)
    }
}

/// Classify a `reqwest` transport error.
///
/// Requests that never produced a status code are connection failures;
/// elapsed client timeouts are timeouts. Both are retryable.
pub fn classify_transport_error(err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else if let Some(status) = err.status() {
        crate::providers::parse_provider_error(status.as_u16(), &err.to_string())
    } else if err.is_connect() || err.is_request() || err.is_body() {
        ProviderError::Connection(err.to_string())
    } else {
        ProviderError::Unknown(err.to_string())
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for LoopClaw operations.
#[derive(Error, Debug)]
pub enum LoopError {
    /// Configuration-related errors (invalid config, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Untyped provider errors (missing provider, malformed stream, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Structured provider error with classification for retry decisions.
    #[error("Provider error: {0}")]
    ProviderTyped(ProviderError),

    /// The model asked for a tool that is not registered.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool execution errors (invalid parameters, execution failures, etc.)
    #[error("Tool error: {0}")]
    Tool(String),

    /// Path outside the configured working directory.
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// The model hit the output token cap too many times in a row.
    #[error(
        "The model's response was cut off by the max_tokens limit ({max_tokens}) {attempts} times in a row. \
         Try a narrower request, or raise agent.max_tokens in the configuration."
    )]
    MaxOutputExceeded { max_tokens: u32, attempts: u32 },

    /// Summarization failed; callers fall back to leaving history untouched.
    #[error("Compaction error: {0}")]
    Compaction(String),

    /// Cooperative cancellation was requested.
    #[error("Operation cancelled")]
    Cancelled,

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LoopError {
    /// Whether this error is the distinguished cancellation condition.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoopError::Cancelled)
    }

    /// The structured provider classification, if any.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            LoopError::ProviderTyped(pe) => Some(pe),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for LoopError {
    fn from(err: reqwest::Error) -> Self {
        LoopError::ProviderTyped(classify_transport_error(&err))
    }
}

/// A specialized `Result` type for LoopClaw operations.
pub type Result<T> = std::result::Result<T, LoopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoopError::Config("missing API key".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing API key");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let loop_err: LoopError = io_err.into();
        assert!(matches!(loop_err, LoopError::Io(_)));
    }

    #[test]
    fn test_max_output_exceeded_names_cap() {
        let err = LoopError::MaxOutputExceeded {
            max_tokens: 8192,
            attempts: 3,
        };
        let text = err.to_string();
        assert!(text.contains("8192"));
        assert!(text.contains("3 times"));
    }

    #[test]
    fn test_cancelled_is_distinguished() {
        assert!(LoopError::Cancelled.is_cancelled());
        assert!(!LoopError::Tool("boom".into()).is_cancelled());
        assert!(!LoopError::ProviderTyped(ProviderError::Timeout("t".into())).is_cancelled());
    }

    #[test]
    fn test_provider_error_is_retryable() {
        assert!(ProviderError::RateLimit("429".into()).is_retryable());
        assert!(ProviderError::Connection("refused".into()).is_retryable());
        assert!(ProviderError::Timeout("timeout".into()).is_retryable());

        assert!(!ProviderError::Auth("401".into()).is_retryable());
        assert!(!ProviderError::Billing("402".into()).is_retryable());
        assert!(!ProviderError::InvalidRequest("400".into()).is_retryable());
        assert!(!ProviderError::ModelNotFound("404".into()).is_retryable());
        assert!(!ProviderError::ServerError("500".into()).is_retryable());
        assert!(!ProviderError::Overloaded("busy".into()).is_retryable());
        assert!(!ProviderError::Unknown("???".into()).is_retryable());
    }

    #[test]
    fn test_provider_error_status_code() {
        assert_eq!(ProviderError::RateLimit("x".into()).status_code(), Some(429));
        assert_eq!(ProviderError::Auth("x".into()).status_code(), Some(401));
        assert_eq!(ProviderError::Connection("x".into()).status_code(), None);
        assert_eq!(ProviderError::Timeout("x".into()).status_code(), None);
        assert_eq!(ProviderError::Overloaded("x".into()).status_code(), Some(503));
    }

    #[test]
    fn test_provider_typed_display() {
        let err = LoopError::ProviderTyped(ProviderError::Auth("invalid key".into()));
        assert_eq!(
            err.to_string(),
            "Provider error: Authentication error: invalid key"
        );
        assert!(err.provider_error().is_some());
    }
}
