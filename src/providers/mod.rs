//! Providers module - LLM transport and the resilience pipeline
//!
//! This module defines the `LLMProvider` trait and common types for talking
//! to an LLM backend, the Anthropic implementation, and the retry/backoff
//! pipeline every remote call goes through.
//!
//! # Example
//!
//! ```rust,ignore
//! use loopclaw::providers::{ChatOptions, ClaudeProvider, LLMProvider};
//! use loopclaw::session::Message;
//!
//! async fn example() {
//!     let provider = ClaudeProvider::new("your-api-key");
//!     let messages = vec![Message::user("Hello!")];
//!     let options = ChatOptions::new().with_max_tokens(1000);
//!
//!     let response = provider.chat(messages, vec![], None, options).await.unwrap();
//!     println!("Response: {}", response.message.text());
//! }
//! ```

pub mod claude;
pub mod retry;
mod types;

use crate::error::ProviderError;

pub use claude::ClaudeProvider;
pub use retry::{execute_with_retry, RetryEvent, RetryPolicy, RetryReason};
pub use types::{
    ChatOptions, LLMProvider, LLMResponse, StopReason, StreamEvent, ToolDefinition, Usage,
};

/// Parse an HTTP status code and response body into a structured [`ProviderError`].
///
/// This centralizes the mapping from HTTP status codes to error classifications
/// so the transport and the web tools produce consistent typed errors.
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth(body.to_string()),
        402 => ProviderError::Billing(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        408 => ProviderError::Timeout(body.to_string()),
        429 => ProviderError::RateLimit(body.to_string()),
        400 | 413 | 422 => ProviderError::InvalidRequest(body.to_string()),
        503 | 529 => ProviderError::Overloaded(body.to_string()),
        500..=599 => ProviderError::ServerError(body.to_string()),
        _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_error_401() {
        let err = parse_provider_error(401, "invalid api key");
        assert!(matches!(err, ProviderError::Auth(_)));
        assert_eq!(err.status_code(), Some(401));
    }

    #[test]
    fn test_parse_provider_error_402() {
        let err = parse_provider_error(402, "payment required");
        assert!(matches!(err, ProviderError::Billing(_)));
    }

    #[test]
    fn test_parse_provider_error_429_is_retryable() {
        let err = parse_provider_error(429, "rate limited");
        assert!(matches!(err, ProviderError::RateLimit(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_provider_error_400() {
        let err = parse_provider_error(400, "bad json");
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_provider_error_5xx_not_retryable() {
        let err = parse_provider_error(500, "internal server error");
        assert!(matches!(err, ProviderError::ServerError(_)));
        assert!(!err.is_retryable());

        let err = parse_provider_error(529, "overloaded");
        assert!(matches!(err, ProviderError::Overloaded(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_provider_error_unknown() {
        let err = parse_provider_error(418, "i'm a teapot");
        assert!(matches!(err, ProviderError::Unknown(_)));
        assert!(err.to_string().contains("HTTP 418"));
    }
}
