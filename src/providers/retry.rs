//! Retry pipeline - bounded exponential backoff for remote calls.
//!
//! Wraps any fallible async operation (an LLM request, a tool's HTTP call)
//! and transparently retries transient failures: HTTP 429 rate limits,
//! connection failures without a status code, and timeouts. Every other
//! error propagates on the first failure.
//!
//! Backoff is `base_delay * 2^attempt` with no jitter. Both the operation
//! and the backoff sleep race the caller's [`CancellationToken`], so a
//! cancelled run never waits out a delay.
//!
//! # Example
//!
//! ```rust,ignore
//! use loopclaw::providers::{execute_with_retry, RetryPolicy};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let response = execute_with_retry(&RetryPolicy::llm(), "chat", &cancel, || {
//!     provider.chat(messages.clone(), tools.clone(), None, options.clone())
//! })
//! .await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{LoopError, ProviderError, Result};

/// Callback invoked before each backoff sleep.
pub type RetryObserver = Arc<dyn Fn(&RetryEvent) + Send + Sync>;

/// Why an attempt is being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// HTTP 429
    RateLimited,
    /// No status code (DNS, refused, reset)
    ConnectionError,
    /// The request or read timed out
    Timeout,
    /// Any other retryable condition
    Other,
}

impl RetryReason {
    /// Classify an error for reporting.
    pub fn classify(err: &LoopError) -> Self {
        match err.provider_error() {
            Some(ProviderError::RateLimit(_)) => RetryReason::RateLimited,
            Some(ProviderError::Connection(_)) => RetryReason::ConnectionError,
            Some(ProviderError::Timeout(_)) => RetryReason::Timeout,
            _ => RetryReason::Other,
        }
    }
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryReason::RateLimited => write!(f, "rate limited"),
            RetryReason::ConnectionError => write!(f, "connection error"),
            RetryReason::Timeout => write!(f, "timeout"),
            RetryReason::Other => write!(f, "other"),
        }
    }
}

/// One scheduled retry.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryEvent {
    /// Retry number, starting at 1
    pub attempt: u32,
    /// Configured maximum number of retries
    pub max_retries: u32,
    /// Classification of the failure that triggered the retry
    pub reason: RetryReason,
    /// How long the pipeline sleeps before the next attempt
    pub delay: Duration,
}

/// Bounded exponential backoff policy.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts is `max_retries + 1`
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry
    pub base_delay: Duration,
    observer: Option<RetryObserver>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::llm()
    }
}

impl RetryPolicy {
    /// Create a policy with explicit bounds.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            observer: None,
        }
    }

    /// Policy for LLM calls: 5 retries starting at 10 seconds.
    pub fn llm() -> Self {
        Self::new(5, Duration::from_secs(10))
    }

    /// Policy for auxiliary calls made from inside tools: 2 retries starting at 2 seconds.
    pub fn tool_proxy() -> Self {
        Self::new(2, Duration::from_secs(2))
    }

    /// Build the LLM policy from configuration.
    pub fn llm_from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.base_delay_ms),
        )
    }

    /// Build the tool-proxy policy from configuration.
    pub fn tool_proxy_from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.tool_max_retries,
            Duration::from_millis(config.tool_base_delay_ms),
        )
    }

    /// Attach an observer that sees every [`RetryEvent`].
    pub fn with_observer(mut self, observer: RetryObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Backoff before retry number `attempt + 1`.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use loopclaw::providers::RetryPolicy;
    ///
    /// let policy = RetryPolicy::llm();
    /// assert_eq!(policy.delay_for(0), Duration::from_secs(10));
    /// assert_eq!(policy.delay_for(3), Duration::from_secs(80));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Whether a failure should be retried.
pub fn is_retryable(err: &LoopError) -> bool {
    err.provider_error().is_some_and(ProviderError::is_retryable)
}

/// Run `op` under `policy`, retrying transient failures.
///
/// `label` names the operation in log output. The operation is raced
/// against `cancel`; cancellation during an attempt or a backoff sleep
/// returns [`LoopError::Cancelled`]. After the last retry the final error
/// propagates unchanged.
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(LoopError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LoopError::Cancelled),
            outcome = op() => outcome,
        };

        let err = match outcome {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation = label, attempts = attempt + 1, "Retry succeeded");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !is_retryable(&err) || attempt >= policy.max_retries {
            return Err(err);
        }

        let event = RetryEvent {
            attempt: attempt + 1,
            max_retries: policy.max_retries,
            reason: RetryReason::classify(&err),
            delay: policy.delay_for(attempt),
        };
        warn!(
            operation = label,
            attempt = event.attempt,
            max_retries = event.max_retries,
            reason = %event.reason,
            delay_ms = event.delay.as_millis() as u64,
            error = %err,
            "Transient failure, retrying"
        );
        if let Some(observer) = &policy.observer {
            observer(&event);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LoopError::Cancelled),
            _ = tokio::time::sleep(event.delay) => {}
        }
        attempt += 1;
    }
}
