//! Configuration type definitions for LoopClaw
//!
//! All types implement serde traits for JSON serialization and have sensible
//! defaults, so a partial config file only needs the keys it changes.

use serde::{Deserialize, Serialize};

/// Main configuration struct for LoopClaw
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Agent loop settings (model, tokens, limits)
    pub agent: AgentConfig,
    /// Context compaction settings
    pub compaction: CompactionConfig,
    /// Retry pipeline settings
    pub retry: RetryConfig,
    /// LLM provider credentials
    pub providers: ProvidersConfig,
    /// Optional tool credentials
    pub tools: ToolsConfig,
    /// Logging sink settings
    pub logging: LoggingConfig,
}

// ============================================================================
// Agent Configuration
// ============================================================================

/// Default model used by the agent loop.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Agent loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model identifier sent to the provider
    pub model: String,
    /// Output token cap per model call
    pub max_tokens: u32,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
    /// Characters kept from a successful tool result
    pub max_tool_result_chars: usize,
    /// Messages kept by the history trimmer
    pub max_conversation_messages: usize,
    /// Directory tool paths resolve against; unset means unconfined
    pub working_directory: Option<String>,
    /// Stream assistant text as it arrives
    pub streaming: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 8192,
            temperature: 1.0,
            max_tool_result_chars: 40_000,
            max_conversation_messages: 50,
            working_directory: None,
            streaming: false,
        }
    }
}

// ============================================================================
// Compaction Configuration
// ============================================================================

/// Which compaction strategy the agent loop runs after each tool round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompactionStrategyKind {
    /// Never compact; the history trimmer is the only bound.
    #[default]
    None,
    /// Replace older history with a model-written summary.
    Summarize,
}

/// Context compaction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    pub strategy: CompactionStrategyKind,
    /// Estimated token count above which compaction runs
    pub threshold_tokens: usize,
    /// Most recent messages never folded into the summary
    pub protected_tail_messages: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            strategy: CompactionStrategyKind::None,
            threshold_tokens: 80_000,
            protected_tail_messages: 6,
        }
    }
}

// ============================================================================
// Retry Configuration
// ============================================================================

/// Retry pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries for LLM calls
    pub max_retries: u32,
    /// First backoff delay for LLM calls, doubled per retry
    pub base_delay_ms: u64,
    /// Retries for tool-proxy calls (web fetch and similar)
    pub tool_max_retries: u32,
    /// First backoff delay for tool-proxy calls
    pub tool_base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 10_000,
            tool_max_retries: 2,
            tool_base_delay_ms: 2_000,
        }
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// LLM provider configurations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Anthropic Messages API
    pub anthropic: Option<ProviderConfig>,
}

/// Generic provider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key for authentication
    pub api_key: Option<String>,
    /// Custom API base URL
    pub api_base: Option<String>,
}

// ============================================================================
// Tools Configuration
// ============================================================================

/// Settings for tools that need their own credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Brave Search API key; `web_search` is registered only when set
    pub brave_api_key: Option<String>,
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    pub format: LogFormat,
    /// Append logs to this file instead of stderr
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            file: None,
        }
    }
}
