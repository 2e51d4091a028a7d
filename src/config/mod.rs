//! Configuration management for LoopClaw
//!
//! Configuration is loaded from `~/.loopclaw/config.json` (or an explicit
//! path) and then overridden by environment variables.

mod types;
pub mod validate;

pub use types::*;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{LoopError, Result};

/// Fallback variable for the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Fallback variable for the Brave Search API key.
pub const BRAVE_API_KEY_ENV: &str = "BRAVE_API_KEY";

impl Config {
    /// Returns the LoopClaw configuration directory path (~/.loopclaw)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".loopclaw")
    }

    /// Returns the path to the config file (~/.loopclaw/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    /// Environment variables override config values using the pattern
    /// `LOOPCLAW_SECTION_KEY`.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                LoopError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        // Agent
        if let Ok(val) = std::env::var("LOOPCLAW_AGENT_MODEL") {
            self.agent.model = val;
        }
        env_parse("LOOPCLAW_AGENT_MAX_TOKENS", &mut self.agent.max_tokens);
        env_parse("LOOPCLAW_AGENT_TEMPERATURE", &mut self.agent.temperature);
        env_parse(
            "LOOPCLAW_AGENT_MAX_TOOL_RESULT_CHARS",
            &mut self.agent.max_tool_result_chars,
        );
        env_parse(
            "LOOPCLAW_AGENT_MAX_CONVERSATION_MESSAGES",
            &mut self.agent.max_conversation_messages,
        );
        if let Ok(val) = std::env::var("LOOPCLAW_AGENT_WORKING_DIRECTORY") {
            self.agent.working_directory = Some(val);
        }
        env_parse("LOOPCLAW_AGENT_STREAMING", &mut self.agent.streaming);

        // Compaction
        if let Ok(val) = std::env::var("LOOPCLAW_COMPACTION_STRATEGY") {
            match val.to_ascii_lowercase().as_str() {
                "none" => self.compaction.strategy = CompactionStrategyKind::None,
                "summarize" => self.compaction.strategy = CompactionStrategyKind::Summarize,
                other => tracing::warn!(value = other, "Ignoring unknown compaction strategy"),
            }
        }
        env_parse(
            "LOOPCLAW_COMPACTION_THRESHOLD_TOKENS",
            &mut self.compaction.threshold_tokens,
        );
        env_parse(
            "LOOPCLAW_COMPACTION_PROTECTED_TAIL_MESSAGES",
            &mut self.compaction.protected_tail_messages,
        );

        // Retry
        env_parse("LOOPCLAW_RETRY_MAX_RETRIES", &mut self.retry.max_retries);
        env_parse("LOOPCLAW_RETRY_BASE_DELAY_MS", &mut self.retry.base_delay_ms);
        env_parse(
            "LOOPCLAW_RETRY_TOOL_MAX_RETRIES",
            &mut self.retry.tool_max_retries,
        );
        env_parse(
            "LOOPCLAW_RETRY_TOOL_BASE_DELAY_MS",
            &mut self.retry.tool_base_delay_ms,
        );

        // Tools
        if let Ok(val) = std::env::var("LOOPCLAW_TOOLS_BRAVE_API_KEY") {
            self.tools.brave_api_key = Some(val);
        }
        if self.brave_api_key().is_none() {
            if let Ok(val) = std::env::var(BRAVE_API_KEY_ENV) {
                if !val.is_empty() {
                    self.tools.brave_api_key = Some(val);
                }
            }
        }

        // Logging
        if let Ok(val) = std::env::var("LOOPCLAW_LOGGING_LEVEL") {
            self.logging.level = val;
        }

        self.apply_provider_env_overrides();
    }

    /// Apply provider-specific environment variable overrides.
    ///
    /// `ANTHROPIC_API_KEY` is used only when no key was configured otherwise.
    fn apply_provider_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LOOPCLAW_PROVIDERS_ANTHROPIC_API_KEY") {
            let provider = self
                .providers
                .anthropic
                .get_or_insert_with(ProviderConfig::default);
            provider.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("LOOPCLAW_PROVIDERS_ANTHROPIC_API_BASE") {
            let provider = self
                .providers
                .anthropic
                .get_or_insert_with(ProviderConfig::default);
            provider.api_base = Some(val);
        }
        if self.api_key().is_none() {
            if let Ok(val) = std::env::var(ANTHROPIC_API_KEY_ENV) {
                if !val.is_empty() {
                    let provider = self
                        .providers
                        .anthropic
                        .get_or_insert_with(ProviderConfig::default);
                    provider.api_key = Some(val);
                }
            }
        }
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The configured, non-empty Anthropic API key.
    pub fn api_key(&self) -> Option<&str> {
        self.providers
            .anthropic
            .as_ref()
            .and_then(|p| p.api_key.as_deref())
            .filter(|k| !k.is_empty())
    }

    /// The configured Anthropic API base URL, if overridden.
    pub fn api_base(&self) -> Option<&str> {
        self.providers
            .anthropic
            .as_ref()
            .and_then(|p| p.api_base.as_deref())
            .filter(|b| !b.is_empty())
    }

    /// The configured, non-empty Brave Search API key.
    pub fn brave_api_key(&self) -> Option<&str> {
        self.tools
            .brave_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// The working directory tools are confined to, with `~` expanded.
    pub fn working_dir(&self) -> Option<PathBuf> {
        self.agent
            .working_directory
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(expand_home)
    }

    /// Reject settings the agent loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_tokens == 0 {
            return Err(LoopError::Config(
                "agent.max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.agent.max_conversation_messages == 1 {
            return Err(LoopError::Config(
                "agent.max_conversation_messages must be 0 (unlimited) or at least 2".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(LoopError::Config(format!(
                "agent.temperature must be between 0.0 and 2.0 (got {})",
                self.agent.temperature
            )));
        }
        if self.compaction.strategy == CompactionStrategyKind::Summarize
            && self.compaction.protected_tail_messages == 0
        {
            return Err(LoopError::Config(
                "compaction.protected_tail_messages must be at least 1 with the summarize strategy"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// A view of the config that is safe to print.
    pub fn redacted(&self) -> Redacted<'_> {
        Redacted(self)
    }
}

/// Display wrapper that hides API keys.
pub struct Redacted<'a>(&'a Config);

impl fmt::Display for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut config = self.0.clone();
        if let Some(provider) = config.providers.anthropic.as_mut() {
            if provider.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
                provider.api_key = Some("***".to_string());
            }
        }
        if config.brave_api_key().is_some() {
            config.tools.brave_api_key = Some("***".to_string());
        }
        let json = serde_json::to_string_pretty(&config).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = std::env::var(key) {
        match val.parse() {
            Ok(v) => *target = v,
            Err(_) => tracing::warn!(key, value = %val, "Ignoring unparsable environment override"),
        }
    }
}

/// Expand ~ to home directory in a path string
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return match rest.strip_prefix('/') {
                Some(tail) => home.join(tail),
                None if rest.is_empty() => home,
                None => PathBuf::from(path),
            };
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.agent.model, "claude-sonnet-4-5-20250929");
        assert_eq!(config.agent.max_tokens, 8192);
        assert_eq!(config.agent.max_tool_result_chars, 40_000);
        assert_eq!(config.agent.max_conversation_messages, 50);
        assert_eq!(config.compaction.strategy, CompactionStrategyKind::None);
        assert_eq!(config.compaction.threshold_tokens, 80_000);
        assert_eq!(config.compaction.protected_tail_messages, 6);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_ms, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{"agent": {"model": "m"}, "compaction": {"strategy": "summarize"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.agent.model, "m");
        assert_eq!(config.agent.max_tokens, 8192);
        assert_eq!(config.compaction.strategy, CompactionStrategyKind::Summarize);
        assert_eq!(config.compaction.protected_tail_messages, 6);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.agent.max_tokens = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.agent.temperature = 2.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.agent.max_conversation_messages = 1;
        assert!(config.validate().is_err());
        config.agent.max_conversation_messages = 2;
        assert!(config.validate().is_ok());
        config.agent.max_conversation_messages = 0;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.compaction.protected_tail_messages = 0;
        assert!(config.validate().is_ok());
        config.compaction.strategy = CompactionStrategyKind::Summarize;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("protected_tail_messages"));
    }

    #[test]
    fn test_env_override() {
        env::set_var("LOOPCLAW_AGENT_MODEL", "test-model");
        env::set_var("LOOPCLAW_AGENT_MAX_TOKENS", "1000");
        env::set_var("LOOPCLAW_COMPACTION_STRATEGY", "Summarize");
        env::set_var("LOOPCLAW_RETRY_BASE_DELAY_MS", "not-a-number");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.agent.model, "test-model");
        assert_eq!(config.agent.max_tokens, 1000);
        assert_eq!(config.compaction.strategy, CompactionStrategyKind::Summarize);
        assert_eq!(config.retry.base_delay_ms, 10_000);

        env::remove_var("LOOPCLAW_AGENT_MODEL");
        env::remove_var("LOOPCLAW_AGENT_MAX_TOKENS");
        env::remove_var("LOOPCLAW_COMPACTION_STRATEGY");
        env::remove_var("LOOPCLAW_RETRY_BASE_DELAY_MS");
    }

    #[test]
    fn test_configured_key_wins_over_fallback() {
        let mut config = Config::default();
        config.providers.anthropic = Some(ProviderConfig {
            api_key: Some("from-file".to_string()),
            api_base: None,
        });
        config.apply_provider_env_overrides();
        assert_eq!(config.api_key(), Some("from-file"));
    }

    #[test]
    fn test_redacted_hides_key() {
        let mut config = Config::default();
        config.providers.anthropic = Some(ProviderConfig {
            api_key: Some("sk-secret".to_string()),
            api_base: None,
        });
        config.tools.brave_api_key = Some("brave-secret".to_string());
        let shown = config.redacted().to_string();
        assert!(!shown.contains("sk-secret"));
        assert!(!shown.contains("brave-secret"));
        assert!(shown.contains("***"));
    }

    #[test]
    fn test_blank_brave_key_is_unset() {
        let mut config = Config::default();
        assert!(config.brave_api_key().is_none());
        config.tools.brave_api_key = Some("  ".to_string());
        assert!(config.brave_api_key().is_none());
        config.tools.brave_api_key = Some("bk-1".to_string());
        assert_eq!(config.brave_api_key(), Some("bk-1"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.agent.max_conversation_messages = 12;
        config.logging.format = LogFormat::Json;
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.agent.max_conversation_messages, 12);
        assert_eq!(loaded.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Config::load_from_path(&path).unwrap_err();
        assert!(matches!(err, LoopError::Config(_)));
    }

    #[test]
    fn test_load_nonexistent() {
        let config = Config::load_from_path(Path::new("/nonexistent/path/config.json")).unwrap();
        assert_eq!(config.compaction.protected_tail_messages, 6);
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/work"), home.join("work"));
            assert_eq!(expand_home("~"), home);
        }
        assert_eq!(expand_home("/abs/dir"), PathBuf::from("/abs/dir"));
    }
}
