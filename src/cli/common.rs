//! Shared CLI helpers used across multiple command handlers.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use loopclaw::agent::AgentLoop;
use loopclaw::config::{Config, ANTHROPIC_API_KEY_ENV};
use loopclaw::providers::{ClaudeProvider, LLMProvider};
use loopclaw::tools::builtin_registry;

/// Load config from `path`, or from the default location when unset.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(p) => Config::load_from_path(p)
            .with_context(|| format!("Failed to load configuration from {}", p.display()))?,
        None => Config::load().with_context(|| "Failed to load configuration")?,
    };
    Ok(config)
}

/// Build an agent loop with the Anthropic provider and the built-in tools.
pub(crate) fn create_agent(config: &Config) -> Result<AgentLoop> {
    config.validate().with_context(|| "Invalid configuration")?;

    let Some(api_key) = config.api_key() else {
        bail!(
            "No API key configured. Set {} or add providers.anthropic.api_key to {}",
            ANTHROPIC_API_KEY_ENV,
            Config::path().display()
        );
    };

    let mut provider = ClaudeProvider::new(api_key);
    if let Some(base) = config.api_base() {
        provider = provider.with_api_base(base);
    }
    let provider: Arc<dyn LLMProvider> = Arc::new(provider);

    let registry = builtin_registry(config);
    info!(
        model = %config.agent.model,
        tools = registry.len(),
        compaction = ?config.compaction.strategy,
        "Agent ready"
    );

    Ok(AgentLoop::from_config(config, provider, registry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(dir.path().join("absent.json").as_path())).unwrap();
        assert_eq!(config.agent.max_tokens, 8192);
    }

    #[test]
    fn test_load_config_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_config(Some(path.as_path())).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load configuration"));
    }

    #[test]
    fn test_create_agent_with_inline_key() {
        let mut config = Config::default();
        config.providers.anthropic = Some(loopclaw::config::ProviderConfig {
            api_key: Some("sk-test".to_string()),
            api_base: Some("http://127.0.0.1:9".to_string()),
        });
        let agent = create_agent(&config).unwrap();
        assert!(agent.conversation().is_empty());
        assert!(agent.settings().system_prompt.contains("web_fetch"));
    }
}
