//! Config check command handler.

use std::path::Path;

use anyhow::{Context, Result};

use loopclaw::config::validate::{validate_config, DiagnosticLevel};
use loopclaw::config::Config;

use super::ConfigAction;

/// Validate the configuration file and show the effective settings.
pub(crate) fn cmd_config(config: &Config, path: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check => {
            let config_path = path.map(Path::to_path_buf).unwrap_or_else(Config::path);
            println!("Config file: {}", config_path.display());

            let (errors, warnings) = if config_path.exists() {
                let content = std::fs::read_to_string(&config_path)
                    .context("Failed to read config file")?;
                let raw: serde_json::Value = match serde_json::from_str(&content) {
                    Ok(v) => v,
                    Err(e) => {
                        println!("[ERROR] Invalid JSON: {}", e);
                        return Ok(());
                    }
                };
                let diagnostics = validate_config(&raw);
                for diag in &diagnostics {
                    println!("{}", diag);
                }
                let count = |level: DiagnosticLevel| {
                    diagnostics.iter().filter(|d| d.level == level).count()
                };
                (count(DiagnosticLevel::Error), count(DiagnosticLevel::Warn))
            } else {
                println!("[OK] No config file found (using defaults)");
                (0, 0)
            };

            let semantic_error = match config.validate() {
                Ok(()) => 0,
                Err(e) => {
                    println!("[ERROR] {}", e);
                    1
                }
            };
            if config.api_key().is_none() {
                println!("[WARN] No Anthropic API key configured");
            }

            println!();
            println!("Effective configuration:");
            println!("{}", config.redacted());

            let errors = errors + semantic_error;
            if errors == 0 && warnings == 0 {
                println!("\nConfiguration looks good!");
            } else {
                println!("\nFound {} error(s), {} warning(s)", errors, warnings);
            }
        }
    }
    Ok(())
}
