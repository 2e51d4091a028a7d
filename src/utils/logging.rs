//! Logging initialization for LoopClaw.
//!
//! Supports three formats:
//! - `pretty`: multi-line human-readable output
//! - `compact`: one line per event, grep-friendly (default)
//! - `json`: structured JSON lines for log aggregators
//!
//! Output goes to stderr, or to an append-mode file when one is configured,
//! so it never interleaves with assistant text on stdout.

use std::fs::OpenOptions;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{LoopError, Result};

/// Initialize the global tracing subscriber from config.
///
/// Call this once at startup before any tracing events are emitted.
/// `RUST_LOG` wins over `cfg.level` when set.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let outcome = match &cfg.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let file = Arc::new(file);
            let writer = builder.with_ansi(false).with_writer(file);
            match cfg.format {
                LogFormat::Json => writer.json().try_init(),
                LogFormat::Pretty => writer.pretty().try_init(),
                LogFormat::Compact => writer.compact().try_init(),
            }
        }
        None => {
            let writer = builder.with_writer(std::io::stderr);
            match cfg.format {
                LogFormat::Json => writer.json().try_init(),
                LogFormat::Pretty => writer.pretty().try_init(),
                LogFormat::Compact => writer.compact().try_init(),
            }
        }
    };

    outcome.map_err(|e| LoopError::Config(format!("failed to initialise logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use crate::config::{LogFormat, LoggingConfig};

    #[test]
    fn test_default_logging_config() {
        let cfg = LoggingConfig::default();
        assert_eq!(cfg.format, LogFormat::Compact);
        assert_eq!(cfg.level, "info");
        assert!(cfg.file.is_none());
    }

    #[test]
    fn test_log_format_deserialize_json() {
        let cfg: LoggingConfig =
            serde_json::from_str(r#"{"format":"json","level":"debug"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.level, "debug");
    }

    #[test]
    fn test_log_format_partial_config_uses_defaults() {
        let cfg: LoggingConfig = serde_json::from_str(r#"{"level":"trace"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Compact);
        assert!(cfg.file.is_none());
        assert_eq!(cfg.level, "trace");
    }
}
