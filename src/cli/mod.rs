//! CLI module - command parsing and dispatch

mod agent;
mod common;
mod config;
mod tools;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use loopclaw::utils::logging::init_logging;

#[derive(Parser)]
#[command(name = "loopclaw")]
#[command(version)]
#[command(about = "Conversational tool-calling agent", long_about = None)]
pub(crate) struct Cli {
    /// Path to the config file (defaults to ~/.loopclaw/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session, or answer a single message
    Agent {
        /// Single message to process (non-interactive)
        #[arg(short, long)]
        message: Option<String>,
        /// Stream the response token-by-token
        #[arg(long)]
        stream: bool,
    },
    /// List the built-in tools
    Tools {
        #[command(subcommand)]
        action: Option<ToolsAction>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub(crate) enum ToolsAction {
    /// List all tools
    List,
    /// Show the parameter schema of one tool
    Info {
        /// Tool name
        name: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Validate the config file and print the effective settings
    Check,
}

/// Entry point for the CLI.
pub async fn run() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = common::load_config(cli.config.as_deref())?;
    init_logging(&config.logging)?;

    match cli.command {
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
        Some(Commands::Agent { message, stream }) => {
            agent::cmd_agent(config, message, stream).await?;
        }
        Some(Commands::Tools { action }) => {
            tools::cmd_tools(&config, action.unwrap_or(ToolsAction::List))?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(&config, cli.config.as_deref(), action)?;
        }
        Some(Commands::Version) => {
            println!("loopclaw {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
