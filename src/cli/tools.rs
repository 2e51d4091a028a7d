//! Tools CLI command handlers.

use anyhow::{bail, Result};

use loopclaw::config::Config;
use loopclaw::tools::builtin_registry;

use super::ToolsAction;

pub(crate) fn cmd_tools(config: &Config, action: ToolsAction) -> Result<()> {
    let registry = builtin_registry(config);
    match action {
        ToolsAction::List => {
            println!("Built-in tools:");
            println!();
            for name in registry.names() {
                let description = registry
                    .get(name)
                    .map(|t| t.description().to_string())
                    .unwrap_or_default();
                println!("  {:<14} {}", name, first_line(&description));
            }
            println!();
            println!("{} tool(s).", registry.len());
        }
        ToolsAction::Info { name } => {
            let Some(tool) = registry.get(&name) else {
                bail!("Unknown tool '{}'. Try: loopclaw tools list", name);
            };
            println!("Tool: {}", tool.name());
            println!();
            println!("{}", tool.description());
            println!();
            println!("Parameters:");
            println!("{}", serde_json::to_string_pretty(&tool.parameters())?);
        }
    }
    Ok(())
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
