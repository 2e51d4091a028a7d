//! Tools module - Tool definitions and execution for LLM function calling
//!
//! This module provides the infrastructure for defining and executing tools
//! that the model can call during a run.
//!
//! # Overview
//!
//! - `Tool` trait: The interface that all tools must implement
//! - `ToolContext`: Execution context (working directory, cancellation)
//! - `ToolRegistry`: Name-keyed set of tools advertised to the model
//! - `ToolDispatcher`: Concurrent, order-preserving execution of a batch
//! - `LazyService`: Shared clients built on first use
//!
//! # Built-in Tools
//!
//! - `EchoTool`: Simple echo tool for testing
//! - `BashTool`: Execute bash commands
//! - `ReadFileTool` / `WriteFileTool` / `AppendFileTool`: File access
//! - `WebFetchTool`: Fetch a URL as readable text
//! - `WebSearchTool`: Brave web search, registered when a key is configured
//!
//! # Example
//!
//! ```rust
//! use loopclaw::tools::{Tool, ToolContext, ToolRegistry, EchoTool};
//! use loopclaw::tools::filesystem::ReadFileTool;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut registry = ToolRegistry::new();
//! registry.register(EchoTool);
//! registry.register(ReadFileTool);
//!
//! let tool = registry.get("echo").unwrap();
//! let result = tool.execute(json!({"message": "Hello!"}), &ToolContext::new()).await;
//! assert_eq!(result.unwrap(), "Hello!");
//! assert_eq!(registry.definitions().len(), 2);
//! # });
//! ```

mod dispatch;
pub mod filesystem;
mod registry;
mod service;
pub mod shell;
mod types;
pub mod web;

pub use dispatch::{ToolDispatcher, DEFAULT_MAX_TOOL_RESULT_CHARS};
pub use registry::ToolRegistry;
pub use service::LazyService;
pub use types::{Tool, ToolContext};

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;
use crate::error::Result;
use crate::providers::RetryPolicy;

/// A simple echo tool for testing purposes.
///
/// # Example
///
/// ```rust
/// use loopclaw::tools::{Tool, ToolContext, EchoTool};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let result = EchoTool.execute(json!({"message": "Hello"}), &ToolContext::new()).await;
/// assert_eq!(result.unwrap(), "Hello");
/// # });
/// ```
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the provided message"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to echo"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)");
        Ok(message.to_string())
    }
}

/// Registry with the built-in tools, configured from `config`.
pub fn builtin_registry(config: &Config) -> ToolRegistry {
    let http = web::http_client_service();
    let tool_retry = RetryPolicy::tool_proxy_from_config(&config.retry);

    let mut registry = ToolRegistry::new();
    registry.register(shell::BashTool::new());
    registry.register(filesystem::ReadFileTool);
    registry.register(filesystem::WriteFileTool);
    registry.register(filesystem::AppendFileTool);
    registry.register(web::WebFetchTool::new(
        Arc::clone(&http),
        tool_retry.clone(),
    ));
    if let Some(key) = config.brave_api_key() {
        registry.register(web::WebSearchTool::new(http, key, tool_retry));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_echo_tool_parameters() {
        let params = EchoTool.parameters();
        assert_eq!(params["type"], "object");
        assert_eq!(params["properties"]["message"]["type"], "string");
    }

    #[tokio::test]
    async fn test_echo_tool_execute_no_message() {
        let result = EchoTool.execute(json!({}), &ToolContext::new()).await;
        assert_eq!(result.unwrap(), "(no message)");
    }

    #[test]
    fn test_builtin_registry_names() {
        let registry = builtin_registry(&Config::default());
        assert_eq!(
            registry.names(),
            vec!["append_file", "bash", "read_file", "web_fetch", "write_file"]
        );
    }

    #[test]
    fn test_builtin_registry_adds_search_with_key() {
        let mut config = Config::default();
        config.tools.brave_api_key = Some("bk-1".to_string());
        let registry = builtin_registry(&config);
        assert!(registry.get("web_search").is_some());
        assert_eq!(registry.len(), 6);
    }
}
