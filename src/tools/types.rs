//! Tool types for LoopClaw
//!
//! This module defines the core types for tool execution, including the `Tool` trait
//! that all tools must implement, and the `ToolContext` struct that provides
//! execution context to tools.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::providers::ToolDefinition;

/// Trait that all tools must implement.
///
/// Tools are executable capabilities the LLM can call: running a command,
/// reading a file, fetching a URL. The runtime never looks past this
/// contract.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use loopclaw::tools::{Tool, ToolContext};
/// use loopclaw::error::Result;
///
/// struct MyTool;
///
/// #[async_trait]
/// impl Tool for MyTool {
///     fn name(&self) -> &str { "my_tool" }
///     fn description(&self) -> &str { "Does something useful" }
///     fn parameters(&self) -> Value {
///         serde_json::json!({
///             "type": "object",
///             "properties": {},
///             "required": []
///         })
///     }
///     async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String> {
///         Ok("Done!".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name.
    ///
    /// This name is used to identify the tool when the LLM requests it.
    /// It should be unique within a registry.
    fn name(&self) -> &str;

    /// Get the tool description sent to the LLM.
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    ///
    /// Failures are returned as errors; the dispatcher turns them into
    /// error results so one failing tool never aborts the batch. Long-running
    /// tools should watch `ctx.cancel`.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String>;

    /// The definition advertised to the LLM.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}

/// Context provided to tools during execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Directory file paths are resolved against and confined to
    pub working_dir: Option<PathBuf>,
    /// Cancellation signal for the current run
    pub cancel: CancellationToken,
}

impl ToolContext {
    /// Create a new tool context with no working directory.
    ///
    /// # Example
    /// ```
    /// use loopclaw::tools::ToolContext;
    ///
    /// let ctx = ToolContext::new();
    /// assert!(ctx.working_dir.is_none());
    /// assert!(!ctx.cancel.is_cancelled());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory.
    ///
    /// # Example
    /// ```
    /// use loopclaw::tools::ToolContext;
    ///
    /// let ctx = ToolContext::new().with_working_dir("/home/user/project");
    /// assert_eq!(
    ///     ctx.working_dir.as_deref(),
    ///     Some(std::path::Path::new("/home/user/project"))
    /// );
    /// ```
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Working directory, if one is configured.
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::EchoTool;

    #[test]
    fn test_tool_context_builder_chain() {
        let cancel = CancellationToken::new();
        let ctx = ToolContext::new()
            .with_working_dir("/tmp/workspace")
            .with_cancel(cancel.clone());

        assert_eq!(ctx.working_dir(), Some(Path::new("/tmp/workspace")));
        cancel.cancel();
        assert!(ctx.cancel.is_cancelled());
    }

    #[test]
    fn test_tool_definition_default() {
        let def = EchoTool.definition();
        assert_eq!(def.name, "echo");
        assert_eq!(def.parameters["required"][0], "message");
    }
}
