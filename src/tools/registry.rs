//! Tool registry for LoopClaw
//!
//! This module provides the `ToolRegistry` struct: a name-to-capability map
//! built once at startup and read concurrently during dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::providers::ToolDefinition;

use super::Tool;

/// A registry that holds the available tools.
///
/// # Example
///
/// ```rust
/// use loopclaw::tools::{ToolRegistry, EchoTool};
///
/// let mut registry = ToolRegistry::new();
/// registry.register(EchoTool);
///
/// assert!(registry.has("echo"));
/// assert_eq!(registry.definitions()[0].name, "echo");
/// ```
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register an already shared tool.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    ///
    /// # Example
    /// ```
    /// use loopclaw::tools::{ToolRegistry, EchoTool};
    ///
    /// let mut registry = ToolRegistry::new();
    /// registry.register(EchoTool);
    ///
    /// assert!(registry.get("echo").is_some());
    /// assert!(registry.get("missing").is_none());
    /// ```
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool definitions for the LLM, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Names of all registered tools, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check if a tool exists in the registry.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::tools::{EchoTool, ToolContext};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "named"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_registry_new() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_definitions_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(NamedTool("write_file"));
        registry.register(NamedTool("bash"));
        registry.register(NamedTool("read_file"));

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["bash", "read_file", "write_file"]);
        assert_eq!(registry.names(), vec!["bash", "read_file", "write_file"]);
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(EchoTool);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_get_returns_shared_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let tool = registry.get("echo").unwrap();
        let out = tool
            .execute(json!({"message": "hi"}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(out, "hi");
    }
}
