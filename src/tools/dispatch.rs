//! Tool dispatcher
//!
//! Executes one model turn's tool-use requests concurrently against the
//! registry and returns one `ToolResult` block per request, in request
//! order. Per-call failures become error results; nothing a single tool does
//! can abort the batch.

use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, error, warn};

use crate::session::{ContentBlock, ToolUse};
use crate::utils::string::{format_thousands, prefix_chars};

use super::{ToolContext, ToolRegistry};

/// Default cap on characters kept from a successful tool result.
pub const DEFAULT_MAX_TOOL_RESULT_CHARS: usize = 40_000;

/// Fans a batch of tool uses out over the registry.
///
/// # Example
///
/// ```rust
/// use loopclaw::session::{ContentBlock, ToolUse};
/// use loopclaw::tools::{EchoTool, ToolContext, ToolDispatcher, ToolRegistry};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let mut registry = ToolRegistry::new();
/// registry.register(EchoTool);
/// let dispatcher = ToolDispatcher::new(registry, 40_000);
///
/// let uses = vec![ToolUse { id: "t1".into(), name: "echo".into(), input: json!({"message": "hi"}) }];
/// let results = dispatcher.dispatch(&uses, &ToolContext::new()).await;
/// assert_eq!(results, vec![ContentBlock::tool_result("t1", "hi")]);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: ToolRegistry,
    max_result_chars: usize,
}

impl ToolDispatcher {
    /// Create a dispatcher. A `max_result_chars` of zero disables truncation.
    pub fn new(registry: ToolRegistry, max_result_chars: usize) -> Self {
        Self {
            registry,
            max_result_chars,
        }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute every tool use concurrently and wait for all of them.
    ///
    /// The returned blocks line up one-to-one with `uses`: result `i`
    /// answers request `i` whatever order the calls finish in.
    pub async fn dispatch(&self, uses: &[ToolUse], ctx: &ToolContext) -> Vec<ContentBlock> {
        let calls = uses.iter().map(|tool_use| self.run_one(tool_use, ctx));
        join_all(calls).await
    }

    async fn run_one(&self, tool_use: &ToolUse, ctx: &ToolContext) -> ContentBlock {
        let tool = match self.registry.get(&tool_use.name) {
            Some(tool) => tool,
            None => {
                warn!(tool = %tool_use.name, "Model requested unknown tool");
                return ContentBlock::tool_error(
                    &tool_use.id,
                    format!("Error: unknown tool \"{}\"", tool_use.name),
                );
            }
        };

        let start = Instant::now();
        match tool.execute(tool_use.input.clone(), ctx).await {
            Ok(output) => {
                debug!(
                    tool = %tool_use.name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    chars = output.len(),
                    "Tool executed successfully"
                );
                ContentBlock::tool_result(&tool_use.id, self.truncate(&tool_use.name, output))
            }
            Err(e) => {
                error!(
                    tool = %tool_use.name,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool execution failed"
                );
                ContentBlock::tool_error(
                    &tool_use.id,
                    format!("Error executing tool \"{}\": {}", tool_use.name, e),
                )
            }
        }
    }

    /// Cap `output` at the configured character count, appending a notice.
    pub fn truncate(&self, tool_name: &str, output: String) -> String {
        if self.max_result_chars == 0 {
            return output;
        }
        let original = output.chars().count();
        if original <= self.max_result_chars {
            return output;
        }

        warn!(
            tool = %tool_name,
            original_chars = original,
            shown_chars = self.max_result_chars,
            "Tool result truncated"
        );
        format!(
            "{}\n\n[OUTPUT TRUNCATED: Showing {} of {} characters from {}]",
            prefix_chars(&output, self.max_result_chars),
            format_thousands(self.max_result_chars),
            format_thousands(original),
            tool_name
        )
    }
}
