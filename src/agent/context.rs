//! System prompt construction
//!
//! The `ContextBuilder` renders the system prompt sent with every model call:
//! the base instructions, today's date, and an optional runtime section
//! describing the environment the tools run in.

use chrono::{DateTime, Utc};

/// Base instructions for the agent.
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant with access to tools. \
You can execute bash commands, read files, write files, and fetch web pages to help the user with their tasks.

When the user asks you to do something, use the available tools to accomplish it. \
Think step by step about what tools you need to use, then use them.

If a tool call fails, read the error message carefully and try a different approach.

When writing large files, break the content into sections: use write_file to create the file \
with the first section, then use append_file to add the remaining sections. \
This avoids hitting output token limits.

Be concise in your responses. When you've completed a task, briefly summarize what you did.";

/// Runtime facts appended to the system prompt.
///
/// # Example
///
/// ```rust
/// use loopclaw::agent::RuntimeContext;
///
/// let ctx = RuntimeContext::new()
///     .with_tools(vec!["bash".to_string(), "read_file".to_string()])
///     .with_working_dir("/home/user/project");
///
/// let rendered = ctx.render().unwrap();
/// assert!(rendered.contains("bash, read_file"));
/// assert!(rendered.contains("/home/user/project"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuntimeContext {
    /// Names of available tools
    pub available_tools: Vec<String>,
    /// Directory relative tool paths resolve against
    pub working_dir: Option<String>,
    /// OS/platform info (e.g., "linux x86_64")
    pub os_info: Option<String>,
}

impl RuntimeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the list of available tool names.
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.available_tools = tools;
        self
    }

    /// Set the working directory.
    pub fn with_working_dir(mut self, dir: &str) -> Self {
        self.working_dir = Some(dir.to_string());
        self
    }

    /// Set the OS/platform info from the current environment.
    pub fn with_os_info(mut self) -> Self {
        self.os_info = Some(format!(
            "{} {}",
            std::env::consts::OS,
            std::env::consts::ARCH
        ));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.available_tools.is_empty() && self.working_dir.is_none() && self.os_info.is_none()
    }

    /// Render as a markdown section, or `None` when nothing is set.
    pub fn render(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let mut parts = Vec::new();
        if !self.available_tools.is_empty() {
            parts.push(format!(
                "- Available tools: {}",
                self.available_tools.join(", ")
            ));
        }
        if let Some(ref dir) = self.working_dir {
            parts.push(format!("- Working directory: {}", dir));
        }
        if let Some(ref os) = self.os_info {
            parts.push(format!("- Platform: {}", os));
        }

        Some(format!("## Runtime Context\n\n{}", parts.join("\n")))
    }
}

/// Builder for the system prompt.
///
/// # Example
///
/// ```rust
/// use loopclaw::agent::ContextBuilder;
///
/// let prompt = ContextBuilder::new().build_system_prompt();
/// assert!(prompt.contains("append_file"));
/// assert!(prompt.contains("Today's date is"));
/// ```
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
    runtime_context: Option<RuntimeContext>,
    now: Option<DateTime<Utc>>,
}

impl ContextBuilder {
    /// Create a builder with the default instructions.
    pub fn new() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            runtime_context: None,
            now: None,
        }
    }

    /// Replace the base instructions.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Append a runtime section. Empty contexts are ignored.
    pub fn with_runtime_context(mut self, ctx: RuntimeContext) -> Self {
        if !ctx.is_empty() {
            self.runtime_context = Some(ctx);
        }
        self
    }

    /// Pin the date line to a fixed instant.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Render the full system prompt.
    pub fn build_system_prompt(&self) -> String {
        let now = self.now.unwrap_or_else(Utc::now);
        let mut prompt = format!(
            "{}\n\nToday's date is {} (UTC).",
            self.system_prompt,
            now.format("%A, %B %-d, %Y")
        );
        if let Some(section) = self.runtime_context.as_ref().and_then(|c| c.render()) {
            prompt.push_str("\n\n");
            prompt.push_str(&section);
        }
        prompt
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_date_line_is_formatted() {
        let now = Utc.with_ymd_and_hms(2025, 3, 7, 12, 0, 0).unwrap();
        let prompt = ContextBuilder::new().with_now(now).build_system_prompt();
        assert!(prompt.contains("Today's date is Friday, March 7, 2025 (UTC)."));
    }

    #[test]
    fn test_custom_prompt_and_runtime_section() {
        let ctx = RuntimeContext::new().with_os_info();
        let prompt = ContextBuilder::new()
            .with_system_prompt("Be brief.")
            .with_runtime_context(ctx)
            .build_system_prompt();
        assert!(prompt.starts_with("Be brief."));
        assert!(prompt.contains("## Runtime Context"));
        assert!(prompt.contains("- Platform: "));
    }

    #[test]
    fn test_empty_runtime_context_ignored() {
        let prompt = ContextBuilder::new()
            .with_runtime_context(RuntimeContext::new())
            .build_system_prompt();
        assert!(!prompt.contains("Runtime Context"));
        assert!(RuntimeContext::new().render().is_none());
    }
}
