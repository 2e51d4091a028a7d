//! Provider types for LoopClaw
//!
//! This module defines the core types and traits for LLM providers,
//! including the `LLMProvider` trait, chat options, and response types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::session::{ContentBlock, Message, Role, ToolUse};

/// Definition of a tool that can be called by the LLM.
///
/// Tool definitions describe the available tools, their parameters,
/// and how the LLM should invoke them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The name of the tool (must be unique)
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    ///
    /// # Example
    /// ```
    /// use loopclaw::providers::ToolDefinition;
    /// use serde_json::json;
    ///
    /// let tool = ToolDefinition::new(
    ///     "read_file",
    ///     "Read a file from the working directory",
    ///     json!({
    ///         "type": "object",
    ///         "properties": {
    ///             "path": { "type": "string", "description": "File path" }
    ///         },
    ///         "required": ["path"]
    ///     }),
    /// );
    /// assert_eq!(tool.name, "read_file");
    /// ```
    pub fn new(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Trait for LLM providers.
///
/// Implement this trait to add support for a new LLM backend. The provider
/// translates between LoopClaw's transcript model and the backend's wire
/// format. Retries and cancellation are applied by the caller through
/// [`execute_with_retry`](crate::providers::retry::execute_with_retry).
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send a chat completion request to the LLM.
    ///
    /// # Arguments
    /// * `messages` - The conversation history
    /// * `tools` - Available tools the LLM can call
    /// * `model` - Optional model override (uses default if None)
    /// * `options` - Output cap, temperature and system prompt
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse>;

    /// Send a streaming chat completion request.
    ///
    /// Text arrives as [`StreamEvent::Delta`] events and the stream ends with
    /// a single [`StreamEvent::Done`] carrying the assembled response. The
    /// default implementation calls [`chat`](LLMProvider::chat) and emits
    /// one `Done` event.
    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let response = self.chat(messages, tools, model, options).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(StreamEvent::Done(response)).await;
        Ok(rx)
    }

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;

    /// Get the provider name (e.g., "claude").
    fn name(&self) -> &str;
}

/// Options for chat completion requests.
///
/// Use the builder pattern to construct options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOptions {
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 = deterministic)
    pub temperature: Option<f32>,
    /// System prompt, sent outside the message list
    pub system: Option<String>,
}

impl ChatOptions {
    /// Create new default chat options.
    ///
    /// # Example
    /// ```
    /// use loopclaw::providers::ChatOptions;
    ///
    /// let options = ChatOptions::new();
    /// assert!(options.max_tokens.is_none());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of tokens to generate.
    ///
    /// # Example
    /// ```
    /// use loopclaw::providers::ChatOptions;
    ///
    /// let options = ChatOptions::new().with_max_tokens(1000);
    /// assert_eq!(options.max_tokens, Some(1000));
    /// ```
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Natural end of the turn
    EndTurn,
    /// The model is waiting on tool results
    ToolUse,
    /// Generation hit the output token cap
    MaxTokens,
    /// A stop sequence matched
    StopSequence,
    /// Anything the transport reports that is not listed above
    Other(String),
}

impl StopReason {
    /// Parse the wire value (`"end_turn"`, `"max_tokens"`, ...).
    ///
    /// # Example
    /// ```
    /// use loopclaw::providers::StopReason;
    ///
    /// assert_eq!(StopReason::parse("max_tokens"), StopReason::MaxTokens);
    /// assert_eq!(StopReason::parse("refusal"), StopReason::Other("refusal".into()));
    /// ```
    pub fn parse(value: &str) -> Self {
        match value {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// Response from an LLM chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct LLMResponse {
    /// The assistant message, ready to append to the transcript
    pub message: Message,
    /// Why generation ended
    pub stop_reason: StopReason,
    /// Token usage information (if available)
    pub usage: Option<Usage>,
}

impl LLMResponse {
    /// Create a plain text response that ended normally.
    ///
    /// # Example
    /// ```
    /// use loopclaw::providers::{LLMResponse, StopReason};
    ///
    /// let response = LLMResponse::text("Hello, world!");
    /// assert_eq!(response.message.text(), "Hello, world!");
    /// assert_eq!(response.stop_reason, StopReason::EndTurn);
    /// assert!(!response.has_tool_uses());
    /// ```
    pub fn text(content: &str) -> Self {
        Self {
            message: Message::assistant(content),
            stop_reason: StopReason::EndTurn,
            usage: None,
        }
    }

    /// Create a response from explicit content blocks.
    ///
    /// The stop reason is `ToolUse` when any block is a tool use, otherwise
    /// `EndTurn`; override with [`with_stop_reason`](Self::with_stop_reason).
    pub fn from_blocks(blocks: Vec<ContentBlock>) -> Self {
        let message = Message::with_blocks(Role::Assistant, blocks);
        let stop_reason = if message.has_tool_uses() {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        };
        Self {
            message,
            stop_reason,
            usage: None,
        }
    }

    /// Override the stop reason.
    pub fn with_stop_reason(mut self, stop_reason: StopReason) -> Self {
        self.stop_reason = stop_reason;
        self
    }

    /// Set usage information for this response.
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Check if the message requests any tool invocations.
    pub fn has_tool_uses(&self) -> bool {
        self.message.has_tool_uses()
    }

    /// The tool-use requests, in block order.
    pub fn tool_uses(&self) -> Vec<ToolUse> {
        self.message.tool_uses()
    }
}

/// Token usage information from a completion request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt
    pub input_tokens: u32,
    /// Number of tokens in the completion
    pub output_tokens: u32,
}

impl Usage {
    /// Create new usage information.
    ///
    /// # Example
    /// ```
    /// use loopclaw::providers::Usage;
    ///
    /// let usage = Usage::new(100, 50);
    /// assert_eq!(usage.total(), 150);
    /// ```
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Input plus output tokens.
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Event emitted by [`LLMProvider::chat_stream`].
#[derive(Debug)]
pub enum StreamEvent {
    /// Incremental assistant text
    Delta(String),
    /// Final assembled response; always the last event on success
    Done(LLMResponse),
    /// The stream broke after it started
    Error(crate::error::LoopError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StaticProvider;

    #[async_trait]
    impl LLMProvider for StaticProvider {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            Ok(LLMResponse::text("static"))
        }

        fn default_model(&self) -> &str {
            "static-model"
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    #[test]
    fn test_chat_options_builder() {
        let options = ChatOptions::new()
            .with_max_tokens(1000)
            .with_temperature(0.0)
            .with_system("be brief");
        assert_eq!(options.max_tokens, Some(1000));
        assert_eq!(options.temperature, Some(0.0));
        assert_eq!(options.system.as_deref(), Some("be brief"));
    }

    #[test]
    fn test_chat_options_default() {
        let options = ChatOptions::default();
        assert!(options.max_tokens.is_none());
        assert!(options.temperature.is_none());
        assert!(options.system.is_none());
    }

    #[test]
    fn test_stop_reason_parse() {
        assert_eq!(StopReason::parse("end_turn"), StopReason::EndTurn);
        assert_eq!(StopReason::parse("tool_use"), StopReason::ToolUse);
        assert_eq!(StopReason::parse("stop_sequence"), StopReason::StopSequence);
        assert_eq!(
            StopReason::parse("pause_turn"),
            StopReason::Other("pause_turn".to_string())
        );
    }

    #[test]
    fn test_response_from_blocks_infers_tool_use() {
        let response = LLMResponse::from_blocks(vec![
            ContentBlock::text("Let me check."),
            ContentBlock::tool_use("t1", "bash", json!({"command": "ls"})),
        ]);
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert!(response.has_tool_uses());
        assert_eq!(response.tool_uses()[0].id, "t1");

        let truncated = LLMResponse::from_blocks(vec![ContentBlock::text("partial")])
            .with_stop_reason(StopReason::MaxTokens);
        assert_eq!(truncated.stop_reason, StopReason::MaxTokens);
    }

    #[test]
    fn test_usage_total() {
        let usage = Usage::new(100, 50);
        assert_eq!(usage.total(), 150);
        assert_eq!(Usage::new(u32::MAX, 1).total(), u32::MAX);
    }

    #[test]
    fn test_tool_definition_serialization() {
        let tool = ToolDefinition::new("search", "Search the web", json!({"type": "object"}));
        let json = serde_json::to_string(&tool).unwrap();
        let parsed: ToolDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tool);
    }

    #[tokio::test]
    async fn test_default_chat_stream_emits_single_done() {
        let provider = StaticProvider;
        let mut rx = provider
            .chat_stream(vec![], vec![], None, ChatOptions::default())
            .await
            .unwrap();

        match rx.recv().await {
            Some(StreamEvent::Done(response)) => assert_eq!(response.message.text(), "static"),
            other => panic!("expected Done, got {:?}", other),
        }
        assert!(rx.recv().await.is_none());
    }
}
