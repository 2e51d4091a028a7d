//! Claude (Anthropic) LLM provider implementation
//!
//! This module implements the `LLMProvider` trait for Anthropic's Messages
//! API, handling message conversion, tool calls, stop reasons and SSE
//! streaming.
//!
//! # Example
//!
//! ```rust,ignore
//! use loopclaw::providers::{claude::ClaudeProvider, ChatOptions, LLMProvider};
//! use loopclaw::session::Message;
//!
//! async fn example() {
//!     let provider = ClaudeProvider::new("your-api-key");
//!     let options = ChatOptions::new().with_system("You are a helpful assistant.");
//!
//!     let response = provider
//!         .chat(vec![Message::user("Hello!")], vec![], None, options)
//!         .await
//!         .unwrap();
//!
//!     println!("Claude: {}", response.message.text());
//! }
//! ```

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{LoopError, ProviderError, Result};
use crate::session::{ContentBlock, Message};

use super::{
    parse_provider_error, ChatOptions, LLMProvider, LLMResponse, StopReason, StreamEvent,
    ToolDefinition, Usage,
};

/// The Claude API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// The default Claude model to use.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// The Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Output cap used when the caller does not set one.
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Claude/Anthropic LLM provider.
pub struct ClaudeProvider {
    /// API key for authentication
    api_key: String,
    /// Base URL, without the `/v1/messages` path
    api_base: String,
    /// HTTP client for making requests
    client: Client,
}

impl ClaudeProvider {
    /// Create a new Claude provider with the given API key.
    ///
    /// # Example
    /// ```
    /// use loopclaw::providers::claude::ClaudeProvider;
    /// use loopclaw::providers::LLMProvider;
    ///
    /// let provider = ClaudeProvider::new("sk-ant-api03-xxx");
    /// assert_eq!(provider.name(), "claude");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Create a new Claude provider with a custom HTTP client.
    pub fn with_client(api_key: &str, client: Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            client,
        }
    }

    /// Point the provider at a different base URL (proxies, test servers).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.api_base)
    }

    fn build_request(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
        stream: bool,
    ) -> ClaudeRequest {
        ClaudeRequest {
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages,
            system: options.system.filter(|s| !s.is_empty()),
            tools: if tools.is_empty() {
                None
            } else {
                Some(convert_tools(tools))
            },
            temperature: options.temperature,
            stream: if stream { Some(true) } else { None },
        }
    }

    async fn send(&self, request: &ClaudeRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LoopError::from(parse_provider_error(
                status,
                &error_body(&error_text),
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for ClaudeProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let request = self.build_request(messages, tools, model, options, false);
        let response = self.send(&request).await?;
        let claude_response: ClaudeResponse = response.json().await?;
        Ok(convert_response(claude_response))
    }

    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let request = self.build_request(messages, tools, model, options, true);
        let response = self.send(&request).await?;

        let (tx, rx) = mpsc::channel::<StreamEvent>(32);
        let byte_stream = response.bytes_stream();

        tokio::spawn(async move {
            let mut assembler = SseAssembler::default();
            let mut line_buffer = String::new();

            tokio::pin!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(StreamEvent::Error(LoopError::from(e))).await;
                        return;
                    }
                };

                line_buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline_pos) = line_buffer.find('\n') {
                    let line: String = line_buffer.drain(..=newline_pos).collect();
                    match assembler.feed_line(line.trim()) {
                        SseStep::Continue => {}
                        SseStep::Delta(text) => {
                            if tx.send(StreamEvent::Delta(text)).await.is_err() {
                                return;
                            }
                        }
                        SseStep::Failed(err) => {
                            let _ = tx.send(StreamEvent::Error(err)).await;
                            return;
                        }
                        SseStep::Finished => break,
                    }
                }
                if assembler.is_finished() {
                    break;
                }
            }

            let event = match assembler.finish() {
                Ok(response) => StreamEvent::Done(response),
                Err(err) => StreamEvent::Error(err),
            };
            let _ = tx.send(event).await;
        });

        Ok(rx)
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    fn name(&self) -> &str {
        "claude"
    }
}

/// Human-readable body for a failed request.
fn error_body(error_text: &str) -> String {
    match serde_json::from_str::<ClaudeErrorResponse>(error_text) {
        Ok(error_response) => format!(
            "Claude API error: {} - {}",
            error_response.error.r#type, error_response.error.message
        ),
        Err(_) => format!("Claude API error: {}", error_text),
    }
}

// ============================================================================
// Claude API Request Types
// ============================================================================

/// Claude API request body.
///
/// The transcript already uses Anthropic's block shape, so messages are
/// serialized as-is.
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Claude tool definition.
#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

// ============================================================================
// Claude API Response Types
// ============================================================================

/// Claude API response body.
#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeResponseBlock>,
    usage: ClaudeUsage,
    stop_reason: Option<String>,
}

/// A response content block. Block types the runtime does not model
/// (thinking, server tools) are skipped.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Unsupported,
}

/// Claude API error response.
#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
    error: ClaudeError,
}

#[derive(Debug, Deserialize)]
struct ClaudeError {
    r#type: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ============================================================================
// Claude SSE Streaming Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SseEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<SseDelta>,
    #[serde(default)]
    content_block: Option<SseContentBlock>,
    #[serde(default)]
    usage: Option<SseUsage>,
    #[serde(default)]
    message: Option<SseMessage>,
    #[serde(default)]
    error: Option<ClaudeError>,
}

#[derive(Debug, Deserialize)]
struct SseDelta {
    #[serde(rename = "type")]
    #[serde(default)]
    delta_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    partial_json: Option<String>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SseContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SseUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SseMessage {
    #[serde(default)]
    usage: Option<SseUsage>,
}

/// Result of feeding one SSE line.
#[derive(Debug)]
enum SseStep {
    Continue,
    Delta(String),
    Failed(LoopError),
    Finished,
}

/// Incrementally assembles a streamed response into content blocks.
#[derive(Debug, Default)]
struct SseAssembler {
    blocks: Vec<ContentBlock>,
    current_text: Option<String>,
    current_tool: Option<(String, String)>,
    current_tool_json: String,
    stop_reason: Option<String>,
    input_tokens: u32,
    output_tokens: u32,
    finished: bool,
}

impl SseAssembler {
    fn feed_line(&mut self, line: &str) -> SseStep {
        let data = match line
            .strip_prefix("data: ")
            .or_else(|| line.strip_prefix("data:"))
        {
            Some(data) => data,
            None => return SseStep::Continue,
        };

        let sse: SseEvent = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "Skipping unparseable SSE payload");
                return SseStep::Continue;
            }
        };

        match sse.event_type.as_str() {
            "message_start" => {
                if let Some(usage) = sse.message.and_then(|m| m.usage) {
                    self.input_tokens = usage.input_tokens.unwrap_or(0);
                }
            }
            "content_block_start" => {
                if let Some(block) = sse.content_block {
                    match block.block_type.as_str() {
                        "text" => self.current_text = Some(String::new()),
                        "tool_use" => {
                            self.current_tool = Some((
                                block.id.unwrap_or_default(),
                                block.name.unwrap_or_default(),
                            ));
                            self.current_tool_json.clear();
                        }
                        _ => {}
                    }
                }
            }
            "content_block_delta" => {
                if let Some(delta) = sse.delta {
                    match delta.delta_type.as_deref() {
                        Some("text_delta") => {
                            if let Some(text) = delta.text {
                                self.current_text
                                    .get_or_insert_with(String::new)
                                    .push_str(&text);
                                return SseStep::Delta(text);
                            }
                        }
                        Some("input_json_delta") => {
                            if let Some(chunk) = delta.partial_json {
                                self.current_tool_json.push_str(&chunk);
                            }
                        }
                        _ => {}
                    }
                }
            }
            "content_block_stop" => {
                if let Err(err) = self.close_block() {
                    return SseStep::Failed(err);
                }
            }
            "message_delta" => {
                if let Some(reason) = sse.delta.and_then(|d| d.stop_reason) {
                    self.stop_reason = Some(reason);
                }
                if let Some(tokens) = sse.usage.and_then(|u| u.output_tokens) {
                    self.output_tokens = tokens;
                }
            }
            "message_stop" => {
                self.finished = true;
                return SseStep::Finished;
            }
            "error" => {
                let body = sse
                    .error
                    .map(|e| format!("Claude API error: {} - {}", e.r#type, e.message))
                    .unwrap_or_else(|| "Claude stream error".to_string());
                let status = if body.contains("overloaded") { 529 } else { 500 };
                return SseStep::Failed(LoopError::from(parse_provider_error(status, &body)));
            }
            _ => {}
        }

        SseStep::Continue
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn close_block(&mut self) -> Result<()> {
        if let Some(text) = self.current_text.take() {
            if !text.is_empty() {
                self.blocks.push(ContentBlock::text(text));
            }
        }
        if let Some((id, name)) = self.current_tool.take() {
            let raw = std::mem::take(&mut self.current_tool_json);
            let input = if raw.trim().is_empty() {
                serde_json::json!({})
            } else {
                serde_json::from_str(&raw).map_err(|e| {
                    LoopError::ProviderTyped(ProviderError::Unknown(format!(
                        "malformed streamed input for tool '{}': {}",
                        name, e
                    )))
                })?
            };
            self.blocks.push(ContentBlock::tool_use(id, name, input));
        }
        Ok(())
    }

    /// Assemble the final response. A stream that ended before
    /// `message_stop` is a dropped connection, never a partial answer.
    fn finish(&mut self) -> Result<LLMResponse> {
        if !self.finished {
            return Err(LoopError::ProviderTyped(ProviderError::Connection(
                "stream ended before message_stop".to_string(),
            )));
        }
        self.close_block()?;
        let blocks = std::mem::take(&mut self.blocks);
        let mut response = LLMResponse::from_blocks(blocks)
            .with_usage(Usage::new(self.input_tokens, self.output_tokens));
        if let Some(reason) = self.stop_reason.take() {
            response = response.with_stop_reason(StopReason::parse(&reason));
        }
        Ok(response)
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert tool definitions to Claude API format.
fn convert_tools(tools: Vec<ToolDefinition>) -> Vec<ClaudeTool> {
    tools
        .into_iter()
        .map(|t| ClaudeTool {
            name: t.name,
            description: t.description,
            input_schema: t.parameters,
        })
        .collect()
}

/// Convert a Claude API response to an `LLMResponse`.
fn convert_response(response: ClaudeResponse) -> LLMResponse {
    let blocks = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ClaudeResponseBlock::Text { text } => Some(ContentBlock::text(text)),
            ClaudeResponseBlock::ToolUse { id, name, input } => {
                Some(ContentBlock::tool_use(id, name, input))
            }
            ClaudeResponseBlock::Unsupported => None,
        })
        .collect();

    let mut converted = LLMResponse::from_blocks(blocks).with_usage(Usage::new(
        response.usage.input_tokens,
        response.usage.output_tokens,
    ));
    if let Some(reason) = response.stop_reason {
        converted = converted.with_stop_reason(StopReason::parse(&reason));
    }
    converted
}

// ============================================================================
// Tests
// ============================================================================
