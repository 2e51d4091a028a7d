//! Agent loop implementation
//!
//! One `AgentLoop` owns one conversation. Each call to [`AgentLoop::run`]
//! appends the user's input and then alternates model calls and tool rounds
//! until the model answers without requesting tools.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{LoopError, ProviderError, Result};
use crate::providers::retry::is_retryable;
use crate::providers::{
    execute_with_retry, ChatOptions, LLMProvider, LLMResponse, RetryPolicy, StopReason,
    StreamEvent, Usage,
};
use crate::session::{Conversation, Message};
use crate::tools::{ToolContext, ToolDispatcher, ToolRegistry};

use super::compaction::{build_compaction, CompactionStrategy, NoCompaction};
use super::context::{ContextBuilder, RuntimeContext};

/// Consecutive output-capped responses tolerated before giving up.
pub const MAX_CONSECUTIVE_TRUNCATIONS: u32 = 3;

/// Sent after a response was cut off by the output token cap.
pub const CONTINUE_PROMPT: &str =
    "Your response was cut off by the output token limit. Please continue, and be more concise.";

/// Per-call model settings.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_conversation_messages: usize,
    pub system_prompt: String,
    pub working_dir: Option<PathBuf>,
}

impl AgentSettings {
    /// Settings from the `agent` config section with the default system prompt.
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.agent.model.clone(),
            max_tokens: config.agent.max_tokens,
            temperature: config.agent.temperature,
            max_conversation_messages: config.agent.max_conversation_messages,
            system_prompt: ContextBuilder::new().build_system_prompt(),
            working_dir: config.working_dir(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The agent orchestration loop.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use loopclaw::agent::{AgentLoop, AgentSettings};
/// use loopclaw::providers::ClaudeProvider;
/// use loopclaw::tools::{EchoTool, ToolDispatcher, ToolRegistry};
/// use tokio_util::sync::CancellationToken;
///
/// let mut registry = ToolRegistry::new();
/// registry.register(EchoTool);
/// let provider = Arc::new(ClaudeProvider::new("your-api-key"));
/// let mut agent = AgentLoop::new(provider, ToolDispatcher::new(registry, 40_000), AgentSettings::default());
///
/// let answer = agent.run("Say hi", &CancellationToken::new(), None).await?;
/// ```
pub struct AgentLoop {
    provider: Arc<dyn LLMProvider>,
    dispatcher: ToolDispatcher,
    compaction: Arc<dyn CompactionStrategy>,
    retry: RetryPolicy,
    settings: AgentSettings,
    conversation: Conversation,
}

impl AgentLoop {
    /// Create a loop with no compaction and the default LLM retry policy.
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        dispatcher: ToolDispatcher,
        settings: AgentSettings,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            compaction: Arc::new(NoCompaction),
            retry: RetryPolicy::llm(),
            settings,
            conversation: Conversation::new(),
        }
    }

    /// Wire a loop from configuration: settings, compaction strategy, retry
    /// policy, and a system prompt that lists the registered tools.
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn LLMProvider>,
        registry: ToolRegistry,
    ) -> Self {
        let mut settings = AgentSettings::from_config(config);
        let mut runtime = RuntimeContext::new()
            .with_tools(registry.names().into_iter().map(String::from).collect())
            .with_os_info();
        if let Some(dir) = &settings.working_dir {
            runtime = runtime.with_working_dir(&dir.to_string_lossy());
        }
        settings.system_prompt = ContextBuilder::new()
            .with_runtime_context(runtime)
            .build_system_prompt();

        let compaction = build_compaction(config, Arc::clone(&provider));
        let dispatcher = ToolDispatcher::new(registry, config.agent.max_tool_result_chars);

        Self::new(provider, dispatcher, settings)
            .with_compaction(compaction)
            .with_retry(RetryPolicy::llm_from_config(&config.retry))
    }

    pub fn with_compaction(mut self, compaction: Arc<dyn CompactionStrategy>) -> Self {
        self.compaction = compaction;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The transcript so far.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Drop the transcript and start a fresh conversation.
    pub fn reset(&mut self) {
        self.conversation = Conversation::new();
    }

    /// Run one user turn to completion.
    ///
    /// Returns the concatenated text of the final assistant message. When
    /// `deltas` is given the model is called in streaming mode and text is
    /// forwarded as it arrives. Cancellation returns [`LoopError::Cancelled`]
    /// and never leaves a tool use without its results.
    pub async fn run(
        &mut self,
        input: &str,
        cancel: &CancellationToken,
        deltas: Option<&mpsc::Sender<String>>,
    ) -> Result<String> {
        let span = info_span!("run", run_id = %Uuid::new_v4());
        self.run_inner(input, cancel, deltas).instrument(span).await
    }

    async fn run_inner(
        &mut self,
        input: &str,
        cancel: &CancellationToken,
        deltas: Option<&mpsc::Sender<String>>,
    ) -> Result<String> {
        self.conversation.push_user_text(input);
        self.conversation
            .trim(self.settings.max_conversation_messages);

        let mut truncations: u32 = 0;
        let mut round: u32 = 0;
        let mut usage = Usage::default();

        loop {
            round += 1;
            if cancel.is_cancelled() {
                return Err(LoopError::Cancelled);
            }

            if let Some(compacted) = self
                .compaction
                .maybe_compact(self.conversation.messages(), cancel)
                .await?
            {
                self.conversation.replace_all(compacted);
            }

            let response = self.call_model(cancel, deltas).await?;
            if let Some(u) = &response.usage {
                usage.input_tokens += u.input_tokens;
                usage.output_tokens += u.output_tokens;
            }

            let tool_uses = response.tool_uses();
            debug!(
                round,
                stop_reason = ?response.stop_reason,
                tool_uses = tool_uses.len(),
                "Model responded"
            );
            let text = response.message.text();
            self.conversation.push(response.message);
            self.conversation
                .trim(self.settings.max_conversation_messages);

            if response.stop_reason == StopReason::MaxTokens && tool_uses.is_empty() {
                truncations += 1;
                if truncations >= MAX_CONSECUTIVE_TRUNCATIONS {
                    warn!(
                        max_tokens = self.settings.max_tokens,
                        attempts = truncations,
                        "Giving up after repeated output truncation"
                    );
                    return Err(LoopError::MaxOutputExceeded {
                        max_tokens: self.settings.max_tokens,
                        attempts: truncations,
                    });
                }
                warn!(
                    attempt = truncations,
                    max_tokens = self.settings.max_tokens,
                    "Response cut off by output token limit, asking model to continue"
                );
                self.conversation.push_user_text(CONTINUE_PROMPT);
                self.conversation
                    .trim(self.settings.max_conversation_messages);
                continue;
            }
            truncations = 0;

            if tool_uses.is_empty() {
                info!(
                    rounds = round,
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "Run complete"
                );
                return Ok(text);
            }

            let mut ctx = ToolContext::new().with_cancel(cancel.clone());
            if let Some(dir) = &self.settings.working_dir {
                ctx = ctx.with_working_dir(dir);
            }
            let results = self.dispatcher.dispatch(&tool_uses, &ctx).await;
            self.conversation.push(Message::tool_results(results));
            self.conversation
                .trim(self.settings.max_conversation_messages);

            if cancel.is_cancelled() {
                return Err(LoopError::Cancelled);
            }
        }
    }

    async fn call_model(
        &self,
        cancel: &CancellationToken,
        deltas: Option<&mpsc::Sender<String>>,
    ) -> Result<LLMResponse> {
        let messages = self.conversation.messages().to_vec();
        let tools = self.dispatcher.registry().definitions();
        let options = ChatOptions::new()
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(self.settings.temperature)
            .with_system(self.settings.system_prompt.clone());
        let model = Some(self.settings.model.as_str());

        execute_with_retry(&self.retry, "llm_chat", cancel, || {
            let messages = messages.clone();
            let tools = tools.clone();
            let options = options.clone();
            async move {
                let Some(tx) = deltas else {
                    return self.provider.chat(messages, tools, model, options).await;
                };
                let mut rx = self
                    .provider
                    .chat_stream(messages, tools, model, options)
                    .await?;
                let mut forwarded = false;
                while let Some(event) = rx.recv().await {
                    match event {
                        StreamEvent::Delta(text) => {
                            forwarded = true;
                            let _ = tx.send(text).await;
                        }
                        StreamEvent::Done(response) => return Ok(response),
                        StreamEvent::Error(e) => return Err(stream_failure(e, forwarded)),
                    }
                }
                Err(stream_failure(
                    LoopError::ProviderTyped(ProviderError::Connection(
                        "stream ended without a final response".to_string(),
                    )),
                    forwarded,
                ))
            }
        })
        .await
    }
}

/// Text already shown to the user cannot be taken back, so a stream that
/// fails after its first delta is not retried.
fn stream_failure(err: LoopError, forwarded: bool) -> LoopError {
    if forwarded && is_retryable(&err) {
        warn!(error = %err, "Stream failed after partial output, not retrying");
        return LoopError::Provider(format!("stream interrupted after partial output: {}", err));
    }
    err
}
