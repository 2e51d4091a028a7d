//! Context compaction for long-running conversations.
//!
//! After every tool round the agent loop asks its [`CompactionStrategy`]
//! whether the transcript should shrink. [`SummarizeCompaction`] estimates
//! the transcript's token footprint and, once it crosses the threshold,
//! replaces everything between the first message and a protected tail with
//! a model-written summary:
//!
//! ```text
//! [anchor] [ ...compactable span... ] [protected tail]
//!     |              |
//!     +--- merged ---+-> [anchor + CONTEXT SUMMARY] [ack?] [protected tail]
//! ```
//!
//! The cut point is moved earlier until no tool-use request is separated
//! from its results, and an assistant acknowledgment is inserted when the
//! tail starts with a user message. A failed summary leaves the history
//! untouched; the trimmer remains the backstop.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{CompactionStrategyKind, Config};
use crate::error::{LoopError, Result};
use crate::providers::{execute_with_retry, ChatOptions, LLMProvider, RetryPolicy};
use crate::session::{ContentBlock, Message, Role};
use crate::utils::string::{head_tail, preview};

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

const TOOL_INPUT_PREVIEW_CHARS: usize = 200;
const RESULT_PREVIEW_HEAD: usize = 500;
const RESULT_PREVIEW_TAIL: usize = 200;
const TRANSCRIPT_HALF_CHARS: usize = 50_000;
const SUMMARY_MAX_TOKENS: u32 = 4096;

const ACKNOWLEDGMENT: &str = "Understood. Continuing with the current task.";

const SUMMARIZE_PROMPT: &str = "Summarize the following conversation history between a user and an AI assistant.
Preserve these details precisely:
- The original user request and any specific criteria or instructions
- All decisions made and their reasoning
- Key data points, URLs, file paths, and identifiers that may be needed later
- Any scores, rankings, or evaluations produced
- Current task status and next steps

Do NOT include raw tool output data (job descriptions, email bodies, etc.); just note what was retrieved and key findings.

Format as a concise narrative summary.

---
CONVERSATION HISTORY:

";

/// A policy for shrinking the transcript between rounds.
#[async_trait]
pub trait CompactionStrategy: Send + Sync {
    /// Return a replacement transcript, or `None` to keep `messages` as is.
    ///
    /// Only cancellation is reported as an error; any other failure means
    /// "leave the history alone this round".
    async fn maybe_compact(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<Message>>>;

    fn name(&self) -> &str;
}

/// Never compacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompaction;

#[async_trait]
impl CompactionStrategy for NoCompaction {
    async fn maybe_compact(
        &self,
        _messages: &[Message],
        _cancel: &CancellationToken,
    ) -> Result<Option<Vec<Message>>> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Summarizes the middle of the conversation with one extra model call.
pub struct SummarizeCompaction {
    provider: Arc<dyn LLMProvider>,
    model: String,
    retry: RetryPolicy,
    threshold_tokens: usize,
    protected_tail: usize,
}

impl SummarizeCompaction {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        model: impl Into<String>,
        threshold_tokens: usize,
        protected_tail: usize,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            retry: RetryPolicy::llm(),
            threshold_tokens,
            protected_tail,
        }
    }

    /// Override the retry policy for the summary call.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn summarize(&self, span: &[Message], cancel: &CancellationToken) -> Result<String> {
        let transcript = format_for_summarization(span);
        let transcript = head_tail(
            &transcript,
            TRANSCRIPT_HALF_CHARS,
            TRANSCRIPT_HALF_CHARS,
            "\n\n[...middle of conversation omitted for brevity...]\n\n",
        );
        let request = vec![Message::user(&format!("{}{}", SUMMARIZE_PROMPT, transcript))];
        let options = ChatOptions::new()
            .with_max_tokens(SUMMARY_MAX_TOKENS)
            .with_temperature(0.0);

        let response = execute_with_retry(&self.retry, "compaction_summary", cancel, || {
            self.provider.chat(
                request.clone(),
                Vec::new(),
                Some(self.model.as_str()),
                options.clone(),
            )
        })
        .await?;

        let summary = response.message.text().trim().to_string();
        if summary.is_empty() {
            return Err(LoopError::Compaction(
                "model returned an empty summary".to_string(),
            ));
        }
        Ok(summary)
    }
}

#[async_trait]
impl CompactionStrategy for SummarizeCompaction {
    async fn maybe_compact(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<Message>>> {
        let estimated = estimate_tokens(messages);
        if estimated < self.threshold_tokens || messages.len() < 2 {
            return Ok(None);
        }

        let start = 1;
        let naive_end = messages.len().saturating_sub(self.protected_tail);
        if naive_end <= start {
            return Ok(None);
        }
        let end = adjust_boundary(messages, start, naive_end);
        if end <= start {
            return Ok(None);
        }

        info!(
            estimated_tokens = estimated,
            threshold = self.threshold_tokens,
            span = end - start,
            "Compacting conversation history"
        );

        let summary = match self.summarize(&messages[start..end], cancel).await {
            Ok(summary) => summary,
            Err(LoopError::Cancelled) => return Err(LoopError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Compaction failed, falling back to history trimming");
                return Ok(None);
            }
        };

        let rebuilt = rebuild(messages, end, &summary);
        let after = estimate_tokens(&rebuilt);
        info!(
            messages_compacted = end - start,
            tokens_before = estimated,
            tokens_after = after,
            tokens_freed = estimated.saturating_sub(after),
            summary_tokens = summary.chars().count() / CHARS_PER_TOKEN,
            "Conversation compacted"
        );
        Ok(Some(rebuilt))
    }

    fn name(&self) -> &str {
        "summarize"
    }
}

/// Build the strategy named in the configuration.
pub fn build_compaction(
    config: &Config,
    provider: Arc<dyn LLMProvider>,
) -> Arc<dyn CompactionStrategy> {
    match config.compaction.strategy {
        CompactionStrategyKind::None => Arc::new(NoCompaction),
        CompactionStrategyKind::Summarize => Arc::new(
            SummarizeCompaction::new(
                provider,
                config.agent.model.clone(),
                config.compaction.threshold_tokens,
                config.compaction.protected_tail_messages,
            )
            .with_retry(RetryPolicy::llm_from_config(&config.retry)),
        ),
    }
}

/// Approximate token count: characters of text, tool names, serialized
/// tool inputs and tool-result text, divided by [`CHARS_PER_TOKEN`].
pub fn estimate_tokens(messages: &[Message]) -> usize {
    let chars: usize = messages
        .iter()
        .flat_map(|m| m.content.iter())
        .map(|block| match block {
            ContentBlock::Text { text } => text.chars().count(),
            ContentBlock::ToolUse { name, input, .. } => {
                name.chars().count() + input.to_string().chars().count()
            }
            ContentBlock::ToolResult { content, .. } => content.chars().count(),
        })
        .sum();
    chars / CHARS_PER_TOKEN
}

/// Move `end` earlier while the message just before it requests tools.
///
/// Those requests are answered at `messages[end]`, inside the tail, so
/// cutting there would orphan them. The result may collapse to `start`.
pub fn adjust_boundary(messages: &[Message], start: usize, mut end: usize) -> usize {
    while end > start {
        let boundary = &messages[end - 1];
        if boundary.role != Role::Assistant || !boundary.has_tool_uses() {
            break;
        }
        end -= 1;
    }
    end
}

/// Flatten messages into a readable transcript for the summary prompt.
pub fn format_for_summarization(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|msg| {
            let blocks: Vec<String> = msg
                .content
                .iter()
                .map(|block| match block {
                    ContentBlock::Text { text } => text.clone(),
                    ContentBlock::ToolUse { name, input, .. } => format!(
                        "[Tool call: {}({})]",
                        name,
                        preview(&input.to_string(), TOOL_INPUT_PREVIEW_CHARS)
                    ),
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        ..
                    } => format!(
                        "[Tool result ({})]: {}",
                        tool_use_id,
                        head_tail(
                            content,
                            RESULT_PREVIEW_HEAD,
                            RESULT_PREVIEW_TAIL,
                            "\n[...truncated...]\n"
                        )
                    ),
                })
                .collect();
            format!("[{}]: {}", msg.role, blocks.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn rebuild(messages: &[Message], end: usize, summary: &str) -> Vec<Message> {
    let anchor = format!(
        "{}\n\n[CONTEXT SUMMARY]\n{}\n[END CONTEXT SUMMARY]",
        messages[0].text_lines(),
        summary
    );
    let tail = &messages[end..];

    let mut result = Vec::with_capacity(tail.len() + 2);
    result.push(Message::user(&anchor));
    if tail.first().is_some_and(|m| m.role == Role::User) {
        result.push(Message::assistant(ACKNOWLEDGMENT));
    }
    result.extend_from_slice(tail);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::providers::{LLMResponse, ToolDefinition};
    use crate::session::Conversation;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replies to every call with the next scripted result.
    struct ScriptedSummarizer {
        replies: Mutex<Vec<Result<LLMResponse>>>,
        prompts: Mutex<Vec<(String, ChatOptions)>>,
    }

    impl ScriptedSummarizer {
        fn new(replies: Vec<Result<LLMResponse>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedSummarizer {
        async fn chat(
            &self,
            messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            options: ChatOptions,
        ) -> Result<LLMResponse> {
            self.prompts
                .lock()
                .unwrap()
                .push((messages[0].text(), options));
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Ok(LLMResponse::text("fallback summary"));
            }
            replies.remove(0)
        }

        fn default_model(&self) -> &str {
            "mock"
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn big(n: usize) -> String {
        "x".repeat(n)
    }

    fn tool_call(id: &str) -> Message {
        Message::with_blocks(
            Role::Assistant,
            vec![ContentBlock::tool_use(id, "bash", json!({"command": "ls"}))],
        )
    }

    fn tool_reply(id: &str, text: &str) -> Message {
        Message::tool_results(vec![ContentBlock::tool_result(id, text)])
    }

    fn strategy(provider: Arc<ScriptedSummarizer>, threshold: usize, tail: usize) -> SummarizeCompaction {
        SummarizeCompaction::new(provider, "m", threshold, tail)
            .with_retry(RetryPolicy::new(2, Duration::from_millis(1)))
    }

    /// user, (assistant tool call, user tool result) x rounds, assistant text.
    fn conversation(rounds: usize) -> Vec<Message> {
        let mut msgs = vec![Message::user("find jobs in Berlin")];
        for i in 0..rounds {
            let id = format!("t{}", i);
            msgs.push(tool_call(&id));
            msgs.push(tool_reply(&id, &big(400)));
        }
        msgs.push(Message::assistant("done"));
        msgs
    }

    #[test]
    fn test_estimate_tokens() {
        let msgs = vec![
            Message::user(&big(40)),
            Message::with_blocks(
                Role::Assistant,
                vec![ContentBlock::tool_use("1", "abcd", json!({}))],
            ),
            tool_reply("1", &big(30)),
        ];
        // 40 + (4 + 2) + 30 = 76
        assert_eq!(estimate_tokens(&msgs), 19);
    }

    #[test]
    fn test_adjust_boundary_moves_before_tool_calls() {
        let msgs = vec![
            Message::user("q"),
            Message::assistant("a"),
            Message::user("q2"),
            tool_call("t1"),
            tool_reply("t1", "r"),
        ];
        assert_eq!(adjust_boundary(&msgs, 1, 4), 3);
        assert_eq!(adjust_boundary(&msgs, 1, 3), 3);
    }

    #[test]
    fn test_adjust_boundary_can_collapse() {
        let msgs = vec![Message::user("q"), tool_call("t1"), tool_reply("t1", "r")];
        assert_eq!(adjust_boundary(&msgs, 1, 2), 1);
    }

    #[test]
    fn test_format_for_summarization() {
        let long_input = json!({"content": big(300)});
        let msgs = vec![
            Message::with_blocks(
                Role::Assistant,
                vec![
                    ContentBlock::text("Let me write that."),
                    ContentBlock::tool_use("t9", "write_file", long_input),
                ],
            ),
            tool_reply("t9", &format!("{}{}", "h".repeat(600), "t".repeat(300))),
        ];
        let text = format_for_summarization(&msgs);
        let (first, second) = text.split_once("\n\n").unwrap();

        assert!(first.starts_with("[assistant]: Let me write that.\n[Tool call: write_file("));
        assert!(first.ends_with("...)]"));
        assert!(second.starts_with("[user]: [Tool result (t9)]: "));
        assert!(second.contains("\n[...truncated...]\n"));
        assert!(second.ends_with(&"t".repeat(200)));
    }

    #[test]
    fn test_short_result_not_previewed() {
        let text = format_for_summarization(&[tool_reply("a", &big(700))]);
        assert!(!text.contains("truncated"));
    }

    #[tokio::test]
    async fn test_below_threshold_is_noop() {
        let provider = ScriptedSummarizer::new(vec![]);
        let msgs = conversation(3);
        let out = strategy(provider.clone(), 1_000_000, 2)
            .maybe_compact(&msgs, &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.is_none());
        assert!(provider.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_message_is_noop() {
        let provider = ScriptedSummarizer::new(vec![]);
        let out = strategy(provider, 0, 0)
            .maybe_compact(&[Message::user(&big(10_000))], &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_compacts_span_and_keeps_pairing() {
        let provider = ScriptedSummarizer::new(vec![Ok(LLMResponse::text("User wants Berlin jobs."))]);
        // 8 messages: u, (a,u) x3, a. tail 3 cuts after t1's tool result.
        let msgs = conversation(3);
        let out = strategy(provider.clone(), 10, 3)
            .maybe_compact(&msgs, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        // naive end = 5 (msgs[4] is a tool result), no adjustment needed
        assert_eq!(out.len(), 1 + 3);
        let anchor = out[0].text();
        assert!(anchor.starts_with("find jobs in Berlin\n\n[CONTEXT SUMMARY]\n"));
        assert!(anchor.ends_with("User wants Berlin jobs.\n[END CONTEXT SUMMARY]"));
        assert_eq!(out[1..], msgs[5..]);
        assert!(Conversation::from_messages(out).pairing_violations().is_empty());

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].0.starts_with(SUMMARIZE_PROMPT));
        assert_eq!(prompts[0].1.max_tokens, Some(4096));
        assert_eq!(prompts[0].1.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_boundary_adjusted_before_tool_call() {
        let provider = ScriptedSummarizer::new(vec![Ok(LLMResponse::text("summary"))]);
        // tail 4 puts the naive cut right after the assistant tool call t1
        let msgs = conversation(3);
        let out = strategy(provider, 10, 4)
            .maybe_compact(&msgs, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        // the cut moved from 4 to 3: tail = [t1 call, t1 result, t2 call, t2 result, done]
        assert_eq!(out[1..], msgs[3..]);
        assert_eq!(out[1].role, Role::Assistant);
        assert!(Conversation::from_messages(out).pairing_violations().is_empty());
    }

    #[tokio::test]
    async fn test_ack_inserted_when_tail_starts_with_user() {
        let provider = ScriptedSummarizer::new(vec![Ok(LLMResponse::text("summary"))]);
        let mut msgs = vec![Message::user("start")];
        for i in 0..4 {
            msgs.push(Message::assistant(&big(200)));
            msgs.push(Message::user(&format!("follow-up {}", i)));
        }
        // a protected tail of 3 starts with a user message
        let out = strategy(provider, 10, 3)
            .maybe_compact(&msgs, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(out[1], Message::assistant(ACKNOWLEDGMENT));
        assert_eq!(out[2..], msgs[msgs.len() - 3..]);
        assert!(Conversation::from_messages(out).is_alternating());
    }

    #[tokio::test]
    async fn test_failed_or_empty_summary_leaves_history() {
        let provider = ScriptedSummarizer::new(vec![
            Err(LoopError::ProviderTyped(ProviderError::InvalidRequest("bad".into()))),
            Ok(LLMResponse::text("   ")),
        ]);
        let s = strategy(provider, 10, 3);
        let msgs = conversation(3);
        let cancel = CancellationToken::new();
        assert!(s.maybe_compact(&msgs, &cancel).await.unwrap().is_none());
        assert!(s.maybe_compact(&msgs, &cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_summary_call_retries_transient_failure() {
        let provider = ScriptedSummarizer::new(vec![
            Err(LoopError::ProviderTyped(ProviderError::RateLimit("429".into()))),
            Ok(LLMResponse::text("second try")),
        ]);
        let out = strategy(provider.clone(), 10, 3)
            .maybe_compact(&conversation(3), &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert!(out[0].text().contains("second try"));
        assert_eq!(provider.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_propagates() {
        let provider = ScriptedSummarizer::new(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = strategy(provider, 10, 3)
            .maybe_compact(&conversation(3), &cancel)
            .await;
        assert!(matches!(result, Err(LoopError::Cancelled)));
    }

    #[tokio::test]
    async fn test_build_compaction_from_config() {
        let provider: Arc<dyn LLMProvider> = ScriptedSummarizer::new(vec![]);
        let mut config = Config::default();
        assert_eq!(build_compaction(&config, provider.clone()).name(), "none");
        config.compaction.strategy = CompactionStrategyKind::Summarize;
        assert_eq!(build_compaction(&config, provider).name(), "summarize");
    }
}
