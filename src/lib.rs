//! LoopClaw - conversational tool-calling agent runtime

pub mod agent;
pub mod config;
pub mod error;
pub mod providers;
pub mod session;
pub mod tools;
pub mod utils;

pub use agent::{AgentLoop, AgentSettings};
pub use config::Config;
pub use error::{LoopError, ProviderError, Result};
pub use providers::{
    ChatOptions, ClaudeProvider, LLMProvider, LLMResponse, StopReason, ToolDefinition, Usage,
};
pub use session::{ContentBlock, Conversation, Message, Role, ToolUse};
pub use tools::{Tool, ToolContext, ToolDispatcher, ToolRegistry};
