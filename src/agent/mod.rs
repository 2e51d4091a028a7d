//! Agent module - the orchestration loop and its collaborators
//!
//! - `AgentLoop`: sends the transcript to the model, dispatches requested
//!   tools, compacts history, and repeats until a final answer
//! - `compaction`: strategies for shrinking long transcripts
//! - `ContextBuilder`: the system prompt
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │  AgentLoop  │────>│ execute_with_   │────>│ LLMProvider │
//! │             │     │ retry           │     │  (Claude)   │
//! └─────────────┘     └─────────────────┘     └─────────────┘
//!        │
//!        ├──────────────────┬────────────────────┐
//!        ▼                  ▼                    ▼
//! ┌─────────────┐   ┌────────────────┐   ┌──────────────┐
//! │Conversation │   │ ToolDispatcher │   │  Compaction  │
//! │             │   │                │   │  Strategy    │
//! └─────────────┘   └────────────────┘   └──────────────┘
//! ```

pub mod compaction;
mod context;
mod r#loop;

pub use compaction::{CompactionStrategy, NoCompaction, SummarizeCompaction};
pub use context::{ContextBuilder, RuntimeContext};
pub use r#loop::{AgentLoop, AgentSettings, CONTINUE_PROMPT, MAX_CONSECUTIVE_TRUNCATIONS};
