//! Session module - the in-memory conversation store
//!
//! This module provides the transcript types and the `Conversation` store
//! owned by a single `AgentLoop`. The store is mutated in exactly three ways:
//! appending a message, replacing the whole transcript after compaction, and
//! trimming the oldest messages.
//!
//! # Example
//!
//! ```
//! use loopclaw::session::{Conversation, Message};
//!
//! let mut conversation = Conversation::new();
//! conversation.push_user_text("Hello!");
//! conversation.push(Message::assistant("Hi there!"));
//! assert_eq!(conversation.len(), 2);
//! assert!(conversation.pairing_violations().is_empty());
//! ```

mod history;
pub mod types;

pub use history::trim_history;
pub use types::{ContentBlock, Message, Role, ToolUse};

use std::collections::HashSet;

/// Ordered, append-only (until compacted or trimmed) session transcript.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a conversation from existing messages.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Last message, if any.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append user text, keeping strict alternation.
    ///
    /// When the transcript already ends with a user message (a previous run
    /// failed or was cancelled before the model answered), the text is added
    /// as another block of that message instead of a second user message.
    pub fn push_user_text(&mut self, text: &str) {
        match self.messages.last_mut() {
            Some(last) if last.role == Role::User => {
                last.content.push(ContentBlock::text(text));
            }
            _ => self.messages.push(Message::user(text)),
        }
    }

    /// Replace the whole transcript (compaction result).
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Trim to at most `max_messages`. See [`trim_history`].
    pub fn trim(&mut self, max_messages: usize) -> usize {
        trim_history(&mut self.messages, max_messages)
    }

    /// Consume the store and return its messages.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Describe every violation of the tool-use/tool-result pairing rule.
    ///
    /// Each `ToolUse` in an assistant message must be answered by exactly one
    /// `ToolResult` with the same id in the very next message, and every
    /// `ToolResult` must answer a `ToolUse` in the message before it. A
    /// trailing assistant message whose tool uses are still being dispatched
    /// is not reported.
    pub fn pairing_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for (i, msg) in self.messages.iter().enumerate() {
            if msg.role == Role::Assistant && msg.has_tool_results() {
                violations.push(format!("message {} is assistant with tool results", i));
            }

            let expected: Vec<String> = if msg.role == Role::Assistant {
                msg.tool_uses().into_iter().map(|u| u.id).collect()
            } else {
                Vec::new()
            };

            let next = self.messages.get(i + 1);
            if next.is_none() {
                continue;
            }
            let answered: Vec<&str> = next.map(|n| n.tool_result_ids()).unwrap_or_default();

            for id in &expected {
                let count = answered.iter().filter(|a| **a == id.as_str()).count();
                if count != 1 {
                    violations.push(format!(
                        "tool use '{}' in message {} has {} results in message {}",
                        id,
                        i,
                        count,
                        i + 1
                    ));
                }
            }

            let expected_set: HashSet<&str> = expected.iter().map(String::as_str).collect();
            for id in answered {
                if !expected_set.contains(id) {
                    violations.push(format!(
                        "tool result '{}' in message {} has no matching tool use",
                        id,
                        i + 1
                    ));
                }
            }
        }

        if let Some(first) = self.messages.first() {
            for id in first.tool_result_ids() {
                violations.push(format!(
                    "tool result '{}' in message 0 has no matching tool use",
                    id
                ));
            }
        }

        violations
    }

    /// Whether roles strictly alternate starting with a user message.
    pub fn is_alternating(&self) -> bool {
        self.messages.iter().enumerate().all(|(i, m)| {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            m.role == expected
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_round(id: &str) -> (Message, Message) {
        (
            Message::with_blocks(
                Role::Assistant,
                vec![ContentBlock::tool_use(id, "bash", json!({"command": "ls"}))],
            ),
            Message::tool_results(vec![ContentBlock::tool_result(id, "ok")]),
        )
    }

    #[test]
    fn test_push_user_text_merges_trailing_user() {
        let mut conv = Conversation::new();
        conv.push_user_text("first");
        conv.push_user_text("second");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].content.len(), 2);
        assert!(conv.is_alternating());
    }

    #[test]
    fn test_pairing_ok() {
        let (a, r) = tool_round("t1");
        let conv =
            Conversation::from_messages(vec![Message::user("hi"), a, r, Message::assistant("done")]);
        assert!(conv.pairing_violations().is_empty());
        assert!(conv.is_alternating());
    }

    #[test]
    fn test_pairing_detects_missing_result() {
        let (a, _) = tool_round("t1");
        let conv = Conversation::from_messages(vec![
            Message::user("hi"),
            a,
            Message::user("no results here"),
        ]);
        let v = conv.pairing_violations();
        assert_eq!(v.len(), 1);
        assert!(v[0].contains("t1"));
    }

    #[test]
    fn test_pairing_detects_orphan_result() {
        let (_, r) = tool_round("t9");
        let conv = Conversation::from_messages(vec![r, Message::assistant("x")]);
        assert!(!conv.pairing_violations().is_empty());
    }

    #[test]
    fn test_pending_tool_use_not_a_violation() {
        let (a, _) = tool_round("t1");
        let conv = Conversation::from_messages(vec![Message::user("hi"), a]);
        assert!(conv.pairing_violations().is_empty());
    }
}
