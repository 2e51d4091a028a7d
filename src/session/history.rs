//! Conversation history trimming.
//!
//! The trimmer is the count-based backstop behind compaction: whenever the
//! transcript grows past `max_conversation_messages`, the oldest messages are
//! dropped. Removal is FIFO, with one refinement: a leading user message
//! whose tool results lost their tool-use request to the cut is dropped as
//! well, so trimming never leaves an orphaned `ToolResult` at the head.

use tracing::info;

use super::Message;

/// Trim `messages` to at most `max_messages` entries, oldest first.
///
/// A `max_messages` of zero disables trimming. The newest message is always
/// kept. Returns the number of messages removed.
///
/// # Example
/// ```
/// use loopclaw::session::{trim_history, Message};
///
/// let mut msgs: Vec<Message> = (0..10)
///     .map(|i| if i % 2 == 0 { Message::user(&i.to_string()) } else { Message::assistant(&i.to_string()) })
///     .collect();
/// let removed = trim_history(&mut msgs, 3);
/// assert_eq!(removed, 7);
/// assert_eq!(msgs.len(), 3);
/// assert_eq!(msgs[0].text(), "7");
/// ```
pub fn trim_history(messages: &mut Vec<Message>, max_messages: usize) -> usize {
    if max_messages == 0 || messages.len() <= max_messages {
        return 0;
    }

    let mut remove = messages.len() - max_messages;
    // The message before the cut is gone, so any tool results at the new
    // head have nothing to pair with.
    while remove + 1 < messages.len() && messages[remove].has_tool_results() {
        remove += 1;
    }

    messages.drain(..remove);
    info!(
        removed = remove,
        limit = max_messages,
        remaining = messages.len(),
        "Conversation history trimmed"
    );
    remove
}
