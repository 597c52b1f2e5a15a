//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token.
//! This approximation is close enough for BPE tokenizers on English text
//! and keeps trimming deterministic in tests.

use lumeo_core::message::Message;

/// Counts tokens over an arbitrary subsequence of messages.
///
/// Counting a whole slice (rather than summing per message) lets an
/// implementation charge for framing that only appears once per prompt.
pub trait TokenCounter: Send + Sync {
    fn count(&self, messages: &[Message]) -> usize;
}

/// The ~4 chars/token heuristic with a fixed per-message overhead.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharHeuristic;

impl TokenCounter for CharHeuristic {
    fn count(&self, messages: &[Message]) -> usize {
        estimate_messages_tokens(messages)
    }
}

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for a single message including per-message overhead.
///
/// Each message costs ~4 tokens of overhead for role name, delimiters,
/// and formatting markers in the API wire format. Tool calls are charged
/// for their name and raw arguments.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let overhead = 4;
    let calls: usize = message
        .tool_calls
        .iter()
        .map(|tc| estimate_tokens(&tc.name) + estimate_tokens(&tc.arguments))
        .sum();
    overhead + estimate_tokens(&message.content) + calls
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
