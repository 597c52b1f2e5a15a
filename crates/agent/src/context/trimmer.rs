//! History trimmer.
//!
//! Picks the longest suffix of a thread's history that fits the token
//! budget (system prompt allowance included) and is structurally valid for
//! the model: it starts on a user message and ends on a user or tool
//! message. Messages are always kept whole.

use std::sync::Arc;

use lumeo_core::error::TrimError;
use lumeo_core::message::{Message, Role};

use super::token::{CharHeuristic, TokenCounter};

/// Default token budget for a prompt.
pub const DEFAULT_MAX_TOKENS: usize = 15_000;

#[derive(Clone)]
pub struct Trimmer {
    counter: Arc<dyn TokenCounter>,
    max_tokens: usize,
    system_allowance: usize,
}

impl Trimmer {
    /// A trimmer using the character heuristic.
    pub fn new(max_tokens: usize, system_allowance: usize) -> Self {
        Self::with_counter(Arc::new(CharHeuristic), max_tokens, system_allowance)
    }

    pub fn with_counter(
        counter: Arc<dyn TokenCounter>,
        max_tokens: usize,
        system_allowance: usize,
    ) -> Self {
        Self {
            counter,
            max_tokens,
            system_allowance,
        }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn system_allowance(&self) -> usize {
        self.system_allowance
    }

    fn cost(&self, window: &[Message]) -> usize {
        self.counter.count(window) + self.system_allowance
    }

    /// Return the trimmed window. The input is never modified.
    pub fn trim(&self, messages: &[Message]) -> Result<Vec<Message>, TrimError> {
        // Drop trailing messages until the window ends on user or tool.
        let end = messages
            .iter()
            .rposition(|m| matches!(m.role, Role::User | Role::Tool))
            .map(|i| i + 1)
            .ok_or(TrimError::NoValidWindow)?;

        let newest = self.cost(&messages[end - 1..end]);
        if newest > self.max_tokens {
            return Err(TrimError::BudgetExceeded {
                required: newest,
                budget: self.max_tokens,
            });
        }

        // Grow the window backwards, one whole message at a time.
        let mut start = end - 1;
        while start > 0 && self.cost(&messages[start - 1..end]) <= self.max_tokens {
            start -= 1;
        }

        // The window must open on a user message.
        let first_user = messages[start..end]
            .iter()
            .position(|m| m.role == Role::User)
            .ok_or(TrimError::NoValidWindow)?;

        Ok(messages[start + first_user..end].to_vec())
    }
}
