//! Checkpoint trait: per-thread persistence of conversation state and
//! workflow position.
//!
//! The workflow writes a checkpoint after every node, so a new turn always
//! resumes from the latest persisted state instead of replaying history.
//! Backends are swappable: in-memory (default), one-file-per-thread, or
//! anything else that implements [`Checkpointer`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CheckpointError;
use crate::message::{ConversationState, ThreadId};

/// A position in the turn graph: the last node that completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// The user message was appended; no node has run yet.
    Input,
    /// Model bound with the search tool (entry node).
    LlmWithTools,
    /// Tool executor.
    Tools,
    /// Plain model producing the streamed answer (terminal).
    Llm,
}

impl Node {
    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Input => "input",
            Node::LlmWithTools => "llm_with_tools",
            Node::Tools => "tools",
            Node::Llm => "llm",
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The latest saved state of a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: ThreadId,

    pub state: ConversationState,

    /// Last node completed
    pub node: Node,

    /// Monotonic counter, bumped on every save
    pub step: u64,

    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// An empty checkpoint for a thread that has never been saved.
    pub fn empty(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            state: ConversationState::new(),
            node: Node::Input,
            step: 0,
            updated_at: Utc::now(),
        }
    }

    /// Record that `node` completed, bumping the step counter.
    pub fn advance(&mut self, node: Node) {
        self.node = node;
        self.step += 1;
        self.updated_at = Utc::now();
    }
}

/// The checkpoint store: a key-value store keyed by thread id.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// The backend name (e.g., "in_memory", "file").
    fn name(&self) -> &str;

    /// Load the latest checkpoint of a thread.
    async fn get(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Save a checkpoint, replacing the previous one for the same thread.
    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Forget a thread. Returns whether anything was stored.
    async fn delete(&self, thread_id: &ThreadId) -> Result<bool, CheckpointError>;

    /// All thread ids that currently have a checkpoint.
    async fn list(&self) -> Result<Vec<ThreadId>, CheckpointError>;
}
