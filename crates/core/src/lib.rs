//! # Lumeo Core
//!
//! Domain types, traits, and error definitions for the Lumeo chat assistant.
//! This crate has **no framework dependencies**: it defines the domain model
//! (messages, threads, checkpoints) and the seams that the other crates
//! implement (model provider, tools, checkpoint storage).

pub mod checkpoint;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use checkpoint::{Checkpoint, Checkpointer, Node};
pub use error::{Error, Result};
pub use message::{ConversationState, Message, MessageToolCall, Role, ThreadId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
