//! The conversational workflow of Lumeo.
//!
//! Each turn runs a small graph:
//!
//! 1. **Append** the user message to the thread and checkpoint
//! 2. **llm_with_tools**: if web search is on, ask the tool-bound model
//!    whether it wants to search
//! 3. **Route**: pending tool calls go to the tool executor, everything
//!    else straight to the answering model
//! 4. **tools**: run each search and append its result
//! 5. **llm**: stream the answer, append it and checkpoint
//!
//! History is trimmed to the token budget before every model call.

pub mod context;
pub mod prompt;
pub mod router;
pub mod session;
pub mod stream_event;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{CharHeuristic, TokenCounter, Trimmer};
pub use prompt::{Persona, Prompt, PromptTemplate, compose};
pub use router::{Route, route};
pub use session::{ChatSession, EntryKind, MAX_INPUT_CHARS, TranscriptEntry};
pub use stream_event::TurnEvent;
pub use workflow::{TurnStream, Workflow};
