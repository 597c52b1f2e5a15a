//! History management: token counting and trimming.
//!
//! The model only ever sees a window of the thread's history. The window
//! is recomputed on every model call and never persisted.

pub mod token;
pub mod trimmer;

pub use token::{CharHeuristic, TokenCounter};
pub use trimmer::{DEFAULT_MAX_TOKENS, Trimmer};
