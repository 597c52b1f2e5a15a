//! Checkpoint backends for Lumeo.
//!
//! Both implement `lumeo_core::Checkpointer`. Use [`from_config`] to pick
//! one from the `[memory]` config section.

pub mod file_backend;
pub mod in_memory;

use std::path::PathBuf;
use std::sync::Arc;

use lumeo_core::Checkpointer;

pub use file_backend::FileCheckpointer;
pub use in_memory::InMemoryCheckpointer;

/// Build the checkpointer named by `backend` ("in_memory" or "file").
///
/// `dir` is only used by the file backend. Unknown names fall back to
/// the in-memory store.
pub fn from_config(backend: &str, dir: PathBuf) -> Arc<dyn Checkpointer> {
    match backend {
        "file" => Arc::new(FileCheckpointer::new(dir)),
        _ => Arc::new(InMemoryCheckpointer::new()),
    }
}
