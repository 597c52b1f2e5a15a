//! File-based checkpointer: one JSON document per thread.
//!
//! Storage location: `~/.lumeo/threads/<thread-id>.json` by default.
//! Each file holds the latest [`Checkpoint`] of its thread and is replaced
//! wholesale on every save (written to a sibling temp file, then renamed).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lumeo_core::checkpoint::{Checkpoint, Checkpointer};
use lumeo_core::error::CheckpointError;
use lumeo_core::message::ThreadId;
use tracing::{debug, warn};

/// A directory of per-thread checkpoint files.
pub struct FileCheckpointer {
    dir: PathBuf,
}

impl FileCheckpointer {
    /// Create a checkpointer rooted at `dir`. The directory is created on
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        debug!(dir = %dir.display(), "File checkpointer ready");
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, thread_id: &ThreadId) -> PathBuf {
        // Thread ids are opaque; percent-encode anything unsafe in a file name.
        self.dir.join(format!("{}.json", urlencoding::encode(thread_id.as_str())))
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, CheckpointError> {
        let path = self.path_for(thread_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CheckpointError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let checkpoint: Checkpoint =
            serde_json::from_str(&content).map_err(|e| CheckpointError::Corrupted {
                thread_id: thread_id.to_string(),
                reason: e.to_string(),
            })?;
        if &checkpoint.thread_id != thread_id {
            return Err(CheckpointError::Corrupted {
                thread_id: thread_id.to_string(),
                reason: format!("file belongs to thread {}", checkpoint.thread_id),
            });
        }
        Ok(Some(checkpoint))
    }

    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            CheckpointError::Storage(format!("Failed to create thread directory: {e}"))
        })?;

        let json = serde_json::to_string_pretty(checkpoint).map_err(|e| {
            CheckpointError::Storage(format!("Failed to serialize checkpoint: {e}"))
        })?;

        let path = self.path_for(&checkpoint.thread_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| CheckpointError::Storage(format!("Failed to write checkpoint: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CheckpointError::Storage(format!("Failed to replace checkpoint: {e}")))?;

        debug!(
            thread = %checkpoint.thread_id,
            node = %checkpoint.node,
            step = checkpoint.step,
            "Checkpoint saved"
        );
        Ok(())
    }

    async fn delete(&self, thread_id: &ThreadId) -> Result<bool, CheckpointError> {
        match tokio::fs::remove_file(self.path_for(thread_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CheckpointError::Storage(format!(
                "Failed to delete checkpoint: {e}"
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<ThreadId>, CheckpointError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CheckpointError::Storage(e.to_string())),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match urlencoding::decode(stem) {
                Ok(id) => ids.push(ThreadId(id.into_owned())),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Skipping unrecognised checkpoint file")
                }
            }
        }
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumeo_core::checkpoint::Node;
    use lumeo_core::message::{Message, MessageToolCall};
    use tempfile::TempDir;

    fn sample(thread: &str) -> Checkpoint {
        let mut cp = Checkpoint::empty(ThreadId::from(thread));
        cp.state.push(Message::user("weather in Paris?")).unwrap();
        cp.state
            .push(Message::assistant_with_tool_calls(
                "",
                vec![MessageToolCall {
                    id: "call_1".into(),
                    name: "web_search".into(),
                    arguments: r#"{"query":"paris weather"}"#.into(),
                }],
            ))
            .unwrap();
        cp.state
            .push(Message::tool_result("call_1", r#"{"results":[]}"#))
            .unwrap();
        cp.advance(Node::Tools);
        cp
    }

    #[tokio::test]
    async fn survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("threads");

        let saved = sample("t1");
        {
            let store = FileCheckpointer::new(&dir);
            store.put(&saved).await.unwrap();
        }

        let store = FileCheckpointer::new(&dir);
        let loaded = store.get(&ThreadId::from("t1")).await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.node, Node::Tools);
        assert!(!dir.join("t1.json.tmp").exists());
    }

    #[tokio::test]
    async fn missing_thread_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = FileCheckpointer::new(tmp.path());
        assert!(store.get(&ThreadId::from("nope")).await.unwrap().is_none());
        assert!(!store.delete(&ThreadId::from("nope")).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn odd_thread_ids_round_trip_through_list() {
        let tmp = TempDir::new().unwrap();
        let store = FileCheckpointer::new(tmp.path());
        store.put(&sample("user/42:main")).await.unwrap();
        store.put(&sample("plain-id")).await.unwrap();

        let ids = store.list().await.unwrap();
        assert_eq!(ids, vec![ThreadId::from("plain-id"), ThreadId::from("user/42:main")]);
        assert!(store.get(&ThreadId::from("user/42:main")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn corrupted_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        let store = FileCheckpointer::new(tmp.path());
        std::fs::write(tmp.path().join("bad.json"), "{ not json").unwrap();

        let err = store.get(&ThreadId::from("bad")).await.unwrap_err();
        assert!(matches!(err, CheckpointError::Corrupted { thread_id, .. } if thread_id == "bad"));
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let tmp = TempDir::new().unwrap();
        let store = FileCheckpointer::new(tmp.path());
        store.put(&sample("t1")).await.unwrap();
        assert!(store.delete(&ThreadId::from("t1")).await.unwrap());
        assert!(store.get(&ThreadId::from("t1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unsafe_ids_are_escaped_on_disk() {
        let tmp = TempDir::new().unwrap();
        let store = FileCheckpointer::new(tmp.path());
        store.put(&sample("user/42:main")).await.unwrap();
        store.put(&sample("abc-1_2")).await.unwrap();

        assert!(tmp.path().join("user%2F42%3Amain.json").exists());
        assert!(tmp.path().join("abc-1_2.json").exists());
    }
}
