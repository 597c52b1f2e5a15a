//! In-memory checkpointer: the default backend. State lives for the
//! lifetime of the process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lumeo_core::checkpoint::{Checkpoint, Checkpointer};
use lumeo_core::error::CheckpointError;
use lumeo_core::message::ThreadId;
use tokio::sync::RwLock;

/// Stores the latest checkpoint of each thread in a map.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointer {
    threads: Arc<RwLock<HashMap<ThreadId, Checkpoint>>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.threads.read().await.get(thread_id).cloned())
    }

    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.threads
            .write()
            .await
            .insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn delete(&self, thread_id: &ThreadId) -> Result<bool, CheckpointError> {
        Ok(self.threads.write().await.remove(thread_id).is_some())
    }

    async fn list(&self) -> Result<Vec<ThreadId>, CheckpointError> {
        let mut ids: Vec<ThreadId> = self.threads.read().await.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumeo_core::checkpoint::Node;
    use lumeo_core::message::Message;

    #[tokio::test]
    async fn put_replaces_latest() {
        let store = InMemoryCheckpointer::new();
        let thread = ThreadId::from("t1");
        assert!(store.get(&thread).await.unwrap().is_none());

        let mut cp = Checkpoint::empty(thread.clone());
        cp.state.push(Message::user("hi")).unwrap();
        store.put(&cp).await.unwrap();

        cp.state.push(Message::assistant("hello")).unwrap();
        cp.advance(Node::Llm);
        store.put(&cp).await.unwrap();

        let loaded = store.get(&thread).await.unwrap().unwrap();
        assert_eq!(loaded.state.len(), 2);
        assert_eq!(loaded.node, Node::Llm);
        assert_eq!(loaded.step, 1);
    }

    #[tokio::test]
    async fn threads_are_isolated() {
        let store = InMemoryCheckpointer::new();
        let mut a = Checkpoint::empty(ThreadId::from("a"));
        a.state.push(Message::user("alpha")).unwrap();
        store.put(&a).await.unwrap();
        store.put(&Checkpoint::empty(ThreadId::from("b"))).await.unwrap();

        let b = store.get(&ThreadId::from("b")).await.unwrap().unwrap();
        assert!(b.state.is_empty());
        assert_eq!(
            store.list().await.unwrap(),
            vec![ThreadId::from("a"), ThreadId::from("b")]
        );
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = InMemoryCheckpointer::new();
        let thread = ThreadId::from("t1");
        store.put(&Checkpoint::empty(thread.clone())).await.unwrap();
        assert!(store.delete(&thread).await.unwrap());
        assert!(!store.delete(&thread).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }
}
