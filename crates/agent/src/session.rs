//! Chat session: the per-user context object a front-end holds.
//!
//! It owns the current thread id, the web-search toggle and a display
//! transcript. The transcript is what the user saw (including errors) and
//! is separate from the model-facing history kept by the checkpointer.

use chrono::{DateTime, Utc};
use lumeo_core::error::{Error, Result};
use lumeo_core::message::ThreadId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::stream_event::TurnEvent;
use crate::workflow::Workflow;

/// Longest message a user may send in one turn, in characters.
pub const MAX_INPUT_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    User,
    Assistant,
    Error,
}

/// One line of the display transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub kind: EntryKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    fn new(kind: EntryKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

pub struct ChatSession {
    workflow: Workflow,
    thread_id: ThreadId,
    web_search: bool,
    transcript: Vec<TranscriptEntry>,
}

impl ChatSession {
    /// Start a session on a fresh thread with web search off.
    pub fn new(workflow: Workflow) -> Self {
        let thread_id = ThreadId::new();
        info!(thread = %thread_id, "Session started");
        Self {
            workflow,
            thread_id,
            web_search: false,
            transcript: Vec::new(),
        }
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    pub fn web_search(&self) -> bool {
        self.web_search
    }

    pub fn set_web_search(&mut self, enabled: bool) {
        self.web_search = enabled;
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Send one message and stream the answer through `on_chunk`.
    ///
    /// Returns the full answer. On failure the error is recorded in the
    /// transcript and returned; the user's message stays in the thread.
    pub async fn respond(&mut self, text: &str, mut on_chunk: impl FnMut(&str)) -> Result<String> {
        self.respond_with(text, |event| {
            if let TurnEvent::Chunk { content } = event {
                on_chunk(content);
            }
        })
        .await
    }

    /// Like [`respond`](Self::respond), but hands every event to the callback.
    pub async fn respond_with(
        &mut self,
        text: &str,
        mut on_event: impl FnMut(&TurnEvent),
    ) -> Result<String> {
        let chars = text.chars().count();
        if chars > MAX_INPUT_CHARS {
            return Err(Error::InvalidState(format!(
                "message is {chars} characters, the limit is {MAX_INPUT_CHARS}"
            )));
        }

        self.transcript.push(TranscriptEntry::new(EntryKind::User, text));
        let mut stream = self
            .workflow
            .stream(self.thread_id.clone(), text, self.web_search);

        let mut answer = String::new();
        while let Some(item) = stream.recv().await {
            match item {
                Ok(event) => {
                    if let TurnEvent::Chunk { content } = &event {
                        answer.push_str(content);
                    }
                    on_event(&event);
                }
                Err(e) => {
                    self.transcript
                        .push(TranscriptEntry::new(EntryKind::Error, e.to_string()));
                    return Err(e);
                }
            }
        }

        self.transcript
            .push(TranscriptEntry::new(EntryKind::Assistant, answer.clone()));
        Ok(answer)
    }

    /// Clear chat and memory: forget the current thread and continue on a
    /// new one. Returns the new thread id.
    pub async fn clear(&mut self) -> Result<&ThreadId> {
        let old = std::mem::replace(&mut self.thread_id, ThreadId::new());
        let existed = self.workflow.forget(&old).await?;
        self.transcript.clear();
        debug!(old = %old, existed, "Forgot thread");
        info!(thread = %self.thread_id, "Session cleared");
        Ok(&self.thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use lumeo_core::error::ProviderError;
    use std::sync::Arc;

    #[tokio::test]
    async fn respond_streams_and_records() {
        let provider = Arc::new(ScriptedProvider::new(vec![Script::stream(&["Hi ", "there"])]));
        let mut session = ChatSession::new(workflow(provider, search_tools()));

        let mut seen = Vec::new();
        let answer = session
            .respond("hello", |chunk| seen.push(chunk.to_string()))
            .await
            .unwrap();
        assert_eq!(answer, "Hi there");
        assert_eq!(seen, vec!["Hi ", "there"]);

        let kinds: Vec<EntryKind> = session.transcript().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EntryKind::User, EntryKind::Assistant]);
    }

    #[tokio::test]
    async fn errors_are_recorded_in_transcript() {
        let provider = Arc::new(ScriptedProvider::new(vec![Script::fail(
            ProviderError::ModelNotFound("qwen2.5:3b-instruct".into()),
        )]));
        let mut session = ChatSession::new(workflow(provider, search_tools()));

        let err = session.respond("hello", |_| {}).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
        let last = session.transcript().last().unwrap();
        assert_eq!(last.kind, EntryKind::Error);
        assert!(last.content.contains("qwen2.5:3b-instruct"));
    }

    #[tokio::test]
    async fn toggle_controls_search() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Script::tool_call("call_1", r#"{"query":"q"}"#),
            Script::stream(&["found it"]),
        ]));
        let mut session =
            ChatSession::new(workflow(provider.clone(), search_tools())).with_web_search(true);
        assert!(session.web_search());

        let mut tool_events = 0;
        session
            .respond_with("look it up", |event| {
                if matches!(event, TurnEvent::ToolCall { .. } | TurnEvent::ToolResult { .. }) {
                    tool_events += 1;
                }
            })
            .await
            .unwrap();
        assert_eq!(tool_events, 2);
        assert_eq!(provider.call_count(), 2);

        session.set_web_search(false);
        assert!(!session.web_search());
    }

    #[tokio::test]
    async fn overlong_input_is_rejected_untouched() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let mut session = ChatSession::new(workflow(provider.clone(), search_tools()));

        let text = "é".repeat(MAX_INPUT_CHARS + 1);
        let err = session.respond(&text, |_| {}).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(session.transcript().is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn clear_starts_an_independent_thread() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Script::stream(&["first answer"]),
            Script::stream(&["second answer"]),
        ]));
        let mut session = ChatSession::new(workflow(provider.clone(), search_tools()));
        let old = session.thread_id().clone();

        session.respond("remember me", |_| {}).await.unwrap();
        let new = session.clear().await.unwrap().clone();
        assert_ne!(old, new);
        assert!(session.transcript().is_empty());
        assert!(session.workflow().history(&old).await.unwrap().is_empty());

        session.respond("who am I?", |_| {}).await.unwrap();
        // The model saw only the new thread's message.
        let sent = &provider.requests()[1].messages;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].content, "who am I?");
    }
}
