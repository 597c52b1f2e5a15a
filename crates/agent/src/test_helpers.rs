//! Shared test helpers for workflow and session tests.

use std::sync::{Arc, Mutex};

use lumeo_core::error::ProviderError;
use lumeo_core::message::{Message, MessageToolCall};
use lumeo_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage,
};
use lumeo_core::tool::ToolRegistry;
use lumeo_memory::InMemoryCheckpointer;
use lumeo_tools::{SearchResult, StaticSearch};
use tokio::sync::{Notify, Semaphore, mpsc};

use crate::workflow::Workflow;

/// One scripted provider reply.
#[derive(Clone)]
pub enum Script {
    /// A complete reply with text only.
    Text(String),
    /// A reply calling `web_search` once.
    ToolCall { id: String, arguments: String },
    /// Streamed deltas followed by a done chunk.
    Stream(Vec<String>),
    /// Streamed deltas followed by an interruption.
    BrokenStream(Vec<String>),
    /// The request itself fails.
    Fail(ProviderError),
}

impl Script {
    pub fn text(text: &str) -> Self {
        Script::Text(text.into())
    }

    pub fn tool_call(id: &str, arguments: &str) -> Self {
        Script::ToolCall {
            id: id.into(),
            arguments: arguments.into(),
        }
    }

    pub fn stream(deltas: &[&str]) -> Self {
        Script::Stream(deltas.iter().map(|d| d.to_string()).collect())
    }

    pub fn broken_stream(deltas: &[&str]) -> Self {
        Script::BrokenStream(deltas.iter().map(|d| d.to_string()).collect())
    }

    pub fn fail(error: ProviderError) -> Self {
        Script::Fail(error)
    }

    fn into_message(self) -> Result<Message, ProviderError> {
        match self {
            Script::Text(t) => Ok(Message::assistant(t)),
            Script::ToolCall { id, arguments } => Ok(Message::assistant_with_tool_calls(
                "",
                vec![MessageToolCall {
                    id,
                    name: "web_search".into(),
                    arguments,
                }],
            )),
            Script::Stream(d) | Script::BrokenStream(d) => Ok(Message::assistant(d.concat())),
            Script::Fail(e) => Err(e),
        }
    }
}

fn usage() -> Usage {
    Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }
}

/// A provider that replays scripts in order, for `complete` and `stream`
/// alike, and records every request.
pub struct ScriptedProvider {
    scripts: Mutex<Vec<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: ProviderRequest) -> Script {
        let mut requests = self.requests.lock().unwrap();
        let mut scripts = self.scripts.lock().unwrap();
        assert!(
            !scripts.is_empty(),
            "ScriptedProvider: no more scripts (call #{})",
            requests.len()
        );
        requests.push(request);
        scripts.remove(0)
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let message = self.next(request).into_message()?;
        Ok(ProviderResponse {
            message,
            usage: Some(usage()),
            model: "scripted-model".into(),
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let script = self.next(request);
        let (deltas, broken) = match script {
            Script::Stream(d) => (d, false),
            Script::BrokenStream(d) => (d, true),
            other => (vec![other.into_message()?.content], false),
        };

        let (tx, rx) = mpsc::channel(deltas.len() + 1);
        for delta in deltas {
            let _ = tx.try_send(Ok(StreamChunk {
                content: Some(delta),
                ..StreamChunk::default()
            }));
        }
        let last = if broken {
            Err(ProviderError::StreamInterrupted("connection reset".into()))
        } else {
            Ok(StreamChunk {
                done: true,
                usage: Some(usage()),
                ..StreamChunk::default()
            })
        };
        let _ = tx.try_send(last);
        Ok(rx)
    }
}

/// A provider whose streamed answers wait for a permit from the returned
/// semaphore.
pub struct GatedProvider {
    answer: String,
    gate: Arc<Semaphore>,
}

impl GatedProvider {
    pub fn new(answer: &str) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                answer: answer.into(),
                gate: gate.clone(),
            },
            gate,
        )
    }
}

#[async_trait::async_trait]
impl Provider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.gate
            .acquire()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?
            .forget();
        Ok(ProviderResponse {
            message: Message::assistant(self.answer.clone()),
            usage: None,
            model: "gated-model".into(),
        })
    }
}

/// A provider that streams its first delta at once and the rest only after
/// a permit is added to `gate`. `closed` fires once the consumer has
/// dropped the chunk receiver.
pub struct PausedStreamProvider {
    first: String,
    rest: String,
    pub gate: Arc<Semaphore>,
    pub closed: Arc<Notify>,
}

impl PausedStreamProvider {
    pub fn new(first: &str, rest: &str) -> Self {
        Self {
            first: first.into(),
            rest: rest.into(),
            gate: Arc::new(Semaphore::new(0)),
            closed: Arc::new(Notify::new()),
        }
    }
}

#[async_trait::async_trait]
impl Provider for PausedStreamProvider {
    fn name(&self) -> &str {
        "paused"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            message: Message::assistant(format!("{}{}", self.first, self.rest)),
            usage: None,
            model: "paused-model".into(),
        })
    }

    async fn stream(&self, _request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let (tx, rx) = mpsc::channel(4);
        let _ = tx.try_send(Ok(StreamChunk {
            content: Some(self.first.clone()),
            ..StreamChunk::default()
        }));

        let rest = self.rest.clone();
        let gate = self.gate.clone();
        let closed = self.closed.clone();
        tokio::spawn(async move {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
            let _ = tx
                .send(Ok(StreamChunk {
                    content: Some(rest),
                    ..StreamChunk::default()
                }))
                .await;
            let _ = tx
                .send(Ok(StreamChunk {
                    done: true,
                    usage: Some(usage()),
                    ..StreamChunk::default()
                }))
                .await;
            tx.closed().await;
            closed.notify_one();
        });
        Ok(rx)
    }
}

pub fn search_hits() -> Vec<SearchResult> {
    vec![
        SearchResult {
            title: "Result 1".into(),
            url: "https://example.com/1".into(),
            snippet: "First snippet".into(),
        },
        SearchResult {
            title: "Result 2".into(),
            url: "https://example.com/2".into(),
            snippet: "Second snippet".into(),
        },
    ]
}

pub fn search_tools() -> Arc<ToolRegistry> {
    Arc::new(lumeo_tools::search_registry(
        Arc::new(StaticSearch::new(search_hits())),
        5,
    ))
}

pub fn failing_search_tools() -> Arc<ToolRegistry> {
    Arc::new(lumeo_tools::search_registry(
        Arc::new(StaticSearch::failing("search backend down")),
        5,
    ))
}

pub fn workflow(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Workflow {
    Workflow::new(
        provider,
        tools,
        Arc::new(InMemoryCheckpointer::new()),
        "test-model",
    )
}
