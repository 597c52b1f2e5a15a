//! The turn workflow: a small checkpointed graph.
//!
//! ```text
//! input ──▶ llm_with_tools ──route──▶ tools ──▶ llm
//!                              └──────────────────▶ llm
//! ```
//!
//! Each turn appends the user message, runs the nodes in order and writes
//! a checkpoint after every node. The next turn on the same thread resumes
//! from the latest checkpoint. Only the `llm` node streams; its deltas are
//! forwarded to the caller as they arrive.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use lumeo_config::AppConfig;
use lumeo_core::checkpoint::{Checkpoint, Checkpointer, Node};
use lumeo_core::error::{Error, ProviderError, Result};
use lumeo_core::message::{ConversationState, Message, Role, ThreadId};
use lumeo_core::provider::{Provider, ProviderRequest, Usage};
use lumeo_core::tool::{ToolCall, ToolRegistry};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::context::{CharHeuristic, DEFAULT_MAX_TOKENS, TokenCounter, Trimmer};
use crate::prompt::{self, Persona, PromptTemplate};
use crate::router::{Route, route};
use crate::stream_event::TurnEvent;

/// Capacity of the channel between the turn task and the caller.
const EVENT_BUFFER: usize = 64;

/// The orchestrator. Cheap to clone; clones share the same provider,
/// tools, checkpoint store and busy-thread set.
#[derive(Clone)]
pub struct Workflow {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    checkpointer: Arc<dyn Checkpointer>,
    persona: Persona,
    counter: Arc<dyn TokenCounter>,
    context_max_tokens: usize,
    system_allowance: Option<usize>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    busy: Arc<Mutex<HashSet<ThreadId>>>,
}

impl Workflow {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        checkpointer: Arc<dyn Checkpointer>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            checkpointer,
            persona: Persona::default(),
            counter: Arc::new(CharHeuristic),
            context_max_tokens: DEFAULT_MAX_TOKENS,
            system_allowance: None,
            model: model.into(),
            temperature: 0.8,
            max_tokens: None,
            busy: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Validate the config, then wire up provider, tools and checkpoint
    /// store from it.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        let router = lumeo_providers::build_from_config(config);
        let provider = router.default_provider()?;
        let tools = Arc::new(lumeo_tools::default_registry(&config.search));
        let checkpointer = lumeo_memory::from_config(&config.memory.backend, config.threads_dir());

        info!(
            provider = %provider.name(),
            model = %lumeo_providers::default_model(config),
            search = %config.search.provider,
            memory = %checkpointer.name(),
            "Workflow configured"
        );

        let mut workflow = Self::new(
            provider,
            tools,
            checkpointer,
            lumeo_providers::default_model(config),
        )
        .with_persona(Persona::from_config(&config.identity))
        .with_context(config.context.max_tokens, config.context.system_allowance)
        .with_temperature(config.default_temperature);
        workflow.max_tokens = config.default_max_tokens;
        Ok(workflow)
    }

    pub fn with_persona(mut self, persona: Persona) -> Self {
        self.persona = persona;
        self
    }

    /// Token budget for prompts and the share reserved for the system
    /// message. `None` measures the larger of the two templates.
    pub fn with_context(mut self, max_tokens: usize, system_allowance: Option<usize>) -> Self {
        self.context_max_tokens = max_tokens;
        self.system_allowance = system_allowance;
        self
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn checkpointer(&self) -> &Arc<dyn Checkpointer> {
        &self.checkpointer
    }

    pub fn trimmer(&self) -> Trimmer {
        let allowance = self
            .system_allowance
            .unwrap_or_else(|| self.persona.max_system_tokens(self.counter.as_ref()));
        Trimmer::with_counter(self.counter.clone(), self.context_max_tokens, allowance)
    }

    /// The persisted history of a thread (empty if it was never used).
    pub async fn history(&self, thread_id: &ThreadId) -> Result<Vec<Message>> {
        Ok(self
            .checkpointer
            .get(thread_id)
            .await?
            .map(|cp| cp.state.messages)
            .unwrap_or_default())
    }

    /// Drop a thread's checkpoint. Returns whether one existed.
    pub async fn forget(&self, thread_id: &ThreadId) -> Result<bool> {
        Ok(self.checkpointer.delete(thread_id).await?)
    }

    /// Start a turn. Must be called within a Tokio runtime.
    ///
    /// The turn runs on its own task; events arrive on the returned
    /// stream, which ends after `Done` or after the first error. A second
    /// turn on a thread that is still running fails immediately with
    /// `InvalidState`.
    pub fn stream(
        &self,
        thread_id: ThreadId,
        user_text: impl Into<String>,
        web_search: bool,
    ) -> TurnStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        let guard = match BusyGuard::acquire(&self.busy, &thread_id) {
            Some(guard) => guard,
            None => {
                let _ = tx.try_send(Err(Error::InvalidState(format!(
                    "thread {thread_id} is busy"
                ))));
                return TurnStream::new(rx);
            }
        };

        let workflow = self.clone();
        let user_text = user_text.into();
        let span = info_span!("turn", thread = %thread_id, web_search);

        tokio::spawn(
            async move {
                let turn = Turn {
                    workflow: &workflow,
                    tx: &tx,
                };
                let outcome = turn.run(thread_id.clone(), user_text, web_search).await;
                // Free the thread before the caller learns the turn is over.
                drop(guard);
                match outcome {
                    Ok(Some(usage)) => {
                        let _ = tx.send(Ok(TurnEvent::Done { thread_id, usage })).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, "Turn failed");
                        let _ = tx.send(Err(e)).await;
                    }
                }
            }
            .instrument(span),
        );

        TurnStream::new(rx)
    }
}

/// Marks a thread busy for as long as it is held.
struct BusyGuard {
    busy: Arc<Mutex<HashSet<ThreadId>>>,
    thread_id: ThreadId,
}

impl BusyGuard {
    fn acquire(busy: &Arc<Mutex<HashSet<ThreadId>>>, thread_id: &ThreadId) -> Option<Self> {
        let mut set = busy.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(thread_id.clone()) {
            return None;
        }
        Some(Self {
            busy: busy.clone(),
            thread_id: thread_id.clone(),
        })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut set = self.busy.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.thread_id);
    }
}

/// Outcome of forwarding an event to the caller.
enum Delivery {
    Sent,
    Cancelled,
}

/// One running turn.
struct Turn<'a> {
    workflow: &'a Workflow,
    tx: &'a mpsc::Sender<Result<TurnEvent>>,
}

impl Turn<'_> {
    async fn emit(&self, event: TurnEvent) -> Delivery {
        match self.tx.send(Ok(event)).await {
            Ok(()) => Delivery::Sent,
            Err(_) => Delivery::Cancelled,
        }
    }

    async fn save(&self, checkpoint: &mut Checkpoint, node: Node) -> Result<()> {
        checkpoint.advance(node);
        self.workflow.checkpointer.put(checkpoint).await?;
        debug!(node = %node, step = checkpoint.step, "Checkpointed");
        Ok(())
    }

    /// Run all nodes. `Ok(None)` means the caller cancelled; otherwise
    /// the answer's usage is returned for the final `Done` event.
    async fn run(
        &self,
        thread_id: ThreadId,
        user_text: String,
        web_search: bool,
    ) -> Result<Option<Option<Usage>>> {
        let wf = self.workflow;
        let mut checkpoint = wf
            .checkpointer
            .get(&thread_id)
            .await?
            .unwrap_or_else(|| Checkpoint::empty(thread_id.clone()));

        checkpoint.state.push(Message::user(user_text))?;
        self.save(&mut checkpoint, Node::Input).await?;

        // llm_with_tools
        if let Some(message) = self.llm_with_tools(&checkpoint.state, web_search).await? {
            for tc in &message.tool_calls {
                let arguments = serde_json::from_str(&tc.arguments)
                    .unwrap_or_else(|_| serde_json::Value::String(tc.arguments.clone()));
                let event = TurnEvent::ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                };
                if let Delivery::Cancelled = self.emit(event).await {
                    debug!("Caller went away before tool execution");
                    return Ok(None);
                }
            }
            checkpoint.state.push(message)?;
        }
        self.save(&mut checkpoint, Node::LlmWithTools).await?;

        let next = route(&checkpoint.state, web_search)?;
        info!(route = next.as_str(), "Routed");

        if next == Route::Tools {
            let results = self.tools(&checkpoint.state).await?;
            let mut events = Vec::with_capacity(results.len());
            for (name, result) in results {
                events.push(TurnEvent::ToolResult {
                    id: result.tool_call_id.clone().unwrap_or_default(),
                    name,
                    output: result.content.clone(),
                });
                checkpoint.state.push(result)?;
            }
            self.save(&mut checkpoint, Node::Tools).await?;

            for event in events {
                if let Delivery::Cancelled = self.emit(event).await {
                    return Ok(None);
                }
            }
        }

        let Some((answer, usage)) = self.llm(&checkpoint.state).await? else {
            debug!("Caller went away mid-answer, discarding partial reply");
            return Ok(None);
        };
        checkpoint.state.push(answer)?;
        self.save(&mut checkpoint, Node::Llm).await?;

        info!(messages = checkpoint.state.len(), "Turn complete");
        Ok(Some(usage))
    }

    /// Ask the tool-bound model whether it wants to search. `None` means
    /// no tool calls and nothing is appended.
    ///
    /// With search disabled the model is deliberately not called: the
    /// router sends every such turn to `llm`, so a tool-bound reply could
    /// never be used. The node still yields `None` and is checkpointed.
    async fn llm_with_tools(
        &self,
        state: &ConversationState,
        web_search: bool,
    ) -> Result<Option<Message>> {
        if !web_search {
            debug!("Web search disabled, skipping tool-bound model");
            return Ok(None);
        }
        let wf = self.workflow;
        info!(node = %Node::LlmWithTools, "Invoking model with tools");

        let window = wf.trimmer().trim(&state.messages)?;
        let prompt = prompt::compose_with(
            PromptTemplate::Default,
            answered_calls_only(window),
            &wf.persona,
        );

        let response = wf
            .provider
            .complete(ProviderRequest {
                model: wf.model.clone(),
                messages: prompt.messages,
                temperature: wf.temperature,
                max_tokens: wf.max_tokens,
                tools: wf.tools.definitions(),
                stream: false,
            })
            .await?;

        if response.message.has_tool_calls() {
            info!(
                calls = response.message.tool_calls.len(),
                "Model requested tool calls"
            );
            Ok(Some(response.message))
        } else {
            info!("No tool calls from model response");
            Ok(None)
        }
    }

    /// Execute every pending tool call in order. Any failure aborts the
    /// node before anything is appended.
    async fn tools(&self, state: &ConversationState) -> Result<Vec<(String, Message)>> {
        info!(node = %Node::Tools, "Executing tool calls");
        let mut results = Vec::new();
        for raw in state.pending_tool_calls() {
            let call = ToolCall::try_from(raw)?;
            let result = self.workflow.tools.execute(&call).await.inspect_err(|e| {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
            })?;
            debug!(tool = %call.name, bytes = result.output.len(), "Tool finished");
            results.push((
                call.name.clone(),
                Message::tool_result(result.call_id, result.output),
            ));
        }
        Ok(results)
    }

    /// Stream the answer. Returns `None` if the caller dropped the stream.
    async fn llm(&self, state: &ConversationState) -> Result<Option<(Message, Option<Usage>)>> {
        let wf = self.workflow;
        let window = wf.trimmer().trim(&state.messages)?;
        let prompt = prompt::compose(answered_calls_only(window), &wf.persona);
        info!(node = %Node::Llm, template = prompt.template.as_str(), "Invoking model");

        let mut rx = wf
            .provider
            .stream(ProviderRequest {
                model: wf.model.clone(),
                messages: prompt.messages,
                temperature: wf.temperature,
                max_tokens: wf.max_tokens,
                tools: Vec::new(),
                stream: true,
            })
            .await?;

        let mut answer = String::new();
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk?;
            if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                answer.push_str(&content);
                if let Delivery::Cancelled = self.emit(TurnEvent::Chunk { content }).await {
                    return Ok(None);
                }
            }
            if chunk.done {
                return Ok(Some((Message::assistant(answer), chunk.usage)));
            }
        }
        Err(ProviderError::StreamInterrupted("stream ended before completion".into()).into())
    }
}

/// Strip tool calls that have no result in the window (left behind by a
/// turn that failed in the tool node). Chat endpoints reject them.
fn answered_calls_only(mut window: Vec<Message>) -> Vec<Message> {
    for i in 0..window.len() {
        if window[i].role != Role::Assistant || window[i].tool_calls.is_empty() {
            continue;
        }
        let answered: HashSet<String> = window[i + 1..]
            .iter()
            .take_while(|m| m.role == Role::Tool)
            .filter_map(|m| m.tool_call_id.clone())
            .collect();
        window[i].tool_calls.retain(|tc| answered.contains(&tc.id));
    }
    window
}

/// The caller's end of a running turn.
///
/// Dropping it cancels the turn at the next event boundary; a partial
/// answer is then not persisted.
pub struct TurnStream {
    rx: mpsc::Receiver<Result<TurnEvent>>,
    finished: bool,
}

impl TurnStream {
    fn new(rx: mpsc::Receiver<Result<TurnEvent>>) -> Self {
        Self {
            rx,
            finished: false,
        }
    }

    /// Next event, or `None` once the turn has ended.
    pub async fn recv(&mut self) -> Option<Result<TurnEvent>> {
        if self.finished {
            return None;
        }
        let item = self.rx.recv().await;
        self.finished = matches!(item, None | Some(Err(_)) | Some(Ok(TurnEvent::Done { .. })));
        item
    }

    /// Drain the turn and return the concatenated answer text.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(event) = self.recv().await {
            if let TurnEvent::Chunk { content } = event? {
                text.push_str(&content);
            }
        }
        Ok(text)
    }
}

impl futures::Stream for TurnStream {
    type Item = Result<TurnEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        let polled = self.rx.poll_recv(cx);
        if let Poll::Ready(item) = &polled {
            self.finished =
                matches!(item, None | Some(Err(_)) | Some(Ok(TurnEvent::Done { .. })));
        }
        polled
    }
}
