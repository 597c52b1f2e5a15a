//! Turn-level streaming events.
//!
//! `TurnEvent` wraps provider-level stream chunks and tool activity into
//! the events a caller renders while a turn is running.

use lumeo_core::message::ThreadId;
use lumeo_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Events emitted by the workflow during one turn.
///
/// - `chunk`       — partial answer text from the model
/// - `tool_call`   — the model asked for a tool
/// - `tool_result` — the tool finished
/// - `done`        — the answer is complete and checkpointed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    Chunk { content: String },

    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },

    ToolResult {
        id: String,
        name: String,
        output: String,
    },

    Done {
        thread_id: ThreadId,
        usage: Option<Usage>,
    },
}

impl TurnEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_chunk() {
        let event = TurnEvent::Chunk {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"chunk""#));
        assert!(json.contains(r#""content":"Hello""#));
        assert_eq!(event.event_type(), "chunk");
    }

    #[test]
    fn event_serialization_tool_call() {
        let event = TurnEvent::ToolCall {
            id: "call_1".into(),
            name: "web_search".into(),
            arguments: serde_json::json!({"query": "rust"}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_call""#));
        assert!(json.contains(r#""name":"web_search""#));
    }

    #[test]
    fn event_serialization_done() {
        let event = TurnEvent::Done {
            thread_id: ThreadId::from("abc"),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            }),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"done""#));
        assert!(json.contains(r#""thread_id":"abc""#));
        assert_eq!(event.event_type(), "done");
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"tool_result","id":"c1","name":"web_search","output":"[]"}"#;
        let event: TurnEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type(), "tool_result");
        match event {
            TurnEvent::ToolResult { id, .. } => assert_eq!(id, "c1"),
            _ => panic!("Wrong variant"),
        }
    }
}
