//! Turn router: after the tool-augmented node, decide whether the turn
//! goes to the tool executor or straight to the answering model.

use lumeo_core::error::{Error, Result};
use lumeo_core::message::ConversationState;

/// Where the turn goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Llm,
    Tools,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Llm => "llm",
            Route::Tools => "tools",
        }
    }
}

/// With web search off the turn always goes to the plain model, even if
/// the state ends in pending tool calls. Otherwise pending tool calls on
/// the last message send it to the tool executor.
pub fn route(state: &ConversationState, web_search: bool) -> Result<Route> {
    if !web_search {
        return Ok(Route::Llm);
    }
    let last = state
        .last()
        .ok_or_else(|| Error::InvalidState("no messages found in input state".into()))?;
    if last.has_tool_calls() {
        Ok(Route::Tools)
    } else {
        Ok(Route::Llm)
    }
}
