//! Prompt composition: pick a system template and prefix it to the
//! trimmed history.

use lumeo_config::IdentityConfig;
use lumeo_core::message::Message;

use crate::context::TokenCounter;

/// The two system templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    /// Persona only.
    Default,
    /// Persona plus the source-citation rules, used when answering from
    /// tool results.
    WebSearch,
}

impl PromptTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptTemplate::Default => "default",
            PromptTemplate::WebSearch => "web_search",
        }
    }
}

const CITATION_RULES: &str = "When you use the web search tool, include all the relevant source \
links at the bottom of your response. Use this format exactly for each source:\n\
- [Title of the page](URL)\n\n\
Do not invent sources. Only include links provided by the web search tool.";

/// The assistant's identity, rendered into the system templates.
#[derive(Debug, Clone)]
pub struct Persona {
    name: String,
    preamble_override: Option<String>,
}

impl Persona {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            preamble_override: None,
        }
    }

    /// Replace the persona preamble. The citation rules of the web-search
    /// template are still appended.
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble_override = Some(preamble.into());
        self
    }

    pub fn from_config(identity: &IdentityConfig) -> Self {
        let persona = Self::new(&identity.name);
        match &identity.system_prompt_override {
            Some(preamble) => persona.with_preamble(preamble),
            None => persona,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn preamble(&self) -> String {
        match &self.preamble_override {
            Some(p) => p.clone(),
            None => format!(
                "Your name is {}, a friendly and helpful AI assistant with the chaotic charm \
                 and fourth-wall-breaking wit. Answer all questions to the best of your ability. \
                 Keep your tone friendly and always deliver accurate and helpful responses. \
                 If you're unsure about something, say so honestly rather than guessing.",
                self.name
            ),
        }
    }

    /// The system prompt text for a template.
    pub fn render(&self, template: PromptTemplate) -> String {
        match template {
            PromptTemplate::Default => self.preamble(),
            PromptTemplate::WebSearch => format!("{}\n\n{CITATION_RULES}", self.preamble()),
        }
    }

    /// Tokens taken by the larger of the two system messages.
    pub fn max_system_tokens(&self, counter: &dyn TokenCounter) -> usize {
        [PromptTemplate::Default, PromptTemplate::WebSearch]
            .into_iter()
            .map(|t| counter.count(&[Message::system(self.render(t))]))
            .max()
            .unwrap_or(0)
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::new("Lumeo")
    }
}

/// A composed prompt: system message first, then the trimmed history.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub template: PromptTemplate,
    pub messages: Vec<Message>,
}

/// Answering from tool output calls for the citation template.
pub fn select_template(trimmed: &[Message]) -> PromptTemplate {
    match trimmed.last() {
        Some(m) if m.is_tool_result() => PromptTemplate::WebSearch,
        _ => PromptTemplate::Default,
    }
}

pub fn compose(trimmed: Vec<Message>, persona: &Persona) -> Prompt {
    compose_with(select_template(&trimmed), trimmed, persona)
}

/// Compose with an explicit template.
pub fn compose_with(template: PromptTemplate, trimmed: Vec<Message>, persona: &Persona) -> Prompt {
    let mut messages = Vec::with_capacity(trimmed.len() + 1);
    messages.push(Message::system(persona.render(template)));
    messages.extend(trimmed);
    Prompt { template, messages }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CharHeuristic;
    use lumeo_core::message::{MessageToolCall, Role};

    fn tool_round() -> Vec<Message> {
        vec![
            Message::user("weather in Paris?"),
            Message::assistant_with_tool_calls(
                "",
                vec![MessageToolCall {
                    id: "call_1".into(),
                    name: "web_search".into(),
                    arguments: r#"{"query":"paris weather"}"#.into(),
                }],
            ),
            Message::tool_result("call_1", r#"{"results":[]}"#),
        ]
    }

    #[test]
    fn plain_history_uses_default_template() {
        let prompt = compose(vec![Message::user("hi")], &Persona::default());
        assert_eq!(prompt.template, PromptTemplate::Default);
        assert_eq!(prompt.messages.len(), 2);
        assert_eq!(prompt.messages[0].role, Role::System);
        assert!(prompt.messages[0].content.contains("Lumeo"));
        assert!(!prompt.messages[0].content.contains("- [Title of the page](URL)"));
        assert_eq!(prompt.messages[1].content, "hi");
    }

    #[test]
    fn tool_result_tail_uses_web_search_template() {
        let prompt = compose(tool_round(), &Persona::default());
        assert_eq!(prompt.template, PromptTemplate::WebSearch);
        let system = &prompt.messages[0].content;
        assert!(system.contains("- [Title of the page](URL)"));
        assert!(system.contains("Do not invent sources"));
        assert_eq!(prompt.messages.len(), 4);
    }

    #[test]
    fn tool_result_earlier_in_history_does_not_count() {
        let mut history = tool_round();
        history.push(Message::assistant("It is sunny."));
        history.push(Message::user("thanks"));
        assert_eq!(select_template(&history), PromptTemplate::Default);
        assert_eq!(select_template(&[]), PromptTemplate::Default);
    }

    #[test]
    fn persona_name_and_override() {
        let named = Persona::new("Nova");
        assert!(named.render(PromptTemplate::Default).starts_with("Your name is Nova"));

        let custom = Persona::new("Nova").with_preamble("You are terse.");
        assert_eq!(custom.render(PromptTemplate::Default), "You are terse.");
        assert!(custom.render(PromptTemplate::WebSearch).contains("Do not invent sources"));
    }

    #[test]
    fn web_search_template_is_the_larger_one() {
        let persona = Persona::default();
        let allowance = persona.max_system_tokens(&CharHeuristic);
        let default = CharHeuristic.count(&[Message::system(persona.render(PromptTemplate::Default))]);
        assert!(allowance > default);
    }
}
