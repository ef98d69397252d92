//! Prompt assembly.

use crate::config::Prompts;
use crate::session::ChatMessage;
use std::collections::HashMap;

/// Render history as one `role: content` line per message.
pub fn format_history(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fills the chat prompt templates.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    prompts: Prompts,
}

impl PromptBuilder {
    pub fn new(prompts: Prompts) -> Self {
        Self { prompts }
    }

    /// Prompt asking the model to fold recent history into a standalone query.
    pub fn condense(&self, history: &[ChatMessage], question: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("chat_history".to_string(), format_history(history));
        vars.insert("question".to_string(), question.to_string());
        self.prompts
            .render_with_custom(&self.prompts.chat.condense, &vars)
    }

    /// Final prompt. `history` is `None` when the session has history turned off.
    pub fn answer(&self, history: Option<&[ChatMessage]>, context: &str, question: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert(
            "chat_history".to_string(),
            history.map(format_history).unwrap_or_default(),
        );
        vars.insert("context".to_string(), context.to_string());
        vars.insert("question".to_string(), question.to_string());
        self.prompts.render_with_custom(&self.prompts.chat.answer, &vars)
    }
}
