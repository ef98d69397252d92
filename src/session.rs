//! Conversation state for one chat session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Messages plus the user-facing toggles that shape each request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    /// Model passed to the completion call.
    pub model_name: String,
    /// Include recent history in prompts.
    pub use_chat_history: bool,
    /// Report the standalone query used for retrieval.
    pub debug: bool,
}

impl ChatSession {
    /// Create an empty session.
    pub fn new(model_name: impl Into<String>, use_chat_history: bool, debug: bool) -> Self {
        Self {
            messages: Vec::new(),
            model_name: model_name.into(),
            use_chat_history,
            debug,
        }
    }

    /// Create an empty session with the configured defaults.
    pub fn from_settings(settings: &crate::config::ChatSettings) -> Self {
        Self::new(
            settings.default_model.clone(),
            settings.use_chat_history,
            settings.debug,
        )
    }

    /// All messages in arrival order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Record a completed question/answer pair.
    pub fn record_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.messages.push(ChatMessage::user(question));
        self.messages.push(ChatMessage::assistant(answer));
    }

    /// Start over. Only in-memory state is affected.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Messages that precede the next question within a sliding window.
    ///
    /// The window counts the incoming question, so at most
    /// `slide_window - 1` earlier messages are returned.
    pub fn history_window(&self, slide_window: usize) -> &[ChatMessage] {
        let len = self.messages.len();
        let start = (len + 1).saturating_sub(slide_window).min(len);
        &self.messages[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(exchanges: usize) -> ChatSession {
        let mut session = ChatSession::new("mixtral-8x7b", true, false);
        for i in 0..exchanges {
            session.record_exchange(format!("q{}", i), format!("a{}", i));
        }
        session
    }

    #[test]
    fn test_history_window_keeps_arrival_order() {
        let session = session_with(2);
        let window: Vec<&str> = session
            .history_window(7)
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(window, vec!["q0", "a0", "q1", "a1"]);
    }

    #[test]
    fn test_history_window_slides() {
        let session = session_with(5);
        let window = session.history_window(7);
        assert_eq!(window.len(), 6);
        assert_eq!(window[0].content, "q2");
        assert_eq!(window[5].content, "a4");
    }

    #[test]
    fn test_history_window_degenerate_sizes() {
        let session = session_with(2);
        assert!(session.history_window(0).is_empty());
        assert!(session.history_window(1).is_empty());
        assert_eq!(session.history_window(2).len(), 1);
        assert!(session_with(0).history_window(7).is_empty());
    }

    #[test]
    fn test_clear_resets_messages_only() {
        let mut session = session_with(3);
        session.use_chat_history = false;
        session.clear();
        assert!(session.is_empty());
        assert_eq!(session.model_name, "mixtral-8x7b");
        assert!(!session.use_chat_history);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert!(json.contains("\"role\":\"user\""));
    }
}
