//! RAG (Retrieval-Augmented Generation) chat over warehouse documents.
//!
//! Builds prompts from retrieved chunks and recent history and hands them
//! to the completion backend.

mod engine;
pub mod prompt;

pub use engine::{ChatEngine, EngineOptions};
pub use prompt::PromptBuilder;

use crate::retrieval::DocumentChunk;
use serde::Serialize;

/// Result of one question.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    /// The generated answer, with single quotes removed.
    pub answer: String,
    /// Query used for retrieval when it was rewritten and the session is in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standalone_query: Option<String>,
    /// Chunks that made it into the prompt.
    pub sources: Vec<DocumentChunk>,
    /// Presigned link to the most relevant document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
    /// The prompt sent for the answer.
    #[serde(skip)]
    pub prompt: String,
}

impl ChatTurn {
    /// Format the turn for terminal display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.answer.clone();

        if let Some(url) = &self.document_url {
            output.push_str(&format!("\n\nLink to the document: {}", url));
        }

        output
    }
}
