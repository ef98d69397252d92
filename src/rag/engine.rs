//! Chat engine: one question in, one grounded answer out.

use super::prompt::PromptBuilder;
use super::ChatTurn;
use crate::completion::Completer;
use crate::config::{Prompts, Settings};
use crate::error::{DocChatError, Result};
use crate::retrieval::{build_context, strip_quotes, ChunkSelection, Retriever};
use crate::session::{ChatMessage, ChatSession};
use crate::warehouse::with_timeout;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Knobs that shape each request.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Chunks fetched from the similarity query.
    pub num_chunks: usize,
    pub selection: ChunkSelection,
    /// Messages considered for history, counting the new question.
    pub slide_window: usize,
    /// Rewrite follow-ups into standalone queries before retrieval.
    pub condense_question: bool,
    /// Attach a presigned link to the top document.
    pub include_document_link: bool,
    /// Limit for each remote call.
    pub request_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            num_chunks: 3,
            selection: ChunkSelection::All,
            slide_window: 7,
            condense_question: true,
            include_document_link: false,
            request_timeout: Duration::from_secs(300),
        }
    }
}

impl EngineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            num_chunks: settings.retrieval.num_chunks,
            selection: ChunkSelection::from_flag(settings.retrieval.drop_least_similar),
            slide_window: settings.chat.slide_window,
            condense_question: settings.chat.condense_question,
            include_document_link: settings.retrieval.include_document_link,
            request_timeout: Duration::from_secs(settings.chat.request_timeout_secs),
        }
    }
}

/// Retrieval-augmented chat over the warehouse.
pub struct ChatEngine {
    retriever: Arc<dyn Retriever>,
    completer: Arc<dyn Completer>,
    prompts: PromptBuilder,
    options: EngineOptions,
}

impl ChatEngine {
    /// Create an engine with default options.
    pub fn new(retriever: Arc<dyn Retriever>, completer: Arc<dyn Completer>) -> Self {
        Self {
            retriever,
            completer,
            prompts: PromptBuilder::default(),
            options: EngineOptions::default(),
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = PromptBuilder::new(prompts);
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// The retriever, for surfaces that list documents.
    pub fn retriever(&self) -> &Arc<dyn Retriever> {
        &self.retriever
    }

    /// Answer a question within a session.
    ///
    /// The session is only updated after the answer arrives, so an error or
    /// a dropped future leaves the conversation as it was.
    #[instrument(skip(self, session), fields(model = %session.model_name, history = session.use_chat_history))]
    pub async fn respond(&self, session: &mut ChatSession, question: &str) -> Result<ChatTurn> {
        let asked = question.trim();
        let clean_question = strip_quotes(asked);
        if clean_question.trim().is_empty() {
            return Err(DocChatError::InvalidInput("question is empty".to_string()));
        }

        info!("Processing question: {}", clean_question);

        let history: Option<Vec<ChatMessage>> = session
            .use_chat_history
            .then(|| session.history_window(self.options.slide_window).to_vec());

        // Follow-ups are rewritten so retrieval sees the whole intent.
        let mut standalone_query = None;
        let search_query = match &history {
            Some(h) if !h.is_empty() && self.options.condense_question => {
                let prompt = self.prompts.condense(h, &clean_question);
                let summary = self
                    .timed(
                        "question rewrite",
                        self.completer.complete(&session.model_name, &prompt),
                    )
                    .await?;
                let summary = strip_quotes(&summary);
                debug!("Standalone query: {}", summary);
                standalone_query = Some(summary.clone());
                summary
            }
            _ => clean_question.clone(),
        };

        let chunks = self
            .timed(
                "similarity search",
                self.retriever
                    .similar_chunks(&search_query, self.options.num_chunks),
            )
            .await?;
        let context = build_context(&chunks, self.options.selection);
        let sources = self.options.selection.select(&chunks).to_vec();

        let prompt = self
            .prompts
            .answer(history.as_deref(), &context, &clean_question);

        let raw_answer = self
            .timed(
                "completion",
                self.completer.complete(&session.model_name, &prompt),
            )
            .await?;
        let answer = strip_quotes(&raw_answer);

        let document_url = match sources.first() {
            Some(top) if self.options.include_document_link => Some(
                self.timed(
                    "document link",
                    self.retriever.document_url(&top.relative_path),
                )
                .await?,
            ),
            _ => None,
        };

        session.record_exchange(asked, answer.clone());
        debug!("Answered with {} sources", sources.len());

        Ok(ChatTurn {
            answer,
            standalone_query: standalone_query.filter(|_| session.debug),
            sources,
            document_url,
            prompt,
        })
    }

    /// Run a remote call under the request timeout.
    async fn timed<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_timeout(operation, self.options.request_timeout, fut).await
    }
}
