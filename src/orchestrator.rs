//! Wiring for docchat.
//!
//! Opens the warehouse session and assembles the retrieval and completion
//! components every surface shares.

use crate::completion::CortexCompleter;
use crate::config::{Prompts, Settings};
use crate::error::{DocChatError, Result};
use crate::rag::{ChatEngine, EngineOptions};
use crate::retrieval::{CortexRetriever, StagedDocument};
use crate::session::ChatSession;
use crate::warehouse::{with_timeout, SnowflakeConnection, Warehouse};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Connected application components.
pub struct Orchestrator {
    settings: Settings,
    warehouse: Arc<dyn Warehouse>,
    engine: ChatEngine,
    request_timeout: Duration,
}

impl Orchestrator {
    /// Connect to the configured warehouse and build the chat engine.
    #[instrument(skip(settings))]
    pub async fn connect(settings: Settings) -> Result<Self> {
        let warehouse: Arc<dyn Warehouse> =
            Arc::new(SnowflakeConnection::connect(&settings.warehouse).await?);
        Self::with_components(settings, warehouse)
    }

    /// Build on an existing warehouse connection.
    pub fn with_components(settings: Settings, warehouse: Arc<dyn Warehouse>) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        if !settings.is_known_model(&settings.chat.default_model) {
            return Err(DocChatError::Config(format!(
                "default model '{}' is not in chat.models",
                settings.chat.default_model
            )));
        }

        let retriever = Arc::new(CortexRetriever::new(warehouse.clone(), &settings.retrieval)?);
        let completer = Arc::new(CortexCompleter::new(warehouse.clone()));

        let engine = ChatEngine::new(retriever, completer)
            .with_prompts(prompts)
            .with_options(EngineOptions::from_settings(&settings));

        info!(
            "Chat engine ready ({} chunks per question, history window {})",
            settings.retrieval.num_chunks, settings.chat.slide_window
        );

        let request_timeout = Duration::from_secs(settings.chat.request_timeout_secs);

        Ok(Self {
            settings,
            warehouse,
            engine,
            request_timeout,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &ChatEngine {
        &self.engine
    }

    /// A fresh session with the configured defaults.
    pub fn new_session(&self) -> ChatSession {
        ChatSession::from_settings(&self.settings.chat)
    }

    /// Switch a session's model, rejecting models the selector doesn't offer.
    pub fn select_model(&self, session: &mut ChatSession, model: &str) -> Result<()> {
        if !self.settings.is_known_model(model) {
            return Err(DocChatError::InvalidInput(format!(
                "unknown model '{}'; choose one of: {}",
                model,
                self.settings.chat.models.join(", ")
            )));
        }
        session.model_name = model.to_string();
        Ok(())
    }

    /// Documents available in the stage.
    pub async fn list_documents(&self) -> Result<Vec<StagedDocument>> {
        with_timeout(
            "document listing",
            self.request_timeout,
            self.engine.retriever().list_documents(),
        )
        .await
    }

    /// Number of rows in the chunk table.
    pub async fn chunk_count(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.settings.retrieval.chunk_table);
        let result = with_timeout(
            "chunk count",
            self.request_timeout,
            self.warehouse.query(&sql, &[]),
        )
        .await?;

        let raw = result.scalar().unwrap_or("0");
        raw.parse()
            .map_err(|_| DocChatError::Protocol(format!("'{}' is not a row count", raw)))
    }

    /// End the warehouse session.
    pub async fn close(&self) -> Result<()> {
        with_timeout("session close", self.request_timeout, self.warehouse.close()).await
    }
}
