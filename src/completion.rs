//! Text generation through the hosted completion function.

use crate::error::{DocChatError, Result};
use crate::warehouse::{Binding, Warehouse};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Trait for completion backends.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Generate text for a prompt with the given model.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String>;
}

/// Completer that calls `SNOWFLAKE.CORTEX.COMPLETE` through the warehouse.
pub struct CortexCompleter {
    warehouse: Arc<dyn Warehouse>,
}

impl CortexCompleter {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self { warehouse }
    }
}

#[async_trait]
impl Completer for CortexCompleter {
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        let result = self
            .warehouse
            .query(
                "SELECT SNOWFLAKE.CORTEX.COMPLETE(?, ?) AS response",
                &[Binding::from(model), Binding::from(prompt)],
            )
            .await?;

        let response = result
            .scalar()
            .ok_or_else(|| DocChatError::Completion("empty response from model".to_string()))?
            .to_string();

        debug!("Completion returned {} characters", response.len());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::testing::RecordingWarehouse;

    #[tokio::test]
    async fn test_complete_binds_model_and_prompt() {
        let wh = Arc::new(RecordingWarehouse::new());
        wh.push_rows(&["RESPONSE"], vec![vec![Some(" The frame is aluminium.")]]);

        let completer = CortexCompleter::new(wh.clone());
        let answer = completer.complete("mistral-large", "Which frame?").await.unwrap();
        assert_eq!(answer, " The frame is aluminium.");

        let (sql, bindings) = &wh.calls()[0];
        assert!(sql.contains("CORTEX.COMPLETE(?, ?)"));
        assert_eq!(
            bindings,
            &vec![Binding::from("mistral-large"), Binding::from("Which frame?")]
        );
    }

    #[tokio::test]
    async fn test_null_response_is_error() {
        let wh = Arc::new(RecordingWarehouse::new());
        wh.push_rows(&["RESPONSE"], vec![vec![None]]);

        let err = CortexCompleter::new(wh).complete("m", "p").await.unwrap_err();
        assert!(matches!(err, DocChatError::Completion(_)));
    }

    #[tokio::test]
    async fn test_query_errors_propagate() {
        let wh = Arc::new(RecordingWarehouse::new());
        wh.push_error(DocChatError::Query {
            code: "100357".to_string(),
            message: "Unknown model".to_string(),
        });

        let err = CortexCompleter::new(wh).complete("nope", "p").await.unwrap_err();
        assert!(matches!(err, DocChatError::Query { .. }));
    }
}
