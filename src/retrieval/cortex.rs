//! Retrieval through Cortex vector functions.

use super::{DocumentChunk, Retriever, StagedDocument};
use crate::config::RetrievalSettings;
use crate::error::{DocChatError, Result};
use crate::warehouse::{validate_identifier, validate_model_name, Binding, QueryResult, Warehouse};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Retriever backed by a chunk table and a document stage.
pub struct CortexRetriever {
    warehouse: Arc<dyn Warehouse>,
    chunk_table: String,
    stage: String,
    embedding_model: String,
    url_expiry_secs: u64,
}

impl CortexRetriever {
    /// Create a retriever, validating the configured object names.
    pub fn new(warehouse: Arc<dyn Warehouse>, settings: &RetrievalSettings) -> Result<Self> {
        Ok(Self {
            warehouse,
            chunk_table: validate_identifier(&settings.chunk_table)?.to_string(),
            stage: validate_identifier(settings.stage.trim_start_matches('@'))?.to_string(),
            embedding_model: validate_model_name(&settings.embedding_model)?.to_string(),
            url_expiry_secs: settings.presigned_url_expiry_secs,
        })
    }

    fn similarity_sql(&self) -> String {
        format!(
            "WITH results AS (
    SELECT RELATIVE_PATH,
           VECTOR_COSINE_SIMILARITY({table}.chunk_vec,
                                    SNOWFLAKE.CORTEX.EMBED_TEXT_768('{model}', ?)) AS similarity,
           chunk
    FROM {table}
    ORDER BY similarity DESC
    LIMIT ?)
SELECT chunk, relative_path, similarity FROM results",
            table = self.chunk_table,
            model = self.embedding_model,
        )
    }
}

fn required_column(result: &QueryResult, name: &str) -> Result<usize> {
    result
        .column_index(name)
        .ok_or_else(|| DocChatError::Retrieval(format!("result has no '{}' column", name)))
}

#[async_trait]
impl Retriever for CortexRetriever {
    #[instrument(skip(self, query))]
    async fn similar_chunks(&self, query: &str, limit: usize) -> Result<Vec<DocumentChunk>> {
        let result = self
            .warehouse
            .query(
                &self.similarity_sql(),
                &[Binding::from(query), Binding::Integer(limit as i64)],
            )
            .await?;

        let chunk_col = required_column(&result, "chunk")?;
        let path_col = required_column(&result, "relative_path")?;
        let score_col = result.column_index("similarity");

        let chunks: Vec<DocumentChunk> = result
            .rows
            .into_iter()
            .map(|row| DocumentChunk {
                chunk: row.get(chunk_col).cloned().flatten().unwrap_or_default(),
                relative_path: row.get(path_col).cloned().flatten().unwrap_or_default(),
                similarity: score_col
                    .and_then(|i| row.get(i).cloned().flatten())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.0),
            })
            .collect();

        debug!("Retrieved {} chunks", chunks.len());
        Ok(chunks)
    }

    #[instrument(skip(self))]
    async fn list_documents(&self) -> Result<Vec<StagedDocument>> {
        let result = self
            .warehouse
            .query(&format!("LS @{}", self.stage), &[])
            .await?;

        let name_col = required_column(&result, "name")?;
        let size_col = result.column_index("size");
        let md5_col = result.column_index("md5");
        let modified_col = result.column_index("last_modified");

        let cell = |row: &Vec<Option<String>>, col: Option<usize>| -> Option<String> {
            col.and_then(|i| row.get(i).cloned().flatten())
        };

        Ok(result
            .rows
            .iter()
            .map(|row| StagedDocument {
                name: cell(row, Some(name_col)).unwrap_or_default(),
                size: cell(row, size_col).and_then(|s| s.parse().ok()),
                md5: cell(row, md5_col),
                last_modified: cell(row, modified_col),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn document_url(&self, relative_path: &str) -> Result<String> {
        let sql = format!("SELECT GET_PRESIGNED_URL(@{}, ?, ?)", self.stage);
        let result = self
            .warehouse
            .query(
                &sql,
                &[
                    Binding::from(relative_path),
                    Binding::Integer(self.url_expiry_secs as i64),
                ],
            )
            .await?;

        result
            .scalar()
            .map(str::to_string)
            .ok_or_else(|| DocChatError::Retrieval(format!("no URL returned for {}", relative_path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::testing::RecordingWarehouse;

    fn retriever(wh: Arc<RecordingWarehouse>) -> CortexRetriever {
        CortexRetriever::new(wh, &RetrievalSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_similar_chunks_binds_question_and_limit() {
        let wh = Arc::new(RecordingWarehouse::new());
        wh.push_rows(
            &["CHUNK", "RELATIVE_PATH", "SIMILARITY"],
            vec![
                vec![Some("first"), Some("a.pdf"), Some("0.91")],
                vec![Some("second"), Some("b.pdf"), None],
            ],
        );

        let chunks = retriever(wh.clone())
            .similar_chunks("what is the warranty?", 3)
            .await
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk, "first");
        assert!((chunks[0].similarity - 0.91).abs() < 1e-6);
        assert_eq!(chunks[1].relative_path, "b.pdf");
        assert_eq!(chunks[1].similarity, 0.0);

        let calls = wh.calls();
        let (sql, bindings) = &calls[0];
        assert!(sql.contains("FROM docs_chunks_table"));
        assert!(sql.contains("EMBED_TEXT_768('e5-base-v2', ?)"));
        assert!(sql.contains("ORDER BY similarity DESC"));
        assert_eq!(
            bindings,
            &vec![Binding::from("what is the warranty?"), Binding::Integer(3)]
        );
    }

    #[tokio::test]
    async fn test_missing_column_is_error() {
        let wh = Arc::new(RecordingWarehouse::new());
        wh.push_rows(&["TEXT"], vec![vec![Some("x")]]);
        let err = retriever(wh).similar_chunks("q", 3).await.unwrap_err();
        assert!(matches!(err, DocChatError::Retrieval(_)));
    }

    #[tokio::test]
    async fn test_list_documents() {
        let wh = Arc::new(RecordingWarehouse::new());
        wh.push_rows(
            &["name", "size", "md5", "last_modified"],
            vec![vec![
                Some("docs/manual.pdf"),
                Some("52311"),
                Some("abc123"),
                Some("Wed, 1 May 2024 10:00:00 GMT"),
            ]],
        );

        let docs = retriever(wh.clone()).list_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "docs/manual.pdf");
        assert_eq!(docs[0].size, Some(52311));
        assert_eq!(wh.calls()[0].0, "LS @docs");
    }

    #[tokio::test]
    async fn test_document_url() {
        let wh = Arc::new(RecordingWarehouse::new());
        wh.push_rows(&["URL"], vec![vec![Some("https://signed.example/manual.pdf")]]);

        let url = retriever(wh.clone()).document_url("manual.pdf").await.unwrap();
        assert_eq!(url, "https://signed.example/manual.pdf");

        let (sql, bindings) = &wh.calls()[0];
        assert_eq!(sql, "SELECT GET_PRESIGNED_URL(@docs, ?, ?)");
        assert_eq!(bindings[1], Binding::Integer(360));
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let settings = RetrievalSettings {
            chunk_table: "docs; DROP TABLE docs".to_string(),
            ..Default::default()
        };
        let wh: Arc<dyn Warehouse> = Arc::new(RecordingWarehouse::new());
        assert!(CortexRetriever::new(wh, &settings).is_err());
    }
}
