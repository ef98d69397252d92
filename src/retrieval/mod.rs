//! Context retrieval from the warehouse.
//!
//! Similarity ranking happens inside the warehouse; this module only
//! phrases the queries and turns rows into chunks.

pub mod context;
mod cortex;

pub use context::{build_context, strip_quotes, ChunkSelection};
pub use cortex::CortexRetriever;

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// A fragment of a source document returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentChunk {
    /// Chunk text.
    pub chunk: String,
    /// Path of the source document within the stage.
    pub relative_path: String,
    /// Cosine similarity to the query (higher is closer).
    pub similarity: f32,
}

/// A file listed in the document stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedDocument {
    pub name: String,
    pub size: Option<u64>,
    pub md5: Option<String>,
    pub last_modified: Option<String>,
}

/// Trait for chunk retrieval backends.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Top `limit` chunks for a query, most similar first.
    async fn similar_chunks(&self, query: &str, limit: usize) -> Result<Vec<DocumentChunk>>;

    /// Documents available to answer questions.
    async fn list_documents(&self) -> Result<Vec<StagedDocument>>;

    /// A time-limited link to a source document.
    async fn document_url(&self, relative_path: &str) -> Result<String>;
}
