//! Warehouse abstraction for docchat.
//!
//! Everything the application does against the data store goes through
//! SQL: similarity search, stage listing, presigned URLs and completions.

mod snowflake;

pub use snowflake::SnowflakeConnection;

use crate::error::{DocChatError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

/// A positional bind value for a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Text(String),
    Integer(i64),
}

impl Binding {
    /// Warehouse type name used in the bind payload.
    pub fn type_name(&self) -> &'static str {
        match self {
            Binding::Text(_) => "TEXT",
            Binding::Integer(_) => "FIXED",
        }
    }

    /// Value as sent on the wire.
    pub fn wire_value(&self) -> String {
        match self {
            Binding::Text(s) => s.clone(),
            Binding::Integer(n) => n.to_string(),
        }
    }
}

impl From<&str> for Binding {
    fn from(value: &str) -> Self {
        Binding::Text(value.to_string())
    }
}

impl From<i64> for Binding {
    fn from(value: i64) -> Self {
        Binding::Integer(value)
    }
}

/// Rows returned by a query, with every cell as nullable text.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryResult {
    /// Index of a column, compared case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// First cell of the first row.
    pub fn scalar(&self) -> Option<&str> {
        self.rows.first()?.first()?.as_deref()
    }
}

/// Trait for warehouse connections.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Execute a statement with positional bindings.
    async fn query(&self, sql: &str, bindings: &[Binding]) -> Result<QueryResult>;

    /// End the session.
    async fn close(&self) -> Result<()>;
}

/// Run a remote call, failing with [`DocChatError::Timeout`] once `limit` passes.
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| DocChatError::Timeout {
            operation: operation.to_string(),
            seconds: limit.as_secs(),
        })?
}

/// Check that a configured object name can be spliced into SQL.
///
/// Accepts plain and dot-qualified identifiers such as `docs`,
/// `MY_DB.PUBLIC.DOCS_CHUNKS_TABLE`.
pub fn validate_identifier(name: &str) -> Result<&str> {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    let re = IDENT.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*){0,2}$")
            .expect("identifier pattern is valid")
    });

    if re.is_match(name) {
        Ok(name)
    } else {
        Err(DocChatError::Config(format!(
            "'{}' is not a valid object name",
            name
        )))
    }
}

/// Check that a model name can be embedded in a string literal.
pub fn validate_model_name(name: &str) -> Result<&str> {
    static MODEL: OnceLock<Regex> = OnceLock::new();
    let re = MODEL.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("model pattern is valid"));

    if re.is_match(name) {
        Ok(name)
    } else {
        Err(DocChatError::Config(format!("'{}' is not a valid model name", name)))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("docs").is_ok());
        assert!(validate_identifier("CC_DB.PUBLIC.docs_chunks_table").is_ok());
        assert!(validate_identifier("docs; DROP TABLE x").is_err());
        assert!(validate_identifier("a.b.c.d").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn test_validate_model_name() {
        assert!(validate_model_name("e5-base-v2").is_ok());
        assert!(validate_model_name("llama3.1-8b").is_ok());
        assert!(validate_model_name("x') --").is_err());
    }

    #[test]
    fn test_query_result_helpers() {
        let result = QueryResult {
            columns: vec!["CHUNK".to_string(), "RELATIVE_PATH".to_string()],
            rows: vec![vec![Some("text".to_string()), None]],
        };
        assert_eq!(result.column_index("relative_path"), Some(1));
        assert_eq!(result.column_index("similarity"), None);
        assert_eq!(result.scalar(), Some("text"));
        assert_eq!(Binding::from(3i64).type_name(), "FIXED");
        assert_eq!(Binding::from("q").wire_value(), "q");
    }
}
