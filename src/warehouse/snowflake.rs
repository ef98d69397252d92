//! Snowflake connection over the REST endpoints used by the official drivers.
//!
//! One login request yields a session token; every statement after that is
//! a `query-request` carrying the token. Large results are split into
//! chunks that are downloaded separately, and statements that outlive the
//! initial request are polled through their result URL.

use super::{Binding, QueryResult, Warehouse};
use crate::config::WarehouseSettings;
use crate::error::{DocChatError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

/// Default timeout for the login request.
const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 60;

/// Delay between polls of a statement that is still running.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Response codes meaning "statement accepted, result not ready yet".
const QUERY_IN_PROGRESS: &str = "333333";
const QUERY_IN_PROGRESS_ASYNC: &str = "333334";

const CLIENT_APP_ID: &str = "docchat";

/// An open session against a Snowflake account.
pub struct SnowflakeConnection {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    sequence: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    message: Option<String>,
    code: Option<String>,
    data: Option<Value>,
}

impl Envelope {
    fn failure_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "no message returned".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkRef {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    #[serde(default)]
    rowtype: Vec<RowType>,
    rowset: Option<Vec<Vec<Value>>>,
    rowset_base64: Option<String>,
    #[serde(default)]
    chunks: Vec<ChunkRef>,
    #[serde(default)]
    chunk_headers: HashMap<String, String>,
    qrmk: Option<String>,
    query_id: Option<String>,
    get_result_url: Option<String>,
}

impl SnowflakeConnection {
    /// Open a session with static credentials.
    ///
    /// No retry is attempted: any failure is returned as
    /// [`DocChatError::Connection`].
    #[instrument(skip(settings), fields(account = %settings.account, user = %settings.user))]
    pub async fn connect(settings: &WarehouseSettings) -> Result<Self> {
        let base_url = Self::base_url(settings)?;

        if settings.user.is_empty() || settings.password.is_empty() {
            return Err(DocChatError::Connection(
                "user and password must both be set".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("docchat/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut login_url = base_url.join("/session/v1/login-request")?;
        {
            let mut pairs = login_url.query_pairs_mut();
            pairs.append_pair("requestId", &Uuid::new_v4().to_string());
            if let Some(db) = &settings.database {
                pairs.append_pair("databaseName", db);
            }
            if let Some(schema) = &settings.schema {
                pairs.append_pair("schemaName", schema);
            }
            if let Some(wh) = &settings.warehouse {
                pairs.append_pair("warehouse", wh);
            }
            if let Some(role) = &settings.role {
                pairs.append_pair("roleName", role);
            }
        }

        let body = json!({
            "data": {
                "CLIENT_APP_ID": CLIENT_APP_ID,
                "CLIENT_APP_VERSION": env!("CARGO_PKG_VERSION"),
                "ACCOUNT_NAME": account_name(&settings.account),
                "LOGIN_NAME": settings.user,
                "PASSWORD": settings.password,
                "CLIENT_ENVIRONMENT": {
                    "APPLICATION": CLIENT_APP_ID,
                    "OS": std::env::consts::OS,
                },
                "SESSION_PARAMETERS": {
                    "QUERY_RESULT_FORMAT": "JSON",
                },
            }
        });

        let timeout = Duration::from_secs(
            settings
                .login_timeout_secs
                .unwrap_or(DEFAULT_LOGIN_TIMEOUT_SECS),
        );

        debug!("Logging in at {}", base_url);

        let response = http
            .post(login_url)
            .header(ACCEPT, "application/json")
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| DocChatError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DocChatError::Connection(format!(
                "login returned HTTP {}: {}",
                status,
                text.trim()
            )));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| DocChatError::Connection(format!("malformed login response: {}", e)))?;

        if !envelope.success {
            return Err(DocChatError::Connection(envelope.failure_message()));
        }

        let data: LoginData = serde_json::from_value(envelope.data.unwrap_or(Value::Null))
            .map_err(|e| DocChatError::Connection(format!("login response without token: {}", e)))?;

        info!("Connected to warehouse");

        Ok(Self {
            http,
            base_url,
            token: data.token,
            sequence: AtomicU64::new(0),
        })
    }

    /// URL of the account, honouring an explicit override.
    fn base_url(settings: &WarehouseSettings) -> Result<Url> {
        if let Some(url) = &settings.base_url {
            return Ok(Url::parse(url)?);
        }
        if settings.account.is_empty() {
            return Err(DocChatError::Config(
                "warehouse.account is not set (or SNOWFLAKE_ACCOUNT)".to_string(),
            ));
        }
        Ok(Url::parse(&format!(
            "https://{}.snowflakecomputing.com",
            settings.account
        ))?)
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Snowflake Token=\"{}\"", self.token))
            .map_err(|e| DocChatError::Protocol(e.to_string()))?;
        headers.insert(AUTHORIZATION, value);
        headers.insert(ACCEPT, HeaderValue::from_static("application/snowflake"));
        Ok(headers)
    }

    /// Decode a response body into an envelope, reporting HTTP failures.
    async fn read_envelope(response: reqwest::Response) -> Result<Envelope> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DocChatError::Protocol(format!(
                "HTTP {}: {}",
                status,
                text.trim()
            )));
        }
        Ok(response.json().await?)
    }

    /// Poll the result URL until the statement completes.
    async fn wait_for_result(&self, mut envelope: Envelope) -> Result<Envelope> {
        loop {
            let in_progress = matches!(
                envelope.code.as_deref(),
                Some(QUERY_IN_PROGRESS) | Some(QUERY_IN_PROGRESS_ASYNC)
            );
            if !in_progress {
                return Ok(envelope);
            }

            let data: QueryData = serde_json::from_value(envelope.data.take().unwrap_or(Value::Null))?;
            let result_path = data.get_result_url.ok_or_else(|| {
                DocChatError::Protocol("query in progress without a result URL".to_string())
            })?;

            debug!(query_id = ?data.query_id, "Statement still running, polling");
            tokio::time::sleep(POLL_INTERVAL).await;

            let response = self
                .http
                .get(self.base_url.join(&result_path)?)
                .headers(self.auth_headers()?)
                .send()
                .await?;
            envelope = Self::read_envelope(response).await?;
        }
    }

    /// Download the remaining rows of a chunked result.
    async fn fetch_chunk(&self, chunk: &ChunkRef, data: &QueryData) -> Result<Vec<Vec<Value>>> {
        let mut headers = HeaderMap::new();
        if data.chunk_headers.is_empty() {
            if let Some(qrmk) = &data.qrmk {
                headers.insert(
                    HeaderName::from_static("x-amz-server-side-encryption-customer-algorithm"),
                    HeaderValue::from_static("AES256"),
                );
                headers.insert(
                    HeaderName::from_static("x-amz-server-side-encryption-customer-key"),
                    HeaderValue::from_str(qrmk).map_err(|e| DocChatError::Protocol(e.to_string()))?,
                );
            }
        } else {
            for (name, value) in &data.chunk_headers {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| DocChatError::Protocol(e.to_string()))?;
                let value =
                    HeaderValue::from_str(value).map_err(|e| DocChatError::Protocol(e.to_string()))?;
                headers.insert(name, value);
            }
        }

        let url = self.base_url.join(&chunk.url)?;
        let response = self.http.get(url).headers(headers).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DocChatError::Protocol(format!(
                "result chunk download returned HTTP {}",
                status
            )));
        }

        // Chunks are a comma-separated sequence of row arrays without the outer brackets.
        let body = response.text().await?;
        let rows: Vec<Vec<Value>> = serde_json::from_str(&format!("[{}]", body.trim()))?;
        Ok(rows)
    }
}

#[async_trait]
impl Warehouse for SnowflakeConnection {
    #[instrument(skip(self, sql, bindings), fields(bindings = bindings.len()))]
    async fn query(&self, sql: &str, bindings: &[Binding]) -> Result<QueryResult> {
        let sequence_id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let mut body = json!({
            "sqlText": sql,
            "asyncExec": false,
            "sequenceId": sequence_id,
            "querySubmissionTime": chrono::Utc::now().timestamp_millis(),
        });
        if !bindings.is_empty() {
            body["bindings"] = Value::Object(bindings_payload(bindings));
        }

        let mut url = self.base_url.join("/queries/v1/query-request")?;
        url.query_pairs_mut()
            .append_pair("requestId", &Uuid::new_v4().to_string());

        debug!(sequence_id, "Submitting statement");

        let response = self
            .http
            .post(url)
            .headers(self.auth_headers()?)
            .json(&body)
            .send()
            .await?;

        let envelope = Self::read_envelope(response).await?;
        let mut envelope = self.wait_for_result(envelope).await?;

        if !envelope.success {
            return Err(DocChatError::Query {
                code: envelope.code.clone().unwrap_or_else(|| "unknown".to_string()),
                message: envelope.failure_message(),
            });
        }

        let data: QueryData = serde_json::from_value(envelope.data.take().unwrap_or(Value::Null))?;

        if data.rowset.is_none() && data.rowset_base64.is_some() {
            return Err(DocChatError::Protocol(
                "result arrived in Arrow format; only JSON results are supported".to_string(),
            ));
        }

        let mut raw_rows = data.rowset.clone().unwrap_or_default();
        for chunk in &data.chunks {
            raw_rows.extend(self.fetch_chunk(chunk, &data).await?);
        }

        debug!(query_id = ?data.query_id, rows = raw_rows.len(), "Statement finished");

        Ok(QueryResult {
            columns: data.rowtype.iter().map(|c| c.name.clone()).collect(),
            rows: raw_rows
                .into_iter()
                .map(|row| row.into_iter().map(cell_to_text).collect())
                .collect(),
        })
    }

    async fn close(&self) -> Result<()> {
        let mut url = self.base_url.join("/session")?;
        url.query_pairs_mut().append_pair("delete", "true");

        let response = self
            .http
            .post(url)
            .headers(self.auth_headers()?)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("Session close returned HTTP {}", response.status());
        }
        Ok(())
    }
}

/// Account name as expected by the login payload: the part before any
/// region or cloud suffix.
fn account_name(account: &str) -> &str {
    account.split('.').next().unwrap_or(account)
}

fn bindings_payload(bindings: &[Binding]) -> Map<String, Value> {
    bindings
        .iter()
        .enumerate()
        .map(|(i, b)| {
            (
                (i + 1).to_string(),
                json!({ "type": b.type_name(), "value": b.wire_value() }),
            )
        })
        .collect()
}

fn cell_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::HeaderMap as AxumHeaders;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn login(
        Query(params): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let data = &body["data"];
        if data["PASSWORD"] != "correct" {
            return Json(json!({
                "success": false,
                "code": "390100",
                "message": "Incorrect username or password was specified.",
                "data": { "nextAction": "RETRY_LOGIN" }
            }));
        }
        assert_eq!(data["LOGIN_NAME"], "analyst");
        assert_eq!(params.get("warehouse").map(String::as_str), Some("COMPUTE_WH"));
        assert!(params.contains_key("requestId"));
        Json(json!({ "success": true, "data": { "token": "tok-1" } }))
    }

    async fn query_request(headers: AxumHeaders, Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(
            headers.get("authorization").and_then(|v| v.to_str().ok()),
            Some("Snowflake Token=\"tok-1\"")
        );

        let sql = body["sqlText"].as_str().unwrap_or_default();
        if sql.starts_with("LS") {
            Json(json!({
                "success": true,
                "data": {
                    "rowtype": [{ "name": "name" }, { "name": "size" }],
                    "rowset": [["docs/manual.pdf", "1024"], ["docs/faq.pdf", "2048"]],
                    "queryId": "q-ls"
                }
            }))
        } else if sql.starts_with("SELECT slow") {
            Json(json!({
                "success": true,
                "code": "333334",
                "data": { "getResultUrl": "/queries/q-slow/result", "queryId": "q-slow" }
            }))
        } else if sql.starts_with("SELECT chunked") {
            Json(json!({
                "success": true,
                "data": {
                    "rowtype": [{ "name": "N" }],
                    "rowset": [["1"]],
                    "chunks": [{ "url": "/chunks/0", "rowCount": 2 }],
                    "chunkHeaders": { "x-test-chunk": "yes" }
                }
            }))
        } else if sql.starts_with("SELECT bound") {
            let first = body["bindings"]["1"]["value"].clone();
            let second = body["bindings"]["2"]["type"].clone();
            Json(json!({
                "success": true,
                "data": {
                    "rowtype": [{ "name": "B1" }, { "name": "B2" }],
                    "rowset": [[first, second]]
                }
            }))
        } else {
            Json(json!({
                "success": false,
                "code": "002003",
                "message": "Object 'MISSING' does not exist or not authorized.",
                "data": null
            }))
        }
    }

    async fn slow_result(Path(id): Path<String>) -> Json<Value> {
        Json(json!({
            "success": true,
            "data": {
                "rowtype": [{ "name": "ID" }],
                "rowset": [[id]]
            }
        }))
    }

    async fn chunk(headers: AxumHeaders) -> String {
        assert_eq!(
            headers.get("x-test-chunk").and_then(|v| v.to_str().ok()),
            Some("yes")
        );
        "[\"2\"],[null]".to_string()
    }

    async fn close_session(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        assert_eq!(params.get("delete").map(String::as_str), Some("true"));
        Json(json!({ "success": true }))
    }

    async fn spawn_stub() -> String {
        let app = Router::new()
            .route("/session/v1/login-request", post(login))
            .route("/queries/v1/query-request", post(query_request))
            .route("/queries/{id}/result", get(slow_result))
            .route("/chunks/0", get(chunk))
            .route("/session", post(close_session));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn settings(base_url: &str, password: &str) -> WarehouseSettings {
        WarehouseSettings {
            account: "acme".to_string(),
            user: "analyst".to_string(),
            password: password.to_string(),
            warehouse: Some("COMPUTE_WH".to_string()),
            base_url: Some(base_url.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_login_and_query() {
        let base = spawn_stub().await;
        let conn = SnowflakeConnection::connect(&settings(&base, "correct"))
            .await
            .unwrap();

        let result = conn.query("LS @docs", &[]).await.unwrap();
        assert_eq!(result.columns, vec!["name", "size"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[1][0].as_deref(), Some("docs/faq.pdf"));

        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_login_failure_is_connection_error() {
        let base = spawn_stub().await;
        let err = SnowflakeConnection::connect(&settings(&base, "wrong"))
            .await
            .err()
            .unwrap();
        match err {
            DocChatError::Connection(msg) => assert!(msg.contains("Incorrect username")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected_before_request() {
        let mut s = settings("http://127.0.0.1:9", "");
        s.password.clear();
        assert!(matches!(
            SnowflakeConnection::connect(&s).await,
            Err(DocChatError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_bindings_are_positional() {
        let base = spawn_stub().await;
        let conn = SnowflakeConnection::connect(&settings(&base, "correct"))
            .await
            .unwrap();

        let result = conn
            .query("SELECT bound", &[Binding::from("what is it?"), Binding::from(3i64)])
            .await
            .unwrap();
        assert_eq!(result.rows[0][0].as_deref(), Some("what is it?"));
        assert_eq!(result.rows[0][1].as_deref(), Some("FIXED"));
    }

    #[tokio::test]
    async fn test_polls_running_statement() {
        let base = spawn_stub().await;
        let conn = SnowflakeConnection::connect(&settings(&base, "correct"))
            .await
            .unwrap();

        let result = conn.query("SELECT slow", &[]).await.unwrap();
        assert_eq!(result.scalar(), Some("q-slow"));
    }

    #[tokio::test]
    async fn test_downloads_result_chunks() {
        let base = spawn_stub().await;
        let conn = SnowflakeConnection::connect(&settings(&base, "correct"))
            .await
            .unwrap();

        let result = conn.query("SELECT chunked", &[]).await.unwrap();
        let cells: Vec<Option<&str>> = result.rows.iter().map(|r| r[0].as_deref()).collect();
        assert_eq!(cells, vec![Some("1"), Some("2"), None]);
    }

    #[tokio::test]
    async fn test_failed_statement_is_query_error() {
        let base = spawn_stub().await;
        let conn = SnowflakeConnection::connect(&settings(&base, "correct"))
            .await
            .unwrap();

        match conn.query("SELECT * FROM missing", &[]).await {
            Err(DocChatError::Query { code, message }) => {
                assert_eq!(code, "002003");
                assert!(message.contains("does not exist"));
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.rows)),
        }
    }

    #[test]
    fn test_account_name_strips_region() {
        assert_eq!(account_name("xy12345.us-east-2.aws"), "xy12345");
        assert_eq!(account_name("myorg-myaccount"), "myorg-myaccount");
    }
}
