//! HTTP API server for integration with other systems.
//!
//! Exposes the chat flow over REST. Sessions live in memory and each one is
//! guarded by its own lock, so a session never runs two requests at once.

use super::connect;
use crate::cli::Output;
use crate::config::Settings;
use crate::error::DocChatError;
use crate::orchestrator::Orchestrator;
use crate::session::ChatSession;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
    sessions: Mutex<HashMap<Uuid, Arc<Mutex<ChatSession>>>>,
}

impl AppState {
    async fn session(&self, id: Uuid) -> Result<Arc<Mutex<ChatSession>>, ApiError> {
        self.sessions
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("Session not found: {}", id)))
    }
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    // No connection, no server.
    let orchestrator = connect(settings).await?;
    let app = router(orchestrator);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("docchat API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Documents", "GET    /documents");
    Output::kv("Models", "GET    /models");
    Output::kv("New session", "POST   /sessions");
    Output::kv("Get session", "GET    /sessions/{id}");
    Output::kv("Update session", "PATCH  /sessions/{id}");
    Output::kv("End session", "DELETE /sessions/{id}");
    Output::kv("Ask", "POST   /sessions/{id}/messages");
    Output::kv("Start over", "DELETE /sessions/{id}/messages");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}

fn router(orchestrator: Orchestrator) -> Router {
    let state = Arc::new(AppState {
        orchestrator,
        sessions: Mutex::new(HashMap::new()),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/documents", get(list_documents))
        .route("/models", get(list_models))
        .route("/sessions", post(create_session))
        .route(
            "/sessions/{id}",
            get(get_session).patch(update_session).delete(delete_session),
        )
        .route(
            "/sessions/{id}/messages",
            post(send_message).delete(clear_messages),
        )
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Debug, Default, Deserialize)]
struct SessionOptions {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    use_chat_history: Option<bool>,
    #[serde(default)]
    debug: Option<bool>,
}

#[derive(Deserialize)]
struct MessageRequest {
    question: String,
}

#[derive(Serialize)]
struct SessionView {
    id: Uuid,
    #[serde(flatten)]
    session: ChatSession,
}

#[derive(Serialize)]
struct ModelsResponse {
    default: String,
    models: Vec<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// An error rendered as a JSON body with a status code.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: String) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message,
        }
    }
}

impl From<DocChatError> for ApiError {
    fn from(err: DocChatError) -> Self {
        let status = match &err {
            DocChatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DocChatError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            DocChatError::Connection(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Request failed: {}", err);
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Apply the optional fields of a create/update body.
fn apply_options(
    orchestrator: &Orchestrator,
    session: &mut ChatSession,
    options: SessionOptions,
) -> Result<(), ApiError> {
    if let Some(model) = options.model {
        orchestrator.select_model(session, &model)?;
    }
    if let Some(use_chat_history) = options.use_chat_history {
        session.use_chat_history = use_chat_history;
    }
    if let Some(debug) = options.debug {
        session.debug = debug;
    }
    Ok(())
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_documents(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let documents = state.orchestrator.list_documents().await?;
    Ok(Json(serde_json::json!({
        "total": documents.len(),
        "documents": documents,
    })))
}

async fn list_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let chat = &state.orchestrator.settings().chat;
    Json(ModelsResponse {
        default: chat.default_model.clone(),
        models: chat.models.clone(),
    })
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    options: Option<Json<SessionOptions>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.orchestrator.new_session();
    let options = options.map(|Json(o)| o).unwrap_or_default();
    apply_options(&state.orchestrator, &mut session, options)?;

    let id = Uuid::new_v4();
    let view = SessionView {
        id,
        session: session.clone(),
    };
    state
        .sessions
        .lock()
        .await
        .insert(id, Arc::new(Mutex::new(session)));

    info!("Created session {}", id);
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.session(id).await?;
    let session = session.lock().await.clone();
    Ok(Json(SessionView { id, session }))
}

async fn update_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(options): Json<SessionOptions>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.session(id).await?;
    let mut guard = session.lock().await;

    // Validate against a copy so a rejected model leaves the session as is.
    let mut updated = guard.clone();
    apply_options(&state.orchestrator, &mut updated, options)?;
    *guard = updated;

    Ok(Json(SessionView {
        id,
        session: guard.clone(),
    }))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.sessions.lock().await.remove(&id);
    match removed {
        Some(_) => {
            info!("Removed session {}", id);
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::not_found(format!("Session not found: {}", id))),
    }
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<MessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.session(id).await?;
    let mut guard = session.lock().await;

    let turn = state
        .orchestrator
        .engine()
        .respond(&mut guard, &req.question)
        .await?;

    Ok(Json(turn))
}

async fn clear_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.session(id).await?;
    session.lock().await.clear();
    Ok(StatusCode::NO_CONTENT)
}
