use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::controller::build_view;
use super::models::Category;
use super::registry::CardRegistry;
use super::store::{DocumentKey, DocumentStore};
use super::sync::decode_items;
use super::ws::{WsMessage, broadcast_message};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub ws_tx: broadcast::Sender<WsMessage>,
    pub board_key: DocumentKey,
    pub default_category: Category,
}

pub type SharedState = Arc<AppState>;

// ── Query types ───────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct BoardQuery {
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct WriteQuery {
    #[serde(default)]
    pub merge: bool,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/board", get(get_board))
        .route(
            "/api/documents/{collection}/{document}",
            get(get_document).put(put_document),
        )
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn get_board(
    State(state): State<SharedState>,
    Query(query): Query<BoardQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let category = match query.category.as_deref() {
        Some(c) if !c.is_empty() => c.parse::<Category>().map_err(ApiError::BadRequest)?,
        _ => state.default_category,
    };
    let doc = state
        .store
        .get(&state.board_key)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let cards = decode_items(&state.board_key, doc.as_ref()).map_err(|e| ApiError::Internal(e.to_string()))?;
    let registry = CardRegistry::from_cards(cards);
    let view = build_view(&registry, category, query.search.as_deref().unwrap_or(""));
    Ok(Json(view))
}

async fn get_document(
    State(state): State<SharedState>,
    Path((collection, document)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let key = DocumentKey::new(collection, document);
    let doc = state
        .store
        .get(&key)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    match doc {
        Some(doc) => Ok(Json(doc)),
        None => Err(ApiError::NotFound(format!("Document {} not found", key))),
    }
}

async fn put_document(
    State(state): State<SharedState>,
    Path((collection, document)): Path<(String, String)>,
    Query(query): Query<WriteQuery>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    if !body.is_object() {
        return Err(ApiError::BadRequest("Document body must be a JSON object".into()));
    }
    let key = DocumentKey::new(collection, document);
    if key == state.board_key
        && let Err(e) = decode_items(&key, Some(&body))
    {
        warn!(key = %key, error = %e, "rejected unreadable board document");
        return Err(ApiError::BadRequest(e.to_string()));
    }
    let stored = state
        .store
        .set(&key, body, query.merge)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let listeners = broadcast_message(&state.ws_tx, WsMessage::changed(&key, stored.clone()));
    info!(key = %key, merge = query.merge, listeners, "document written");
    Ok(Json(stored))
}

// ── Tests ─────────────────────────────────────────────────────────────
