/// Graph editing REST API endpoints
///
/// Every edit swaps in a new graph snapshot; runs already in flight keep the
/// snapshot they started with.

use crate::api::{error_response, ApiError, ApiResult, AppState};
use crate::error::EngineError;
use crate::runtime::notify::{Notice, Notifier};
use crate::workflow::store::{ImportSummary, NodeDraft};
use crate::workflow::transfer::GraphDocument;
use crate::workflow::types::{Edge, Node, UserInput};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Partial node update; absent fields are left untouched
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    pub label: Option<String>,
    pub muted: Option<bool>,
    pub user_input: Option<UserInput>,
}

/// Request body for edge creation
#[derive(Debug, Deserialize)]
pub struct EdgeRequest {
    pub source: String,
    pub target: String,
}

pub fn create_graph_routes() -> Router<AppState> {
    Router::new()
        .route("/api/graph", get(export_graph).delete(clear_graph))
        .route("/api/graph/import", post(import_graph))
        .route("/api/nodes", post(add_node))
        .route("/api/nodes/{id}", patch(update_node).delete(remove_node))
        .route("/api/edges", post(add_edge))
        .route("/api/edges/{id}", delete(remove_edge))
}

/// GET /api/graph
async fn export_graph(State(state): State<AppState>) -> Json<GraphDocument> {
    Json(state.store.export())
}

/// DELETE /api/graph
async fn clear_graph(State(state): State<AppState>) -> Json<Value> {
    state.store.clear();
    tracing::info!("🧹 Graph cleared");
    Json(json!({ "message": "Graph cleared" }))
}

/// Merge an exported document into the current graph
///
/// POST /api/graph/import
/// Body: raw document JSON, validated as a whole before anything is added
async fn import_graph(State(state): State<AppState>, body: String) -> ApiResult<ImportSummary> {
    match state.store.import_json(&body) {
        Ok(summary) => Ok(Json(summary)),
        Err(e) => {
            tracing::warn!("📥 Import rejected: {}", e);
            state.notices.notify(Notice::error(e.to_string()));
            Err(e.into())
        }
    }
}

/// POST /api/nodes
/// Body: { "label": "...", "actionType": "...", "position": {...}, "userInput": {...} }
async fn add_node(State(state): State<AppState>, Json(draft): Json<NodeDraft>) -> (StatusCode, Json<Node>) {
    let node = state.store.add_node(draft);
    tracing::info!("➕ Created node: {} ({})", node.id, node.label);
    (StatusCode::CREATED, Json(node))
}

/// PATCH /api/nodes/{id}
async fn update_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<NodePatch>,
) -> ApiResult<Node> {
    if !state.store.snapshot().contains(&id) {
        return Err(EngineError::NodeNotFound(id).into());
    }
    if let Some(label) = update.label {
        state.store.rename_node(&id, label)?;
    }
    if let Some(muted) = update.muted {
        state.store.set_muted(&id, muted)?;
    }
    if let Some(user_input) = update.user_input {
        state.store.update_user_input(&id, user_input)?;
    }

    let graph = state.store.snapshot();
    let node = graph.node(&id).cloned().ok_or(EngineError::NodeNotFound(id))?;
    Ok(Json(node))
}

/// DELETE /api/nodes/{id}
async fn remove_node(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Node> {
    let node = state.store.remove_node(&id)?;
    tracing::info!("🗑️ Deleted node: {}", node.id);
    Ok(Json(node))
}

/// POST /api/edges
/// Body: { "source": "...", "target": "..." }
async fn add_edge(
    State(state): State<AppState>,
    Json(request): Json<EdgeRequest>,
) -> Result<(StatusCode, Json<Edge>), ApiError> {
    state
        .store
        .add_edge(&request.source, &request.target)
        .map(|edge| (StatusCode::CREATED, Json(edge)))
        .ok_or_else(|| {
            error_response(
                StatusCode::BAD_REQUEST,
                format!("Edge endpoints must be existing nodes: {} -> {}", request.source, request.target),
            )
        })
}

/// DELETE /api/edges/{id}
async fn remove_edge(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    if state.store.remove_edge(&id) {
        Ok(Json(json!({ "message": "Edge deleted" })))
    } else {
        Err(error_response(StatusCode::NOT_FOUND, format!("Edge not found: {}", id)))
    }
}
