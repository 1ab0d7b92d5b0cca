/// HTTP API Layer
///
/// This module exposes the engine to the canvas collaborator over REST:
/// - Graph editing (nodes, edges, import/export)
/// - Manual runs, schedule arming and abort
/// - Execution inspection and the latest notice

// Graph editing endpoints
pub mod graph;

// Run control and execution inspection endpoints
pub mod executions;

use crate::error::EngineError;
use crate::runtime::notify::MemoryNotifier;
use crate::runtime::scheduler::TriggerController;
use crate::workflow::store::GraphStore;
use axum::{http::StatusCode, response::Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Current graph snapshot holder
    pub store: Arc<GraphStore>,
    /// Run and schedule control for the current graph
    pub controller: Arc<TriggerController>,
    /// Notice board polled by the UI
    pub notices: Arc<MemoryNotifier>,
}

/// Error response: status code plus `{error: message}`
pub type ApiError = (StatusCode, Json<Value>);

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Build every API route on top of the shared state
pub fn create_api_routes(state: AppState) -> Router {
    Router::new()
        .merge(graph::create_graph_routes())
        .merge(executions::create_execution_routes())
        .with_state(state)
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

impl From<EngineError> for (StatusCode, Json<Value>) {
    fn from(error: EngineError) -> Self {
        let status = match &error {
            EngineError::NodeNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::RunInProgress => StatusCode::CONFLICT,
            _ => StatusCode::BAD_REQUEST,
        };
        error_response(status, error.to_string())
    }
}
