/// Run control and execution inspection endpoints

use crate::api::{error_response, ApiResult, AppState};
use crate::runtime::notify::Notice;
use crate::runtime::recorder::{Execution, ExecutionEntry};
use crate::runtime::scheduler::RunOutcome;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Request body for entry selection
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectEntryRequest {
    pub entry_id: String,
}

pub fn create_execution_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflow/run", post(run_workflow))
        .route("/api/workflow/abort", post(abort_workflow))
        .route("/api/workflow/status", get(workflow_status))
        .route("/api/nodes/{id}/execute", post(execute_node))
        .route("/api/execution", get(current_execution).delete(clear_execution))
        .route("/api/execution/selected", get(selected_entry).put(select_entry))
        .route("/api/notices/latest", get(latest_notice))
}

/// Run the current graph according to its trigger node
///
/// POST /api/workflow/run
/// Returns: { "status": "completed", "execution": {...} }
///       or { "status": "scheduled", "firstDelayMs": ..., "intervalMs": ... }
async fn run_workflow(State(state): State<AppState>) -> ApiResult<Value> {
    let body = match state.controller.run_workflow().await? {
        RunOutcome::Completed(execution) => json!({
            "status": "completed",
            "execution": &*execution,
        }),
        RunOutcome::Scheduled { first_delay_ms, interval_ms } => json!({
            "status": "scheduled",
            "firstDelayMs": first_delay_ms,
            "intervalMs": interval_ms,
        }),
    };
    Ok(Json(body))
}

/// POST /api/workflow/abort
async fn abort_workflow(State(state): State<AppState>) -> Json<Value> {
    state.controller.abort();
    Json(json!({ "state": state.controller.state() }))
}

/// GET /api/workflow/status
async fn workflow_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "state": state.controller.state(),
        "armed": state.controller.is_armed(),
    }))
}

/// POST /api/nodes/{id}/execute
async fn execute_node(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Execution> {
    let execution = state.controller.execute_single_node(&id).await?;
    Ok(Json(Execution::clone(&execution)))
}

/// GET /api/execution
async fn current_execution(State(state): State<AppState>) -> ApiResult<Execution> {
    state
        .controller
        .recorder()
        .current()
        .map(|execution| Json(Execution::clone(&execution)))
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "No execution recorded"))
}

/// DELETE /api/execution
async fn clear_execution(State(state): State<AppState>) -> StatusCode {
    state.controller.recorder().clear_execution();
    StatusCode::NO_CONTENT
}

/// GET /api/execution/selected
async fn selected_entry(State(state): State<AppState>) -> ApiResult<ExecutionEntry> {
    state
        .controller
        .recorder()
        .selected_entry()
        .map(Json)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "No entry selected"))
}

/// PUT /api/execution/selected
/// Body: { "entryId": "..." }
async fn select_entry(
    State(state): State<AppState>,
    Json(request): Json<SelectEntryRequest>,
) -> ApiResult<ExecutionEntry> {
    let recorder = state.controller.recorder();
    if !recorder.select_entry(&request.entry_id) {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Entry not found in current execution: {}", request.entry_id),
        ));
    }
    recorder
        .selected_entry()
        .map(Json)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "No entry selected"))
}

/// GET /api/notices/latest
async fn latest_notice(State(state): State<AppState>) -> ApiResult<Notice> {
    state
        .notices
        .latest()
        .map(Json)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "No notices yet"))
}
