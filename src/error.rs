/// Engine error taxonomy
///
/// Validation failures are surfaced to the caller immediately and never produce
/// an execution record. Failures of individual actions are not represented here:
/// the action dispatcher turns them into `{error: message}` entries instead.

use thiserror::Error;

/// Errors surfaced by graph operations and the trigger controller
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No trigger node found in workflow")]
    NoTriggerNode,

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid schedule configuration: {0}")]
    InvalidSchedule(String),

    #[error("Import rejected: node #{index} {reason}")]
    InvalidImport { index: usize, reason: String },

    #[error("Import rejected: {0}")]
    InvalidDocument(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("A workflow run is already in progress")]
    RunInProgress,
}

impl EngineError {
    /// Whether this error belongs to the user-facing validation family
    pub fn is_validation(&self) -> bool {
        !matches!(self, EngineError::RunInProgress)
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
