/// Flowdeck: trigger-driven node graph workflow engine
///
/// This library resolves a graph of trigger and action nodes into a
/// deterministic run order, dispatches each node to its action, and records
/// partial-failure-tolerant executions for manual and scheduled runs.

// Core configuration and setup
pub mod config;

// Engine error taxonomy
pub mod error;

// Workflow graph layer - node/edge model, store, import/export
pub mod workflow;

// Runtime execution engine - ordering, dispatch, triggers, recording
pub mod runtime;

// HTTP API layer - REST endpoints for graph editing and run control
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use error::{EngineError, EngineResult};
pub use runtime::{Execution, ExecutionEntry, TriggerController};
pub use server::{create_app, start_server};
pub use workflow::{ActionKind, Edge, Graph, GraphStore, Node};
