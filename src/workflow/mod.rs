/// Workflow Graph Layer
///
/// This module holds the graph the engine runs:
/// - Type definitions (Node, Edge, Graph, ActionKind)
/// - Typed action configuration resolved from node user input
/// - Lock-free hot-swappable graph store using ArcSwap
/// - JSON export/import of graph documents

// Core graph type definitions
pub mod types;

// Typed per-kind action configuration
pub mod action;

// Hot-swappable store of the current graph
pub mod store;

// Graph document export and validated import
pub mod transfer;

// Re-export commonly used types
pub use action::{Action, ScheduleConfig};
pub use store::{GraphStore, NodeDraft};
pub use types::{ActionKind, Edge, Graph, Node};
