/// Runtime Execution Engine
///
/// This module turns the current graph into runs. It handles:
/// - Deterministic run ordering with petgraph
/// - Per-node action dispatch (scripts, HTTP calls, expressions)
/// - Sequential run assembly with partial-failure tolerance
/// - Manual and scheduled invocation with abort
/// - Recording the current execution and reporting notices

// Kahn-style run ordering over the node graph
pub mod order;

// Sandboxed Lua for RunCode scripts and Computation expressions
pub mod script;

// Individual node execution handlers
pub mod executor;

// Run assembly and error aggregation
pub mod engine;

// Current execution and selected entry
pub mod recorder;

// User-facing notices
pub mod notify;

// Trigger controller for manual and scheduled runs
pub mod scheduler;

// Re-export main types
pub use engine::ExecutionEngine;
pub use executor::{ActionDispatcher, ActionOutcome};
pub use notify::{MemoryNotifier, Notice, Notifier};
pub use recorder::{EntryStatus, Execution, ExecutionEntry, ExecutionRecorder, ExecutionStatus};
pub use scheduler::{RunOutcome, TriggerController, TriggerState};
