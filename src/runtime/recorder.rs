/// Execution records and the recorder that owns the current one
///
/// Only one execution is kept. Recording a new run replaces the previous one
/// and selects its first entry for inspection; there is no history.

use crate::workflow::types::{Node, UserInput};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Status of a single node's entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Success,
    Error,
    Skipped,
}

/// Aggregate status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
}

/// Result of one node within a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEntry {
    pub id: String,
    pub node_id: String,
    pub node_name: String,
    /// The node's configured field values at the time of the run
    pub input: UserInput,
    /// Action-specific result mapping, or `{error: message}`
    pub output: Value,
    pub duration_ms: u64,
    pub status: EntryStatus,
}

impl ExecutionEntry {
    pub fn new(node: &Node, output: Value, duration_ms: u64, status: EntryStatus) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            node_id: node.id.clone(),
            node_name: node.label.clone(),
            input: node.user_input.clone(),
            output,
            duration_ms,
            status,
        }
    }

    /// Synthetic entry for a muted node
    pub fn skipped(node: &Node) -> Self {
        Self::new(
            node,
            json!({"skipped": true, "reason": "Node is disabled"}),
            0,
            EntryStatus::Skipped,
        )
    }

    /// Entry for an ordered id that no longer resolves to a node
    pub fn missing(node_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            node_id: node_id.to_string(),
            node_name: node_id.to_string(),
            input: UserInput::new(),
            output: json!({"message": "Node not found"}),
            duration_ms: 0,
            status: EntryStatus::Error,
        }
    }

    /// The `output.error` message, when the entry failed with one
    pub fn error_message(&self) -> Option<&str> {
        self.output.get("error").and_then(Value::as_str)
    }
}

/// Record of one full run (or one single-node run)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: ExecutionStatus,
    pub trigger_description: String,
    pub entries: Vec<ExecutionEntry>,
}

impl Execution {
    /// Assemble an execution; status is error if any entry errored
    pub fn new(
        started_at: DateTime<Utc>,
        duration_ms: u64,
        trigger_description: impl Into<String>,
        entries: Vec<ExecutionEntry>,
    ) -> Self {
        let status = if entries.iter().any(|entry| entry.status == EntryStatus::Error) {
            ExecutionStatus::Error
        } else {
            ExecutionStatus::Success
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at,
            duration_ms,
            status,
            trigger_description: trigger_description.into(),
            entries,
        }
    }

    pub fn first_error(&self) -> Option<&ExecutionEntry> {
        self.entries.iter().find(|entry| entry.status == EntryStatus::Error)
    }

    pub fn entry(&self, entry_id: &str) -> Option<&ExecutionEntry> {
        self.entries.iter().find(|entry| entry.id == entry_id)
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    execution: Option<Arc<Execution>>,
    selected: Option<String>,
}

/// Owner of the current execution and the inspected entry
#[derive(Debug, Default)]
pub struct ExecutionRecorder {
    state: ArcSwap<RecorderState>,
}

impl ExecutionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current execution and select its first entry
    pub fn set_execution(&self, execution: Execution) -> Arc<Execution> {
        let execution = Arc::new(execution);
        let selected = execution.entries.first().map(|entry| entry.id.clone());
        tracing::debug!("🗂️ Recording execution {} ({} entries)", execution.id, execution.entries.len());
        self.state.store(Arc::new(RecorderState {
            execution: Some(Arc::clone(&execution)),
            selected,
        }));
        execution
    }

    pub fn clear_execution(&self) {
        tracing::debug!("🧹 Clearing current execution");
        self.state.store(Arc::new(RecorderState::default()));
    }

    /// Select an entry of the current execution; false if it does not belong to it
    pub fn select_entry(&self, entry_id: &str) -> bool {
        let mut found = false;
        self.state.rcu(|state| {
            found = state
                .execution
                .as_ref()
                .is_some_and(|execution| execution.entry(entry_id).is_some());
            if found {
                Arc::new(RecorderState {
                    execution: state.execution.clone(),
                    selected: Some(entry_id.to_string()),
                })
            } else {
                Arc::clone(state)
            }
        });
        found
    }

    pub fn current(&self) -> Option<Arc<Execution>> {
        self.state.load().execution.clone()
    }

    pub fn selected_entry(&self) -> Option<ExecutionEntry> {
        let state = self.state.load();
        let selected = state.selected.as_deref()?;
        state.execution.as_ref()?.entry(selected).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::ActionKind;

    fn execution(statuses: &[EntryStatus]) -> Execution {
        let entries = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                let node = Node::new(format!("n{}", i), format!("Node {}", i), ActionKind::Computation);
                ExecutionEntry::new(&node, json!({"result": i}), 1, *status)
            })
            .collect();
        Execution::new(Utc::now(), 3, "Manual trigger", entries)
    }

    #[test]
    fn status_is_error_when_any_entry_errors() {
        assert_eq!(execution(&[EntryStatus::Success, EntryStatus::Skipped]).status, ExecutionStatus::Success);
        assert_eq!(execution(&[EntryStatus::Success, EntryStatus::Error]).status, ExecutionStatus::Error);
        assert_eq!(execution(&[]).status, ExecutionStatus::Success);
    }

    #[test]
    fn recording_selects_first_entry_and_replaces_previous() {
        let recorder = ExecutionRecorder::new();
        assert!(recorder.current().is_none());

        let first = recorder.set_execution(execution(&[EntryStatus::Success, EntryStatus::Success]));
        assert_eq!(recorder.selected_entry().map(|e| e.id), Some(first.entries[0].id.clone()));

        let second = recorder.set_execution(execution(&[EntryStatus::Error]));
        assert_eq!(recorder.current().map(|e| e.id.clone()), Some(second.id.clone()));
        assert_eq!(recorder.selected_entry().map(|e| e.id), Some(second.entries[0].id.clone()));
    }

    #[test]
    fn selecting_entries() {
        let recorder = ExecutionRecorder::new();
        let recorded = recorder.set_execution(execution(&[EntryStatus::Success, EntryStatus::Error]));

        assert!(recorder.select_entry(&recorded.entries[1].id));
        assert_eq!(recorder.selected_entry().map(|e| e.node_id), Some("n1".to_string()));

        assert!(!recorder.select_entry("not-an-entry"));
        assert_eq!(recorder.selected_entry().map(|e| e.node_id), Some("n1".to_string()));
    }

    #[test]
    fn clearing_discards_execution_and_selection() {
        let recorder = ExecutionRecorder::new();
        recorder.set_execution(execution(&[EntryStatus::Success]));
        recorder.clear_execution();
        assert!(recorder.current().is_none());
        assert!(recorder.selected_entry().is_none());
        assert!(!recorder.select_entry("anything"));
    }

    #[test]
    fn skipped_entries_have_zero_duration() {
        let node = Node::new("m", "Muted", ActionKind::RunCode).muted(true);
        let entry = ExecutionEntry::skipped(&node);
        assert_eq!(entry.status, EntryStatus::Skipped);
        assert_eq!(entry.duration_ms, 0);
        assert_eq!(entry.output, json!({"skipped": true, "reason": "Node is disabled"}));
    }
}
