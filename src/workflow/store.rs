/// Hot-swappable graph store using ArcSwap
///
/// Holds the single "current graph" snapshot. Readers (runs, scheduled ticks)
/// take a cheap `Arc` snapshot and keep using it even while collaborators edit
/// the graph; every edit swaps in a new snapshot atomically.

use crate::error::{EngineError, EngineResult};
use crate::workflow::transfer::{self, GraphDocument};
use crate::workflow::types::{ActionKind, Edge, Graph, Node, Position, UserInput};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Lock-free graph snapshot with serialized writers
#[derive(Debug)]
pub struct GraphStore {
    graph: ArcSwap<Graph>,
    /// Serializes read-modify-swap cycles so concurrent edits are not lost
    write_lock: Mutex<()>,
}

/// Collaborator request for a new node
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDraft {
    pub label: String,
    pub action_type: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub user_input: UserInput,
    #[serde(default)]
    pub executable_code: String,
}

/// Outcome of merging an import document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub nodes_added: usize,
    pub edges_added: usize,
    pub edges_dropped: usize,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new(Graph::default())
    }
}

impl GraphStore {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph: ArcSwap::new(Arc::new(graph)),
            write_lock: Mutex::new(()),
        }
    }

    /// Current graph snapshot (lock-free read)
    pub fn snapshot(&self) -> Arc<Graph> {
        self.graph.load_full()
    }

    /// Replace the whole graph, dropping edges with unknown endpoints
    pub fn replace(&self, graph: Graph) {
        let graph = Graph::new(graph.nodes, graph.edges);
        let _guard = self.lock();
        tracing::info!("🔄 Replacing graph: {} nodes, {} edges", graph.nodes.len(), graph.edges.len());
        self.graph.store(Arc::new(graph));
    }

    pub fn clear(&self) {
        self.replace(Graph::default());
    }

    /// Add a node built from a collaborator draft; returns the stored node
    pub fn add_node(&self, draft: NodeDraft) -> Node {
        let action_kind = ActionKind::from(draft.action_type);
        let mut node = Node::new(format!("node-{}", uuid::Uuid::new_v4()), draft.label, action_kind);
        node.position = draft.position;
        node.user_input = draft.user_input;
        node.executable_code = draft.executable_code;

        tracing::debug!("➕ Adding node '{}' ({})", node.id, node.action_kind);
        let stored = node.clone();
        self.apply(|graph| graph.nodes.push(node));
        stored
    }

    pub fn rename_node(&self, node_id: &str, label: impl Into<String>) -> EngineResult<()> {
        let label = label.into();
        self.modify(|graph| {
            let node = find_mut(graph, node_id)?;
            node.label = label;
            Ok(())
        })
    }

    pub fn set_muted(&self, node_id: &str, muted: bool) -> EngineResult<()> {
        self.modify(|graph| {
            find_mut(graph, node_id)?.muted = muted;
            Ok(())
        })
    }

    /// Replace a node's configured field values
    pub fn update_user_input(&self, node_id: &str, user_input: UserInput) -> EngineResult<()> {
        self.modify(|graph| {
            find_mut(graph, node_id)?.user_input = user_input;
            Ok(())
        })
    }

    /// Delete a node and every edge attached to it
    pub fn remove_node(&self, node_id: &str) -> EngineResult<Node> {
        self.modify(|graph| {
            graph
                .remove_node(node_id)
                .ok_or_else(|| EngineError::NodeNotFound(node_id.to_string()))
        })
    }

    /// Connect two nodes; edges with an unknown endpoint are dropped and `None` returned
    pub fn add_edge(&self, source: &str, target: &str) -> Option<Edge> {
        let edge = Edge::new(source, target);
        let kept = self.apply(|graph| graph.push_edge(edge.clone()));
        kept.then_some(edge)
    }

    pub fn remove_edge(&self, edge_id: &str) -> bool {
        self.apply(|graph| {
            let before = graph.edges.len();
            graph.edges.retain(|edge| edge.id != edge_id);
            graph.edges.len() != before
        })
    }

    /// Validate and merge an import document; nothing is added on rejection
    pub fn import_json(&self, raw: &str) -> EngineResult<ImportSummary> {
        let batch = transfer::parse_import(raw)?;
        let summary = ImportSummary {
            nodes_added: batch.nodes.len(),
            edges_added: batch.edges.len(),
            edges_dropped: batch.dropped_edges,
        };
        self.apply(|graph| {
            graph.nodes.extend(batch.nodes);
            graph.edges.extend(batch.edges);
        });
        tracing::info!("📥 Imported {} nodes and {} edges", summary.nodes_added, summary.edges_added);
        Ok(summary)
    }

    pub fn export(&self) -> GraphDocument {
        transfer::export_graph(&self.snapshot())
    }

    /// Clone the current graph, apply `f`, and swap the result in on success
    fn modify<T>(&self, f: impl FnOnce(&mut Graph) -> EngineResult<T>) -> EngineResult<T> {
        let _guard = self.lock();
        let mut next = (*self.graph.load_full()).clone();
        let value = f(&mut next)?;
        self.graph.store(Arc::new(next));
        Ok(value)
    }

    fn apply<T>(&self, f: impl FnOnce(&mut Graph) -> T) -> T {
        let _guard = self.lock();
        let mut next = (*self.graph.load_full()).clone();
        let value = f(&mut next);
        self.graph.store(Arc::new(next));
        value
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn find_mut<'a>(graph: &'a mut Graph, node_id: &str) -> EngineResult<&'a mut Node> {
    graph
        .node_mut(node_id)
        .ok_or_else(|| EngineError::NodeNotFound(node_id.to_string()))
}
