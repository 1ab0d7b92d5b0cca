/// Core graph model definitions
///
/// Nodes, edges and the graph snapshot handed to the engine. The engine only
/// reads these; creation and mutation happen through `GraphStore`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Field-key to value mapping configured on a node (e.g. `URL`, `METHOD`)
pub type UserInput = Map<String, Value>;

/// Canvas position, carried through but irrelevant to execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Action kind attached to a node
///
/// Serialized as the wire strings used by exported documents. Unrecognised
/// strings are preserved in `Unknown` so they survive an import/export cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    ManualTrigger,
    ScheduleTrigger,
    RunCode,
    ApiCall,
    Computation,
    Unknown(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::ManualTrigger => "manual_trigger",
            ActionKind::ScheduleTrigger => "schedule_trigger",
            ActionKind::RunCode => "run_code",
            ActionKind::ApiCall => "api_call",
            ActionKind::Computation => "computation",
            ActionKind::Unknown(raw) => raw,
        }
    }

    pub fn is_trigger(&self) -> bool {
        matches!(self, ActionKind::ManualTrigger | ActionKind::ScheduleTrigger)
    }
}

impl From<&str> for ActionKind {
    fn from(raw: &str) -> Self {
        match raw {
            "manual_trigger" => ActionKind::ManualTrigger,
            "schedule_trigger" => ActionKind::ScheduleTrigger,
            "run_code" => ActionKind::RunCode,
            "api_call" => ActionKind::ApiCall,
            "computation" => ActionKind::Computation,
            other => ActionKind::Unknown(other.to_string()),
        }
    }
}

impl From<String> for ActionKind {
    fn from(raw: String) -> Self {
        ActionKind::from(raw.as_str())
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single node in the workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique node identifier
    pub id: String,
    /// Human-readable name shown in execution entries
    pub label: String,
    #[serde(default)]
    pub position: Position,
    pub action_kind: ActionKind,
    /// Marks the node as a run entry point
    pub is_trigger: bool,
    /// Muted nodes keep their place in the run order but are never dispatched
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub user_input: UserInput,
    /// Opaque code blob carried through import/export
    #[serde(default)]
    pub executable_code: String,
}

impl Node {
    /// Create a node with the trigger flag derived from its action kind
    pub fn new(id: impl Into<String>, label: impl Into<String>, action_kind: ActionKind) -> Self {
        let is_trigger = action_kind.is_trigger();
        Self {
            id: id.into(),
            label: label.into(),
            position: Position::default(),
            action_kind,
            is_trigger,
            muted: false,
            user_input: UserInput::new(),
            executable_code: String::new(),
        }
    }

    /// Builder-style helper for setting one user input field
    pub fn with_input(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.user_input.insert(key.to_string(), value.into());
        self
    }

    pub fn muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }

    /// String value of a user input field, if present and a string
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.user_input.get(key).and_then(Value::as_str)
    }
}

/// Directed connection between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("e-{}", uuid::Uuid::new_v4()),
            source,
            target,
        }
    }
}

/// Graph snapshot: nodes in insertion order plus their connections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    /// Build a graph, dropping edges whose endpoints are not present
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut graph = Self { nodes, edges: Vec::with_capacity(edges.len()) };
        for edge in edges {
            graph.push_edge(edge);
        }
        graph
    }

    /// The authoritative trigger: first `is_trigger` node in insertion order
    pub fn trigger_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|node| node.is_trigger)
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == node_id)
    }

    pub fn node_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id == node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.node(node_id).is_some()
    }

    /// Append an edge if both endpoints exist; returns whether it was kept
    pub fn push_edge(&mut self, edge: Edge) -> bool {
        if self.contains(&edge.source) && self.contains(&edge.target) {
            self.edges.push(edge);
            true
        } else {
            tracing::debug!("✂️ Dropping edge '{}' → '{}' with unknown endpoint", edge.source, edge.target);
            false
        }
    }

    /// Remove a node together with every edge touching it
    pub fn remove_node(&mut self, node_id: &str) -> Option<Node> {
        let position = self.nodes.iter().position(|node| node.id == node_id)?;
        let removed = self.nodes.remove(position);
        self.edges.retain(|edge| edge.source != node_id && edge.target != node_id);
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_trigger_in_insertion_order_wins() {
        let graph = Graph::new(
            vec![
                Node::new("a", "Step", ActionKind::Computation),
                Node::new("t2", "Schedule", ActionKind::ScheduleTrigger),
                Node::new("t1", "Manual", ActionKind::ManualTrigger),
            ],
            vec![],
        );
        assert_eq!(graph.trigger_node().map(|n| n.id.as_str()), Some("t2"));
    }

    #[test]
    fn edges_with_unknown_endpoints_are_dropped() {
        let graph = Graph::new(
            vec![Node::new("a", "A", ActionKind::ManualTrigger), Node::new("b", "B", ActionKind::RunCode)],
            vec![Edge::new("a", "b"), Edge::new("a", "ghost"), Edge::new("ghost", "b")],
        );
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].target, "b");
    }

    #[test]
    fn removing_a_node_removes_its_edges() {
        let mut graph = Graph::new(
            vec![
                Node::new("a", "A", ActionKind::ManualTrigger),
                Node::new("b", "B", ActionKind::RunCode),
                Node::new("c", "C", ActionKind::RunCode),
            ],
            vec![Edge::new("a", "b"), Edge::new("b", "c"), Edge::new("a", "c")],
        );
        assert!(graph.remove_node("b").is_some());
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert!(graph.remove_node("b").is_none());
    }

    #[test]
    fn unknown_action_kind_round_trips() {
        let kind: ActionKind = serde_json::from_str("\"send_email\"").unwrap();
        assert_eq!(kind, ActionKind::Unknown("send_email".to_string()));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"send_email\"");
        assert_eq!(serde_json::to_string(&ActionKind::ApiCall).unwrap(), "\"api_call\"");
    }
}
