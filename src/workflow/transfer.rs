/// JSON export/import of graph documents
///
/// Export writes the document shape consumed by the canvas collaborator.
/// Import validates the whole batch up front: a single malformed node rejects
/// the entire document. Accepted nodes receive fresh ids and edges are remapped
/// through the old-id → new-id table; edges pointing outside the batch are dropped.

use crate::error::{EngineError, EngineResult};
use crate::workflow::types::{ActionKind, Edge, Graph, Node, Position, UserInput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Top-level exported document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<DocumentNode>,
    pub edges: Vec<DocumentEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: String,
    pub label: String,
    pub position: Position,
    pub data: DocumentNodeData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentNodeData {
    pub label: String,
    pub is_trigger: bool,
    pub action_type: String,
    pub user_input: UserInput,
    pub executable_code: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub muted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEdge {
    pub source: String,
    pub target: String,
}

/// Nodes and edges accepted from an import, ready to be merged
#[derive(Debug, Clone)]
pub struct ImportBatch {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Edges silently discarded because an endpoint was outside the batch
    pub dropped_edges: usize,
}

/// Serialize a graph into the document shape
pub fn export_graph(graph: &Graph) -> GraphDocument {
    let nodes = graph
        .nodes
        .iter()
        .map(|node| DocumentNode {
            id: node.id.clone(),
            label: node.label.clone(),
            position: node.position,
            data: DocumentNodeData {
                label: node.label.clone(),
                is_trigger: node.is_trigger,
                action_type: node.action_kind.as_str().to_string(),
                user_input: node.user_input.clone(),
                executable_code: node.executable_code.clone(),
                muted: node.muted,
            },
        })
        .collect();

    let edges = graph
        .edges
        .iter()
        .map(|edge| DocumentEdge {
            source: edge.source.clone(),
            target: edge.target.clone(),
        })
        .collect();

    GraphDocument { nodes, edges }
}

/// Parse and validate an import document
pub fn parse_import(raw: &str) -> EngineResult<ImportBatch> {
    let document: Value = serde_json::from_str(raw)?;

    let nodes = document
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::InvalidDocument("document has no 'nodes' array".to_string()))?;

    let edges: &[Value] = match document.get("edges") {
        None | Some(Value::Null) => &[],
        Some(Value::Array(edges)) => edges,
        Some(_) => return Err(EngineError::InvalidDocument("'edges' must be an array".to_string())),
    };

    // Validate everything before building anything
    for (index, node) in nodes.iter().enumerate() {
        if let Err(reason) = validate_node(node) {
            tracing::warn!("❌ Rejecting import: node #{} {}", index + 1, reason);
            return Err(EngineError::InvalidImport { index: index + 1, reason });
        }
    }

    let mut id_map: HashMap<String, String> = HashMap::new();
    let mut imported = Vec::with_capacity(nodes.len());
    for node in nodes {
        let fresh = build_node(node);
        if let Some(old_id) = node.get("id").and_then(Value::as_str) {
            id_map.insert(old_id.to_string(), fresh.id.clone());
        }
        imported.push(fresh);
    }

    let mut remapped = Vec::with_capacity(edges.len());
    let mut dropped_edges = 0;
    for edge in edges {
        let source = edge.get("source").and_then(Value::as_str).and_then(|id| id_map.get(id));
        let target = edge.get("target").and_then(Value::as_str).and_then(|id| id_map.get(id));
        match (source, target) {
            (Some(source), Some(target)) => remapped.push(Edge::new(source.clone(), target.clone())),
            _ => dropped_edges += 1,
        }
    }

    tracing::info!(
        "📥 Parsed import: {} nodes, {} edges ({} dropped)",
        imported.len(),
        remapped.len(),
        dropped_edges
    );

    Ok(ImportBatch { nodes: imported, edges: remapped, dropped_edges })
}

/// Structural check for a single document node
fn validate_node(node: &Value) -> Result<(), String> {
    if !node.get("label").is_some_and(Value::is_string) {
        return Err("is missing a string 'label'".to_string());
    }
    let data = node
        .get("data")
        .filter(|data| data.is_object())
        .ok_or_else(|| "is missing an object 'data'".to_string())?;
    if !data.get("label").is_some_and(Value::is_string) {
        return Err("is missing a string 'data.label'".to_string());
    }
    if !data.get("actionType").is_some_and(Value::is_string) {
        return Err("is missing a string 'data.actionType'".to_string());
    }
    if !data.get("userInput").is_some_and(Value::is_object) {
        return Err("is missing an object 'data.userInput'".to_string());
    }
    Ok(())
}

/// Build a node with a regenerated id from an already validated document node
fn build_node(node: &Value) -> Node {
    let data = &node["data"];
    let action_kind = ActionKind::from(data["actionType"].as_str().unwrap_or_default());
    let is_trigger = data
        .get("isTrigger")
        .and_then(Value::as_bool)
        .unwrap_or_else(|| action_kind.is_trigger());

    let position = node
        .get("position")
        .map(|pos| Position {
            x: pos.get("x").and_then(Value::as_f64).unwrap_or_default(),
            y: pos.get("y").and_then(Value::as_f64).unwrap_or_default(),
        })
        .unwrap_or_default();

    Node {
        id: format!("node-{}", uuid::Uuid::new_v4()),
        label: node["label"].as_str().unwrap_or_default().to_string(),
        position,
        action_kind,
        is_trigger,
        muted: data.get("muted").and_then(Value::as_bool).unwrap_or(false),
        user_input: data["userInput"].as_object().cloned().unwrap_or_default(),
        executable_code: data
            .get("executableCode")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document_node(id: &str, action: &str) -> Value {
        json!({
            "id": id,
            "label": id.to_uppercase(),
            "position": {"x": 10.0, "y": 20.0},
            "data": {
                "label": id.to_uppercase(),
                "isTrigger": action.ends_with("_trigger"),
                "actionType": action,
                "userInput": {"EXPRESSION_CODE": "1 + 1"},
                "executableCode": ""
            }
        })
    }

    #[test]
    fn one_bad_node_rejects_the_whole_batch() {
        let mut broken = document_node("b", "computation");
        broken["data"].as_object_mut().unwrap().remove("actionType");
        let doc = json!({
            "nodes": [document_node("a", "manual_trigger"), broken, document_node("c", "computation")],
            "edges": []
        });

        match parse_import(&doc.to_string()) {
            Err(EngineError::InvalidImport { index, .. }) => assert_eq!(index, 2),
            other => panic!("expected import rejection, got {:?}", other),
        }
    }

    #[test]
    fn ids_are_regenerated_and_edges_remapped() {
        let doc = json!({
            "nodes": [document_node("a", "manual_trigger"), document_node("b", "computation")],
            "edges": [
                {"source": "a", "target": "b"},
                {"source": "a", "target": "elsewhere"}
            ]
        });

        let batch = parse_import(&doc.to_string()).unwrap();
        assert_eq!(batch.nodes.len(), 2);
        assert_eq!(batch.edges.len(), 1);
        assert_eq!(batch.dropped_edges, 1);
        assert_ne!(batch.nodes[0].id, "a");
        assert_eq!(batch.edges[0].source, batch.nodes[0].id);
        assert_eq!(batch.edges[0].target, batch.nodes[1].id);
        assert!(batch.nodes[0].is_trigger);
        assert_eq!(batch.nodes[1].position, Position { x: 10.0, y: 20.0 });
    }

    #[test]
    fn malformed_top_level_json_is_a_validation_error() {
        assert!(matches!(parse_import("{nodes: ["), Err(EngineError::InvalidJson(_))));
        assert!(matches!(parse_import("{\"edges\": []}"), Err(EngineError::InvalidDocument(_))));
    }

    #[test]
    fn export_then_import_preserves_node_content() {
        let graph = Graph::new(
            vec![
                Node::new("t", "Start", ActionKind::ManualTrigger),
                Node::new("n", "Mod", ActionKind::Computation)
                    .with_input("EXPRESSION_CODE", "10 % 3")
                    .muted(true),
            ],
            vec![Edge::new("t", "n")],
        );

        let exported = serde_json::to_string(&export_graph(&graph)).unwrap();
        let batch = parse_import(&exported).unwrap();

        assert_eq!(batch.nodes.len(), 2);
        assert_eq!(batch.edges.len(), 1);
        assert_eq!(batch.nodes[1].label, "Mod");
        assert!(batch.nodes[1].muted);
        assert_eq!(batch.nodes[1].action_kind, ActionKind::Computation);
        assert_eq!(batch.nodes[1].input_str("EXPRESSION_CODE"), Some("10 % 3"));
    }
}
