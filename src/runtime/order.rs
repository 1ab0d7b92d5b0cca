/// Deterministic run order for a graph
///
/// Kahn's algorithm over a petgraph `DiGraph`. Zero in-degree nodes are queued
/// in node insertion order and successors are released in edge insertion order,
/// so the same graph always yields the same order. Nodes that never reach zero
/// in-degree (cycle members and everything downstream of a cycle) are left out
/// of the order and reported in `excluded`.

use crate::workflow::types::Graph;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};

/// Linear run order plus the nodes that could not be placed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOrder {
    pub order: Vec<String>,
    pub excluded: Vec<String>,
}

/// Compute the run order of every node in the graph
pub fn run_order(graph: &Graph) -> RunOrder {
    let mut dag: DiGraph<&str, ()> = DiGraph::with_capacity(graph.nodes.len(), graph.edges.len());
    let mut index_of: HashMap<&str, NodeIndex> = HashMap::with_capacity(graph.nodes.len());

    for node in &graph.nodes {
        let index = dag.add_node(node.id.as_str());
        index_of.insert(node.id.as_str(), index);
    }

    for edge in &graph.edges {
        match (index_of.get(edge.source.as_str()), index_of.get(edge.target.as_str())) {
            (Some(&from), Some(&to)) => {
                dag.add_edge(from, to, ());
            }
            _ => tracing::debug!("✂️ Ignoring edge '{}' → '{}' with unknown endpoint", edge.source, edge.target),
        }
    }

    let mut in_degree: Vec<usize> = dag
        .node_indices()
        .map(|index| dag.edges_directed(index, Direction::Incoming).count())
        .collect();

    let mut queue: VecDeque<NodeIndex> = dag
        .node_indices()
        .filter(|index| in_degree[index.index()] == 0)
        .collect();

    let mut visited = vec![false; dag.node_count()];
    let mut order = Vec::with_capacity(dag.node_count());

    while let Some(current) = queue.pop_front() {
        visited[current.index()] = true;
        order.push(dag[current].to_string());

        // petgraph walks adjacency newest-first; restore edge insertion order
        let mut outgoing: Vec<_> = dag.edges_directed(current, Direction::Outgoing).collect();
        outgoing.sort_by_key(|edge| edge.id());

        for edge in outgoing {
            let target = edge.target();
            in_degree[target.index()] -= 1;
            if in_degree[target.index()] == 0 {
                queue.push_back(target);
            }
        }
    }

    let excluded: Vec<String> = dag
        .node_indices()
        .filter(|index| !visited[index.index()])
        .map(|index| dag[index].to_string())
        .collect();

    if !excluded.is_empty() {
        tracing::warn!("🔁 {} node(s) sit on or behind a cycle and are excluded from the run: {:?}", excluded.len(), excluded);
    }
    tracing::debug!("📋 Run order: {:?}", order);

    RunOrder { order, excluded }
}
