/// Run assembly
///
/// Turns a graph snapshot into an `Execution`: computes the run order, walks it
/// strictly sequentially, skips muted nodes without dispatching them, and keeps
/// going after failed nodes. The aggregate status is derived from the entries.

use crate::error::{EngineError, EngineResult};
use crate::runtime::executor::ActionDispatcher;
use crate::runtime::order::run_order;
use crate::runtime::recorder::{Execution, ExecutionEntry};
use crate::workflow::types::{Graph, Node};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

/// Sequential graph executor
#[derive(Debug)]
pub struct ExecutionEngine {
    dispatcher: Arc<ActionDispatcher>,
}

impl ExecutionEngine {
    pub fn new(dispatcher: Arc<ActionDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Execute every orderable node of the graph, one after another
    ///
    /// Independent branches are not run in parallel: a later node may rely on
    /// side effects of an earlier one without an explicit edge.
    pub async fn run_graph(&self, graph: &Graph, trigger_description: impl Into<String>) -> Execution {
        let trigger_description = trigger_description.into();
        let started_at = Utc::now();
        let clock = Instant::now();

        tracing::info!(
            "🚀 Starting workflow run ({}) over {} nodes and {} edges",
            trigger_description,
            graph.nodes.len(),
            graph.edges.len()
        );

        let plan = run_order(graph);
        let mut entries = Vec::with_capacity(plan.order.len());

        for (step, node_id) in plan.order.iter().enumerate() {
            tracing::debug!("📍 Step {}/{}: node '{}'", step + 1, plan.order.len(), node_id);
            let entry = match graph.node(node_id) {
                Some(node) => self.run_node(node).await,
                None => {
                    tracing::error!("❌ Ordered node '{}' is missing from the graph", node_id);
                    ExecutionEntry::missing(node_id)
                }
            };
            entries.push(entry);
        }

        let execution = Execution::new(started_at, elapsed_ms(clock), trigger_description, entries);
        tracing::info!(
            "🏁 Workflow run {} finished with status {:?} in {} ms",
            execution.id,
            execution.status,
            execution.duration_ms
        );
        execution
    }

    /// Execute one node on its own, wrapped in a one-entry execution
    pub async fn run_single(&self, graph: &Graph, node_id: &str) -> EngineResult<Execution> {
        let node = graph
            .node(node_id)
            .ok_or_else(|| EngineError::NodeNotFound(node_id.to_string()))?;

        let started_at = Utc::now();
        let clock = Instant::now();
        let entry = self.run_node(node).await;

        Ok(Execution::new(
            started_at,
            elapsed_ms(clock),
            format!("Single node: {}", node.label),
            vec![entry],
        ))
    }

    async fn run_node(&self, node: &Node) -> ExecutionEntry {
        if node.muted {
            tracing::info!("🔇 Skipping muted node '{}'", node.id);
            return ExecutionEntry::skipped(node);
        }

        let clock = Instant::now();
        let outcome = self.dispatcher.execute(node).await;
        ExecutionEntry::new(node, outcome.output, elapsed_ms(clock), outcome.status)
    }
}

fn elapsed_ms(clock: Instant) -> u64 {
    u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX)
}
