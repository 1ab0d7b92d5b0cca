use std::sync::Arc;

use serde_json::json;

use flowdeck::runtime::executor::ActionDispatcher;
use flowdeck::runtime::notify::{MemoryNotifier, NoticeLevel};
use flowdeck::runtime::script::{LuaSandbox, LuaScriptExecutor};
use flowdeck::runtime::{EntryStatus, ExecutionEngine, ExecutionRecorder, ExecutionStatus, RunOutcome};
use flowdeck::workflow::action::keys;
use flowdeck::workflow::store::NodeDraft;
use flowdeck::{ActionKind, EngineError, Graph, GraphStore, Node, TriggerController};

struct Session {
    store: Arc<GraphStore>,
    controller: TriggerController,
    notices: Arc<MemoryNotifier>,
}

fn session() -> Session {
    let dispatcher = ActionDispatcher::new(Arc::new(LuaScriptExecutor::default()), LuaSandbox::default()).unwrap();
    let store = Arc::new(GraphStore::default());
    let notices = Arc::new(MemoryNotifier::new());
    let controller = TriggerController::new(
        Arc::clone(&store),
        Arc::new(ExecutionEngine::new(Arc::new(dispatcher))),
        Arc::new(ExecutionRecorder::new()),
        notices.clone(),
    );
    Session { store, controller, notices }
}

fn draft(label: &str, action_type: &str, input: serde_json::Value) -> NodeDraft {
    serde_json::from_value(json!({
        "label": label,
        "actionType": action_type,
        "userInput": input,
    }))
    .unwrap()
}

#[tokio::test]
async fn manual_trigger_feeds_computation() {
    let s = session();
    let trigger = s.store.add_node(draft("Start", "manual_trigger", json!({})));
    let compute = s.store.add_node(draft("Mod", "computation", json!({ "EXPRESSION_CODE": "10 % 3" })));
    s.store.add_edge(&trigger.id, &compute.id).unwrap();

    let RunOutcome::Completed(execution) = s.controller.run_workflow().await.unwrap() else {
        panic!("manual trigger should run immediately");
    };

    assert_eq!(execution.status, ExecutionStatus::Success);
    assert_eq!(execution.entries.len(), 2);
    assert_eq!(execution.entries[0].output, json!({"trigger": "manual_trigger"}));
    assert_eq!(execution.entries[1].output, json!({"result": 1}));
    assert_eq!(
        s.controller.recorder().selected_entry().map(|e| e.node_id),
        Some(trigger.id.clone())
    );
    assert_eq!(s.notices.latest().map(|n| n.level), Some(NoticeLevel::Success));
}

#[tokio::test]
async fn muted_node_yields_skipped_entry() {
    let s = session();
    let trigger = s.store.add_node(draft("Start", "manual_trigger", json!({})));
    let muted = s.store.add_node(draft("A", "run_code", json!({ "JAVASCRIPT_CODE": "error('never')" })));
    let after = s.store.add_node(draft("B", "computation", json!({ "EXPRESSION_CODE": "1 + 2" })));
    s.store.add_edge(&trigger.id, &muted.id).unwrap();
    s.store.add_edge(&muted.id, &after.id).unwrap();
    s.store.set_muted(&muted.id, true).unwrap();

    let RunOutcome::Completed(execution) = s.controller.run_workflow().await.unwrap() else {
        panic!("manual trigger should run immediately");
    };

    let statuses: Vec<_> = execution.entries.iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![EntryStatus::Success, EntryStatus::Skipped, EntryStatus::Success]);
    assert_eq!(execution.entries[1].output, json!({"skipped": true, "reason": "Node is disabled"}));
    assert_eq!(execution.status, ExecutionStatus::Success);
}

#[tokio::test]
async fn thrown_script_fails_only_its_own_entry() {
    let s = session();
    let trigger = s.store.add_node(draft("Start", "manual_trigger", json!({})));
    let first = s.store.add_node(draft("Ok", "computation", json!({ "EXPRESSION_CODE": "2 ^ 3" })));
    let throws = s.store.add_node(draft("Throws", "run_code", json!({ "JAVASCRIPT_CODE": "error('bad input')" })));
    let last = s.store.add_node(draft("Still runs", "computation", json!({ "EXPRESSION_CODE": "'done'" })));
    s.store.add_edge(&trigger.id, &first.id).unwrap();
    s.store.add_edge(&first.id, &throws.id).unwrap();
    s.store.add_edge(&throws.id, &last.id).unwrap();

    let RunOutcome::Completed(execution) = s.controller.run_workflow().await.unwrap() else {
        panic!("manual trigger should run immediately");
    };

    assert_eq!(execution.status, ExecutionStatus::Error);
    assert_eq!(execution.entries[0].status, EntryStatus::Success);
    assert_eq!(execution.entries[1].status, EntryStatus::Success);
    assert_eq!(execution.entries[2].status, EntryStatus::Error);
    assert_eq!(execution.entries[3].output, json!({"result": "done"}));

    let notice = s.notices.latest().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.contains("bad input"), "unexpected notice: {}", notice.message);
}

#[tokio::test]
async fn graph_without_trigger_is_rejected() {
    let s = session();
    s.store.add_node(draft("Lonely", "computation", json!({ "EXPRESSION_CODE": "1" })));

    let err = s.controller.run_workflow().await.unwrap_err();
    assert!(matches!(err, EngineError::NoTriggerNode));
    assert!(err.is_validation());
    assert!(s.controller.recorder().current().is_none());
}

#[tokio::test]
async fn import_with_a_malformed_node_adds_nothing() {
    let s = session();
    let document = json!({
        "nodes": [
            {"id": "a", "label": "Start", "position": {"x": 0, "y": 0},
             "data": {"label": "Start", "actionType": "manual_trigger", "userInput": {}}},
            {"id": "b", "label": "Broken", "position": {"x": 0, "y": 0},
             "data": {"label": "Broken", "userInput": {}}},
            {"id": "c", "label": "Sum", "position": {"x": 0, "y": 0},
             "data": {"label": "Sum", "actionType": "computation", "userInput": {"EXPRESSION_CODE": "1"}}}
        ],
        "edges": [{"source": "a", "target": "c"}]
    });

    let err = s.store.import_json(&document.to_string()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidImport { index: 2, .. }));
    assert!(s.store.snapshot().nodes.is_empty());
}

#[tokio::test]
async fn exported_graph_imports_with_fresh_ids() {
    let s = session();
    let trigger = s.store.add_node(draft("Start", "manual_trigger", json!({})));
    let compute = s.store.add_node(draft("Mul", "computation", json!({ "EXPRESSION_CODE": "6 * 7" })));
    s.store.add_edge(&trigger.id, &compute.id).unwrap();

    let exported = serde_json::to_string(&s.store.export()).unwrap();
    let target = session();
    let summary = target.store.import_json(&exported).unwrap();
    assert_eq!((summary.nodes_added, summary.edges_added, summary.edges_dropped), (2, 1, 0));

    let graph = target.store.snapshot();
    assert!(graph.nodes.iter().all(|n| n.id != trigger.id && n.id != compute.id));

    let RunOutcome::Completed(execution) = target.controller.run_workflow().await.unwrap() else {
        panic!("manual trigger should run immediately");
    };
    assert_eq!(execution.entries[1].output, json!({"result": 42}));
}

#[tokio::test]
async fn first_trigger_in_insertion_order_decides_the_mode() {
    let s = session();
    s.store.replace(Graph::new(
        vec![
            Node::new("m", "Manual", ActionKind::ManualTrigger),
            Node::new("s", "Schedule", ActionKind::ScheduleTrigger).with_input(keys::TRIGGER_ON, "day"),
        ],
        vec![],
    ));

    assert!(matches!(s.controller.run_workflow().await.unwrap(), RunOutcome::Completed(_)));
    assert!(!s.controller.is_armed());
}
