use std::net::SocketAddr;

use serde_json::{json, Value};
use tokio::net::TcpListener;

use flowdeck::config::{Config, EngineConfig, ServerConfig};
use flowdeck::create_app;

async fn serve() -> String {
    let config = Config {
        server: ServerConfig { host: "127.0.0.1".to_string(), port: 0 },
        engine: EngineConfig { allow_scripts: true, script_memory_mb: 16 },
    };
    let app = create_app(config).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn add_node(client: &reqwest::Client, base: &str, body: Value) -> Value {
    let response = client.post(format!("{}/api/nodes", base)).json(&body).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

#[tokio::test]
async fn health_check_responds_ok() {
    let base = serve().await;
    let body = reqwest::get(format!("{}/healthz", base)).await.unwrap().text().await.unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn build_run_and_inspect_a_workflow() {
    let base = serve().await;
    let client = reqwest::Client::new();

    let trigger = add_node(&client, &base, json!({"label": "Start", "actionType": "manual_trigger"})).await;
    assert_eq!(trigger["isTrigger"], json!(true));
    let script = add_node(
        &client,
        &base,
        json!({
            "label": "Script",
            "actionType": "run_code",
            "userInput": {"JAVASCRIPT_CODE": "print('working')\nreturn {answer = 42}"}
        }),
    )
    .await;

    let edge = client
        .post(format!("{}/api/edges", base))
        .json(&json!({"source": trigger["id"], "target": script["id"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(edge.status().as_u16(), 201);

    let run: Value = client
        .post(format!("{}/api/workflow/run", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(run["status"], json!("completed"));
    assert_eq!(run["execution"]["status"], json!("success"));

    let entries = run["execution"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1]["output"]["returnedValue"], json!({"answer": 42}));
    assert_eq!(entries[1]["output"]["consoleOutput"], json!([{"level": "log", "message": "working"}]));

    let selected: Value = reqwest::get(format!("{}/api/execution/selected", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(selected["nodeId"], trigger["id"]);

    let reselected: Value = client
        .put(format!("{}/api/execution/selected", base))
        .json(&json!({"entryId": entries[1]["id"]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reselected["nodeId"], script["id"]);

    let notice: Value = reqwest::get(format!("{}/api/notices/latest", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(notice["level"], json!("success"));

    let cleared = client.delete(format!("{}/api/execution", base)).send().await.unwrap();
    assert_eq!(cleared.status().as_u16(), 204);
    let missing = reqwest::get(format!("{}/api/execution", base)).await.unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn validation_errors_map_to_status_codes() {
    let base = serve().await;
    let client = reqwest::Client::new();

    let no_trigger = client.post(format!("{}/api/workflow/run", base)).send().await.unwrap();
    assert_eq!(no_trigger.status().as_u16(), 400);
    let body: Value = no_trigger.json().await.unwrap();
    assert_eq!(body["error"], json!("No trigger node found in workflow"));

    let unknown = client.delete(format!("{}/api/nodes/does-not-exist", base)).send().await.unwrap();
    assert_eq!(unknown.status().as_u16(), 404);

    let bad_import = client
        .post(format!("{}/api/graph/import", base))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(bad_import.status().as_u16(), 400);

    let dangling = client
        .post(format!("{}/api/edges", base))
        .json(&json!({"source": "a", "target": "b"}))
        .send()
        .await
        .unwrap();
    assert_eq!(dangling.status().as_u16(), 400);
}

#[tokio::test]
async fn schedule_trigger_arms_and_aborts() {
    let base = serve().await;
    let client = reqwest::Client::new();

    // Two hours ahead, so nothing fires during the test
    let at = (chrono::Local::now() + chrono::Duration::hours(2)).format("%H:%M").to_string();
    add_node(
        &client,
        &base,
        json!({
            "label": "Daily",
            "actionType": "schedule_trigger",
            "userInput": {"TRIGGER_ON": "day", "INTERVAL_BETWEEN_TRIGGER": "1", "TIME_TO_TRIGGER": at}
        }),
    )
    .await;

    let run: Value = client
        .post(format!("{}/api/workflow/run", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(run["status"], json!("scheduled"));
    assert_eq!(run["intervalMs"], json!(86_400_000u64));
    assert!(run["firstDelayMs"].as_u64().unwrap() > 3_600_000);

    let status: Value = reqwest::get(format!("{}/api/workflow/status", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["armed"], json!(true));

    let aborted: Value = client
        .post(format!("{}/api/workflow/abort", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(aborted["state"], json!("idle"));
}

#[tokio::test]
async fn patching_and_executing_a_single_node() {
    let base = serve().await;
    let client = reqwest::Client::new();

    let node = add_node(
        &client,
        &base,
        json!({"label": "Math", "actionType": "computation", "userInput": {"EXPRESSION_CODE": "1 + 1"}}),
    )
    .await;
    let id = node["id"].as_str().unwrap();

    let patched: Value = client
        .patch(format!("{}/api/nodes/{}", base, id))
        .json(&json!({"label": "Bigger math", "userInput": {"EXPRESSION_CODE": "20 + 22"}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(patched["label"], json!("Bigger math"));

    let execution: Value = client
        .post(format!("{}/api/nodes/{}/execute", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(execution["triggerDescription"], json!("Single node: Bigger math"));
    assert_eq!(execution["entries"][0]["output"], json!({"result": 42}));

    let graph: Value = reqwest::get(format!("{}/api/graph", base)).await.unwrap().json().await.unwrap();
    assert_eq!(graph["nodes"][0]["data"]["label"], json!("Bigger math"));
}
