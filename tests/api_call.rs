use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use flowdeck::runtime::executor::ActionDispatcher;
use flowdeck::runtime::script::{LuaSandbox, LuaScriptExecutor};
use flowdeck::runtime::EntryStatus;
use flowdeck::workflow::action::keys;
use flowdeck::{ActionKind, Node};

async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/json", get(|| async { Json(json!({"items": [1, 2, 3]})) }))
        .route("/text", get(|| async { (StatusCode::ACCEPTED, "plain body") }))
        .route(
            "/echo",
            post(|headers: HeaderMap, body: String| async move {
                let content_type = headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let token = headers
                    .get("x-token")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({"body": body, "contentType": content_type, "token": token}))
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn dispatcher() -> ActionDispatcher {
    ActionDispatcher::new(Arc::new(LuaScriptExecutor::default()), LuaSandbox::default()).unwrap()
}

fn api_call(url: String) -> Node {
    Node::new("api", "Call", ActionKind::ApiCall).with_input(keys::URL, url)
}

#[tokio::test]
async fn json_response_becomes_the_payload() {
    let addr = spawn_upstream().await;
    let node = api_call(format!("http://{}/json", addr));

    let outcome = dispatcher().execute(&node).await;
    assert_eq!(outcome.status, EntryStatus::Success);
    assert_eq!(outcome.output, json!({"response": {"items": [1, 2, 3]}}));
}

#[tokio::test]
async fn non_json_response_is_passed_through_raw() {
    let addr = spawn_upstream().await;
    let node = api_call(format!("http://{}/text", addr));

    let outcome = dispatcher().execute(&node).await;
    assert_eq!(outcome.status, EntryStatus::Success);

    let response = &outcome.output["response"];
    assert_eq!(response["status"], json!(202));
    assert_eq!(response["statusText"], json!("Accepted"));
    assert_eq!(response["ok"], json!(true));
    assert_eq!(response["body"], json!("plain body"));
    assert!(response["headers"].is_object());
}

#[tokio::test]
async fn post_sends_headers_and_json_body() {
    let addr = spawn_upstream().await;
    let node = api_call(format!("http://{}/echo", addr))
        .with_input(keys::METHOD, "post")
        .with_input(keys::HEADERS, json!({"X-Token": "secret"}))
        .with_input(keys::BODY, "{\"name\": \"flow\"}");

    let outcome = dispatcher().execute(&node).await;
    assert_eq!(outcome.status, EntryStatus::Success);

    let echoed: &Value = &outcome.output["response"];
    assert_eq!(echoed["body"], json!("{\"name\": \"flow\"}"));
    assert_eq!(echoed["contentType"], json!("application/json"));
    assert_eq!(echoed["token"], json!("secret"));
}

#[tokio::test]
async fn unreachable_host_is_an_error_entry() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let outcome = dispatcher().execute(&api_call(format!("http://{}/gone", addr))).await;
    assert_eq!(outcome.status, EntryStatus::Error);
    assert!(outcome.output["error"].as_str().unwrap().starts_with("HTTP request failed"));
}
