/// Action dispatcher
///
/// Executes one node according to its resolved `Action`:
/// - Triggers: pass-through markers, no side effect
/// - RunCode: user script through the configured `ScriptExecutor`
/// - ApiCall: outgoing HTTP request with reqwest
/// - Computation: sandboxed Lua expression
/// - Unknown kinds: no-op success
///
/// Every failure is caught here and returned as `{error: message}` with an
/// error status; nothing propagates to the caller.

use crate::runtime::recorder::EntryStatus;
use crate::runtime::script::{ConsoleBuffer, LogSink, LuaSandbox, ScriptExecutor};
use crate::workflow::action::{Action, ApiCallConfig, ComputationConfig, RunCodeConfig};
use crate::workflow::types::Node;
use anyhow::Result;
use reqwest::{header::CONTENT_TYPE, Method};
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};

/// Structured result of dispatching one node
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub output: Value,
    pub status: EntryStatus,
}

impl ActionOutcome {
    fn success(output: Value) -> Self {
        Self { output, status: EntryStatus::Success }
    }

    fn failure(message: String) -> Self {
        Self { output: json!({ "error": message }), status: EntryStatus::Error }
    }
}

/// Dispatches nodes to their action handlers
#[derive(Debug)]
pub struct ActionDispatcher {
    /// RunCode capability (sandboxed Lua or disabled)
    scripts: Arc<dyn ScriptExecutor>,
    /// Expression evaluator for Computation nodes
    sandbox: LuaSandbox,
    /// Shared HTTP client for ApiCall nodes
    http: reqwest::Client,
}

impl ActionDispatcher {
    /// Create a dispatcher with the given script capability
    pub fn new(scripts: Arc<dyn ScriptExecutor>, sandbox: LuaSandbox) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("flowdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self { scripts, sandbox, http })
    }

    /// Execute a single node and convert any failure into an error outcome
    pub async fn execute(&self, node: &Node) -> ActionOutcome {
        tracing::info!("🚀 Dispatching node: {} (kind: {})", node.id, node.action_kind);
        let start_time = std::time::Instant::now();

        let result = match Action::from_node(node) {
            Ok(action) => self.perform(node, action).await,
            Err(e) => Err(e),
        };
        let duration = start_time.elapsed();

        match result {
            Ok(output) => {
                tracing::info!("✅ Node completed: {} in {:?}", node.id, duration);
                tracing::debug!("📤 Output: {}", output);
                ActionOutcome::success(output)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                tracing::error!("❌ Node failed: {} in {:?} - Error: {}", node.id, duration, message);
                ActionOutcome::failure(message)
            }
        }
    }

    async fn perform(&self, node: &Node, action: Action) -> Result<Value> {
        match action {
            Action::Trigger(kind) => Ok(json!({ "trigger": kind.as_str() })),
            Action::RunCode(config) => self.run_code(node, config).await,
            Action::ApiCall(config) => self.api_call(node, config).await,
            Action::Computation(config) => self.compute(node, config).await,
            Action::NoOp => {
                tracing::debug!("⏭️ Node '{}' has no executable action", node.id);
                Ok(json!({ "result": "No executable action" }))
            }
        }
    }

    /// Run a user script on the blocking pool, capturing its log lines
    async fn run_code(&self, node: &Node, config: RunCodeConfig) -> Result<Value> {
        tracing::debug!("🧠 Executing script for node: {}", node.id);

        let buffer = Arc::new(ConsoleBuffer::default());
        let sink: Arc<dyn LogSink> = buffer.clone();
        let scripts = Arc::clone(&self.scripts);
        let code = config.code;

        let returned = tokio::task::spawn_blocking(move || scripts.execute(&code, sink))
            .await
            .map_err(|e| anyhow::anyhow!("Script task aborted: {}", e))??;

        let mut output = json!({ "returnedValue": returned });
        let lines = buffer.take();
        if !lines.is_empty() {
            output["consoleOutput"] = serde_json::to_value(lines)?;
        }
        Ok(output)
    }

    /// Evaluate an expression on the blocking pool, like scripts
    async fn compute(&self, node: &Node, config: ComputationConfig) -> Result<Value> {
        tracing::debug!("🧮 Evaluating expression for node {}: {}", node.id, config.expression);

        let sandbox = self.sandbox;
        let expression = config.expression;
        let result = tokio::task::spawn_blocking(move || sandbox.evaluate(&expression))
            .await
            .map_err(|e| anyhow::anyhow!("Script task aborted: {}", e))??;
        Ok(json!({ "result": result }))
    }

    async fn api_call(&self, node: &Node, config: ApiCallConfig) -> Result<Value> {
        tracing::debug!("🌍 HTTP request for node {}: {} {}", node.id, config.method, config.url);

        let response = build_request(&self.http, &config)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("HTTP request failed: {}", e))?;

        let status = response.status();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        tracing::debug!("📡 Response status: {}", status);

        let text = response
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read response body: {}", e))?;

        // JSON bodies become the payload; anything else is passed through as the raw response
        let payload = match serde_json::from_str::<Value>(&text) {
            Ok(decoded) => decoded,
            Err(_) => json!({
                "status": status.as_u16(),
                "statusText": status.canonical_reason().unwrap_or_default(),
                "ok": status.is_success(),
                "headers": headers,
                "body": text,
            }),
        };

        tracing::info!("✅ HTTP request completed: {} {} (status: {})", config.method, config.url, status);
        Ok(json!({ "response": payload }))
    }
}

/// Build the outgoing request for an ApiCall node
///
/// GET requests never carry a body, whatever the node's BODY field holds.
pub fn build_request(client: &reqwest::Client, config: &ApiCallConfig) -> reqwest::RequestBuilder {
    let mut request = client.request(config.method.clone(), config.url.as_str());

    for (name, value) in &config.headers {
        request = request.header(name.as_str(), value.as_str());
    }

    if config.method != Method::GET {
        if let Some(body) = &config.body {
            let declares_type = config
                .headers
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));
            if !declares_type && serde_json::from_str::<Value>(body).is_ok() {
                request = request.header(CONTENT_TYPE, "application/json");
            }
            request = request.body(body.clone());
        }
    }

    request
}
