/// Server setup and initialization
///
/// Wires together all components: graph store, script executor, action
/// dispatcher, execution engine, trigger controller and HTTP routes.

use crate::{
    api::{create_api_routes, AppState},
    config::Config,
    runtime::{
        engine::ExecutionEngine,
        executor::ActionDispatcher,
        notify::{MemoryNotifier, Notifier},
        recorder::ExecutionRecorder,
        scheduler::TriggerController,
        script::{DisabledScriptExecutor, LuaSandbox, LuaScriptExecutor, ScriptExecutor},
    },
    workflow::store::GraphStore,
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Create the main Axum application with all routes
///
/// Builds one workflow session (graph store, recorder, controller) and exposes
/// it over HTTP.
pub fn create_app(config: Config) -> Result<Router> {
    let sandbox = LuaSandbox::new(config.engine.script_memory_bytes());

    let scripts: Arc<dyn ScriptExecutor> = if config.engine.allow_scripts {
        tracing::info!("🧠 Script execution enabled ({} MB per script)", config.engine.script_memory_mb);
        Arc::new(LuaScriptExecutor::new(sandbox))
    } else {
        tracing::warn!("🚫 Script execution disabled, RunCode nodes will fail");
        Arc::new(DisabledScriptExecutor)
    };

    tracing::info!("⚙️ Initializing action dispatcher");
    let dispatcher = ActionDispatcher::new(scripts, sandbox)
        .map_err(|e| anyhow::anyhow!("Failed to initialize action dispatcher: {}", e))?;

    tracing::info!("🚀 Initializing execution engine");
    let engine = Arc::new(ExecutionEngine::new(Arc::new(dispatcher)));

    let store = Arc::new(GraphStore::default());
    let notices = Arc::new(MemoryNotifier::new());
    let notifier: Arc<dyn Notifier> = notices.clone();

    tracing::info!("⏰ Initializing trigger controller");
    let controller = Arc::new(TriggerController::new(
        Arc::clone(&store),
        engine,
        Arc::new(ExecutionRecorder::new()),
        notifier,
    ));

    let state = AppState { store, controller, notices };

    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        .merge(create_api_routes(state));

    tracing::info!("✅ Application initialized successfully");
    Ok(app)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Flowdeck server...");

    let app = create_app(config.clone())?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}
