/// Flowdeck: trigger-driven node graph workflow engine
///
/// Main entry point for the Flowdeck server. Initializes configuration and starts
/// the HTTP server with graph editing and run control.

use flowdeck::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Graph editing API at /api/graph, /api/nodes/*, /api/edges/*
/// - Run control at /api/workflow/*
/// - Execution inspection at /api/execution/*
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (defaults to 0.0.0.0:3004 with scripts enabled)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
