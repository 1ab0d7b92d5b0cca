/// Configuration management for the Flowdeck engine
///
/// Handles server binding and script execution limits.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Execution engine configuration
    pub engine: EngineConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Execution engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether RunCode nodes may execute user scripts
    pub allow_scripts: bool,
    /// Memory ceiling of each script state, in megabytes
    pub script_memory_mb: usize,
}

impl EngineConfig {
    pub fn script_memory_bytes(&self) -> usize {
        self.script_memory_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("FLOWDECK_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("FLOWDECK_PORT")
                    .unwrap_or_else(|_| "3004".to_string())
                    .parse()
                    .unwrap_or(3004),
            },
            engine: EngineConfig {
                allow_scripts: std::env::var("FLOWDECK_ALLOW_SCRIPTS")
                    .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
                    .unwrap_or(true),
                script_memory_mb: std::env::var("FLOWDECK_SCRIPT_MEMORY_MB")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|mb| *mb > 0)
                    .unwrap_or(64),
            },
        }
    }
}
