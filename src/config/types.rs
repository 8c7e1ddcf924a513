// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub http: HttpConfig,
}

/// Listener and serving root configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Tokio worker threads, CPU count when unset
    #[serde(default)]
    pub workers: Option<usize>,
    /// Set `SO_REUSEADDR` on the listening socket
    #[serde(default = "default_reuse_address")]
    pub reuse_address: bool,
    /// Directory served as the document root
    #[serde(default = "default_root")]
    pub root: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Minimum level written: error, warn, info or debug
    pub level: String,
    pub access_log: bool,
    /// Access log format (common, combined, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub server_name: String,
    /// Files tried, in order, when a directory is requested
    #[serde(default = "default_index_files")]
    pub index_files: Vec<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_reuse_address() -> bool {
    true
}

fn default_root() -> String {
    ".".to_string()
}

fn default_access_log_format() -> String {
    "common".to_string()
}

fn default_index_files() -> Vec<String> {
    vec!["index.html".to_string(), "index.htm".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5555,
                workers: None,
                reuse_address: default_reuse_address(),
                root: default_root(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                access_log: true,
                access_log_format: default_access_log_format(),
                access_log_file: None,
                error_log_file: None,
            },
            http: HttpConfig {
                server_name: format!("coi-server/{}", env!("CARGO_PKG_VERSION")),
                index_files: default_index_files(),
            },
        }
    }
}
