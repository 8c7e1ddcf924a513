// Configuration module entry point
// Loads configuration and holds the shared runtime state

mod state;
mod types;

use std::net::{IpAddr, SocketAddr};

// Re-export public types
pub use state::AppState;
pub use types::{Config, HttpConfig, LoggingConfig, ServerConfig};

/// Config file looked up in the working directory (any extension `config` understands)
pub const DEFAULT_CONFIG_PATH: &str = "coi-server";

/// Prefix for environment overrides, e.g. `COI_SERVER_SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "COI_SERVER";

impl Config {
    /// Load configuration from `coi-server.{toml,json,yaml,...}` if present
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from specified file path (without extension)
    ///
    /// The file is optional; every key has a default so that running with
    /// no file at all serves `.` on `0.0.0.0:5555`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let settings = config::Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("server.reuse_address", defaults.server.reuse_address)?
            .set_default("server.root", defaults.server.root)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.access_log", defaults.logging.access_log)?
            .set_default("logging.access_log_format", defaults.logging.access_log_format)?
            .set_default("http.server_name", defaults.http.server_name)?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        let ip: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|e| format!("Invalid address '{}': {e}", self.server.host))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }
}
