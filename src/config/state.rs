// Application state module
// Read-only state shared by every connection task

use std::io;
use std::path::PathBuf;

use super::types::Config;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Canonical serving root; request paths must resolve below it
    pub root: PathBuf,
}

impl AppState {
    /// Create `AppState`, resolving the configured root once at startup
    pub fn new(config: Config) -> io::Result<Self> {
        let root = std::fs::canonicalize(&config.server.root).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Serving root '{}' is not accessible: {e}", config.server.root),
            )
        })?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Serving root '{}' is not a directory", root.display()),
            ));
        }
        Ok(Self { config, root })
    }
}
