//! Log writer module
//!
//! Provides thread-safe log writing to files or stdout/stderr.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use super::Level;

/// Global log writer instance
static LOG_WRITER: OnceLock<LogWriter> = OnceLock::new();

/// Log output target
enum LogTarget {
    Stdout,
    Stderr,
    File(File),
}

/// Thread-safe log writer
pub struct LogWriter {
    level: Level,
    /// Access and info target
    access: Mutex<LogTarget>,
    /// Error and warning target
    error: Mutex<LogTarget>,
}

impl LogWriter {
    /// Create a new log writer with optional file paths
    pub(crate) fn new(
        level: Level,
        access_log_file: Option<&str>,
        error_log_file: Option<&str>,
    ) -> io::Result<Self> {
        let access = match access_log_file {
            Some(path) => LogTarget::File(open_log_file(path)?),
            None => LogTarget::Stdout,
        };

        let error = match error_log_file {
            Some(path) => LogTarget::File(open_log_file(path)?),
            None => LogTarget::Stderr,
        };

        Ok(Self {
            level,
            access: Mutex::new(access),
            error: Mutex::new(error),
        })
    }

    /// Write to access log; access lines are not subject to the level filter
    pub fn write_access(&self, message: &str) {
        write_locked(&self.access, message);
    }

    /// Write a message at `level` to the target that level belongs to
    pub fn write(&self, level: Level, message: &str) {
        if !self.level.enables(level) {
            return;
        }
        match level {
            Level::Error | Level::Warn => write_locked(&self.error, message),
            Level::Info | Level::Debug => write_locked(&self.access, message),
        }
    }
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> io::Result<File> {
    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

fn write_locked(target: &Mutex<LogTarget>, message: &str) {
    // A poisoned lock only means another writer panicked mid-line
    let mut guard = match target.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    match &mut *guard {
        LogTarget::Stdout => println!("{message}"),
        LogTarget::Stderr => eprintln!("{message}"),
        LogTarget::File(f) => {
            let _ = writeln!(f, "{message}");
        }
    }
}

/// Initialize the global log writer
///
/// This should be called once at application startup.
/// Returns error if log files cannot be opened.
pub fn init(
    level: Level,
    access_log_file: Option<&str>,
    error_log_file: Option<&str>,
) -> io::Result<()> {
    let writer = LogWriter::new(level, access_log_file, error_log_file)?;
    LOG_WRITER.set(writer).map_err(|_| {
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "Log writer already initialized",
        )
    })
}

/// Get the global log writer, if initialized
pub fn get() -> Option<&'static LogWriter> {
    LOG_WRITER.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_targets_and_level_filter() {
        let dir = tempfile::tempdir().unwrap();
        let access = dir.path().join("logs/access.log");
        let error = dir.path().join("logs/error.log");
        let writer = LogWriter::new(
            Level::Warn,
            Some(access.to_str().unwrap()),
            Some(error.to_str().unwrap()),
        )
        .unwrap();

        writer.write_access("GET / 200");
        writer.write(Level::Info, "dropped info");
        writer.write(Level::Warn, "kept warning");
        writer.write(Level::Error, "kept error");

        let access_text = std::fs::read_to_string(&access).unwrap();
        let error_text = std::fs::read_to_string(&error).unwrap();
        assert_eq!(access_text, "GET / 200\n");
        assert_eq!(error_text, "kept warning\nkept error\n");
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let access = dir.path().join("access.log");
        std::fs::write(&access, "earlier\n").unwrap();
        let writer = LogWriter::new(Level::Info, Some(access.to_str().unwrap()), None).unwrap();
        writer.write(Level::Info, "later");
        assert_eq!(std::fs::read_to_string(&access).unwrap(), "earlier\nlater\n");
    }
}
