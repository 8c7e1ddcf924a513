// Signal handling module
//
// Supported signals:
// - SIGINT:  stop accepting and exit (Ctrl+C)
// - SIGTERM: stop accepting and exit

use std::sync::Arc;
use tokio::sync::Notify;

use crate::logger;

/// Start the signal listener (Unix)
///
/// Notifies `shutdown` once on the first SIGINT or SIGTERM. `notify_one`
/// stores a permit, so the accept loop sees the signal even if it was busy.
#[cfg(unix)]
pub fn start_signal_handler(shutdown: Arc<Notify>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    logger::log_error(&format!("Failed to register signal handlers: {e}"));
                    return;
                }
            };

        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        logger::log_signal(name);
        shutdown.notify_one();
    });
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(shutdown: Arc<Notify>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                logger::log_signal("Ctrl+C");
                shutdown.notify_one();
            }
            Err(e) => logger::log_error(&format!("Failed to register Ctrl+C handler: {e}")),
        }
    });
}
