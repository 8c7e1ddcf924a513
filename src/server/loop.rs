// Server loop module
// Accepts connections until shutdown is notified

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::spawn_connection;
use crate::config::AppState;
use crate::logger;

/// Accept connections forever, handing each to its own task.
///
/// Accept errors (e.g. the process ran out of file descriptors) are logged
/// and the loop keeps going. Returns once `shutdown` is notified; the
/// listener is dropped on return.
#[allow(clippy::ignored_unit_patterns)]
pub async fn run_accept_loop(listener: TcpListener, state: Arc<AppState>, shutdown: Arc<Notify>) {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        logger::log_connection_accepted(&peer_addr);
                        spawn_connection(stream, peer_addr, Arc::clone(&state));
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            _ = shutdown.notified() => {
                logger::log_server_stop();
                break;
            }
        }
    }
}
