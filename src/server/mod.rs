// Server module entry point
// Binds the listener and runs the accept loop

pub mod connection;
pub mod isolated_io;
pub mod listener;
pub mod signal;

// Rust 不允许 loop 作为模块名（关键字），改用 server_loop
#[path = "loop.rs"]
pub mod server_loop;

use std::sync::Arc;
use tokio::sync::Notify;

use crate::config::AppState;
use crate::logger;

// Re-export commonly used items
pub use listener::{create_listener, ListenerOptions};
pub use server_loop::run_accept_loop;

/// Bind the configured address and serve until SIGINT/SIGTERM
pub async fn run(state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let addr = state.config.get_socket_addr()?;
    let listener = create_listener(addr, ListenerOptions::from(&state.config))
        .map_err(|e| format!("Failed to bind {addr}: {e}"))?;

    logger::log_server_start(&listener.local_addr()?, &state.root, &state.config);

    let shutdown = Arc::new(Notify::new());
    signal::start_signal_handler(Arc::clone(&shutdown));

    run_accept_loop(listener, state, shutdown).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    const COOP: &str = "Cross-Origin-Opener-Policy: same-origin\r\n";
    const COEP: &str = "Cross-Origin-Embedder-Policy: require-corp\r\n";

    struct TestServer {
        addr: SocketAddr,
        shutdown: Arc<Notify>,
        task: tokio::task::JoinHandle<()>,
        _root: tempfile::TempDir,
    }

    impl TestServer {
        async fn start() -> Self {
            let root = tempfile::tempdir().unwrap();
            std::fs::write(root.path().join("index.html"), "<!doctype html><p>isolated</p>")
                .unwrap();
            std::fs::create_dir(root.path().join("pkg")).unwrap();
            std::fs::write(root.path().join("pkg/index.html"), "pkg").unwrap();
            std::fs::write(root.path().join("echo.txt"), "HTTP/1.1 400 Bad Request\r\n\r\n")
                .unwrap();

            let mut cfg = Config::default();
            cfg.server.root = root.path().to_string_lossy().into_owned();
            cfg.logging.access_log = false;
            let state = Arc::new(AppState::new(cfg).unwrap());

            let listener =
                create_listener("127.0.0.1:0".parse().unwrap(), ListenerOptions::default())
                    .unwrap();
            let addr = listener.local_addr().unwrap();
            let shutdown = Arc::new(Notify::new());
            let task = tokio::spawn(run_accept_loop(listener, state, Arc::clone(&shutdown)));

            Self {
                addr,
                shutdown,
                task,
                _root: root,
            }
        }

        /// Send one HTTP/1.0 request and read until the server closes
        async fn request(&self, raw: &str) -> String {
            let mut stream = TcpStream::connect(self.addr).await.unwrap();
            stream.write_all(raw.as_bytes()).await.unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }

        async fn get(&self, path: &str) -> String {
            self.request(&format!("GET {path} HTTP/1.0\r\nHost: localhost\r\n\r\n"))
                .await
        }

        async fn stop(self) {
            self.shutdown.notify_one();
            self.task.await.unwrap();
        }
    }

    fn status_line(response: &str) -> &str {
        response.lines().next().unwrap_or_default()
    }

    fn assert_isolated(response: &str) {
        let (head, _) = response.split_once("\r\n\r\n").unwrap();
        let head = format!("{head}\r\n");
        assert!(head.contains(COOP), "missing COOP in:\n{head}");
        assert!(head.contains(COEP), "missing COEP in:\n{head}");
        assert!(head.find(COOP) < head.find(COEP), "COOP must precede COEP");
    }

    #[tokio::test]
    async fn test_index_is_served_with_isolation_headers() {
        let server = TestServer::start().await;
        let resp = server.get("/index.html").await;
        assert!(status_line(&resp).contains(" 200 "), "{resp}");
        assert_isolated(&resp);
        assert!(resp.ends_with("\r\n\r\n<!doctype html><p>isolated</p>"));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_missing_file_still_isolated() {
        let server = TestServer::start().await;
        let resp = server.get("/does-not-exist").await;
        assert!(status_line(&resp).contains(" 404 "), "{resp}");
        assert_isolated(&resp);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_every_status_is_isolated() {
        let server = TestServer::start().await;

        let redirect = server.get("/pkg").await;
        assert!(status_line(&redirect).contains(" 301 "), "{redirect}");
        assert!(redirect.contains("Location: /pkg/\r\n"));
        assert_isolated(&redirect);

        let head = server
            .request("HEAD /index.html HTTP/1.0\r\nHost: localhost\r\n\r\n")
            .await;
        assert!(status_line(&head).contains(" 200 "), "{head}");
        assert!(head.ends_with("\r\n\r\n"));
        assert_isolated(&head);

        let post = server
            .request("POST / HTTP/1.0\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n")
            .await;
        assert!(status_line(&post).contains(" 501 "), "{post}");
        assert_isolated(&post);

        let traversal = server.get("/../../etc/passwd").await;
        assert!(status_line(&traversal).contains(" 404 "), "{traversal}");
        assert_isolated(&traversal);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_malformed_requests_are_isolated() {
        let server = TestServer::start().await;

        let garbage = server.request("GARBAGE\r\n\r\n").await;
        assert!(status_line(&garbage).contains(" 400 "), "{garbage}");
        assert_isolated(&garbage);

        let bad_header = server
            .request("GET / HTTP/1.1\r\nHost: localhost\r\nBad Header\r\n\r\n")
            .await;
        assert!(status_line(&bad_header).contains(" 400 "), "{bad_header}");
        assert_isolated(&bad_header);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_error_after_head_response_is_isolated() {
        let server = TestServer::start().await;
        let resp = server
            .request("HEAD /index.html HTTP/1.1\r\nHost: localhost\r\n\r\nGARBAGE\r\n\r\n")
            .await;

        let (first, second) = resp.split_once("\r\n\r\n").unwrap();
        assert!(status_line(first).contains(" 200 "), "{resp}");
        assert_isolated(&resp);
        assert!(status_line(second).contains(" 400 "), "{resp}");
        assert_isolated(second);
        assert_eq!(resp.matches(COOP).count(), 2, "{resp}");
        server.stop().await;
    }

    #[tokio::test]
    async fn test_body_bytes_are_not_rewritten() {
        let server = TestServer::start().await;
        let resp = server.get("/echo.txt").await;
        assert!(status_line(&resp).contains(" 200 "), "{resp}");
        assert_isolated(&resp);
        assert!(resp.ends_with("\r\n\r\nHTTP/1.1 400 Bad Request\r\n\r\n"), "{resp}");
        assert_eq!(resp.matches(COOP).count(), 1);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_conditional_get_is_isolated() {
        let server = TestServer::start().await;
        let first = server.get("/index.html").await;
        let last_modified = first
            .lines()
            .find_map(|l| l.strip_prefix("Last-Modified: "))
            .unwrap()
            .to_string();

        let resp = server
            .request(&format!(
                "GET /index.html HTTP/1.0\r\nHost: localhost\r\nIf-Modified-Since: {last_modified}\r\n\r\n"
            ))
            .await;
        assert!(status_line(&resp).contains(" 304 "), "{resp}");
        assert_isolated(&resp);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_restart_on_same_port() {
        let first = TestServer::start().await;
        let addr = first.addr;
        assert!(first.get("/").await.contains("isolated"));
        first.stop().await;

        let listener = create_listener(addr, ListenerOptions::default()).unwrap();
        assert_eq!(listener.local_addr().unwrap(), addr);
    }
}
