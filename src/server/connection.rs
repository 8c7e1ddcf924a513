// Connection module
// Serves one accepted TCP connection through the isolated file handler

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::config::AppState;
use crate::handler;
use crate::http::Isolated;
use crate::logger;
use crate::server::isolated_io::{DispatchedRequests, IsolatedIo};

/// Serve a connection on its own task.
///
/// The base file handler is wrapped in [`Isolated`], so every response it
/// produces carries the cross-origin isolation headers. Replies hyper sends
/// without calling the service (400, 431) get them from [`IsolatedIo`].
/// Header names go out title-cased (`Cross-Origin-Opener-Policy`).
pub fn spawn_connection(stream: TcpStream, peer_addr: SocketAddr, state: Arc<AppState>) {
    tokio::spawn(async move {
        let dispatched = DispatchedRequests::default();
        let io = IsolatedIo::new(TokioIo::new(stream), dispatched.clone());

        let service = Isolated::new(service_fn(move |req: Request<Incoming>| {
            dispatched.push(req.method() == Method::HEAD);
            let state = Arc::clone(&state);
            async move { handler::handle_request(req, state, peer_addr).await }
        }));

        let conn = http1::Builder::new()
            .keep_alive(true)
            .title_case_headers(true)
            .serve_connection(io, service);

        if let Err(err) = conn.await {
            logger::log_connection_error(&err);
        }
    });
}
