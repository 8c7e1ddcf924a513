//! Request dispatch module
//!
//! Entry point for HTTP request processing: method validation, file
//! serving, `Server` header and access logging.

use crate::config::AppState;
use crate::handler::static_files;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, REFERER, USER_AGENT};
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    /// Path as sent, still percent-encoded
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub is_head: bool,
    pub if_modified_since: Option<String>,
    pub has_if_none_match: bool,
}

impl<'a> RequestContext<'a> {
    pub fn from_request<B>(req: &'a Request<B>) -> Self {
        let headers = req.headers();
        Self {
            path: req.uri().path(),
            query: req.uri().query(),
            is_head: req.method() == Method::HEAD,
            if_modified_since: headers
                .get(IF_MODIFIED_SINCE)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string),
            has_if_none_match: headers.contains_key(IF_NONE_MATCH),
        }
    }
}

/// Main entry point for HTTP request handling
///
/// Generic over the request body: only the request head is read.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();

    let mut response = match check_http_method(req.method()) {
        Some(resp) => resp,
        None => {
            let ctx = RequestContext::from_request(&req);
            static_files::serve_path(&ctx, &state.root, &state.config.http.index_files).await
        }
    };

    http::response::set_server_header(&mut response, &state.config.http.server_name);

    if state.config.logging.access_log {
        let entry = access_entry(&req, &response, peer_addr, started);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Only GET and HEAD are served; everything else is 501
fn check_http_method(method: &Method) -> Option<Response<Full<Bytes>>> {
    match *method {
        Method::GET | Method::HEAD => None,
        _ => {
            logger::log_debug(&format!("Unsupported method: {method}"));
            Some(http::build_501_response(method.as_str()))
        }
    }
}

fn access_entry<B>(
    req: &Request<B>,
    response: &Response<Full<Bytes>>,
    peer_addr: SocketAddr,
    started: Instant,
) -> AccessLogEntry {
    let target = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path().to_string(), ToString::to_string);
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        target,
    );
    entry.http_version = version_label(req.version()).to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .body()
        .size_hint()
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0);
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}

const fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn state_for(root: &std::path::Path) -> Arc<AppState> {
        let mut cfg = Config::default();
        cfg.server.root = root.to_string_lossy().into_owned();
        cfg.logging.access_log = false;
        Arc::new(AppState::new(cfg).unwrap())
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_get_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "hello").unwrap();
        let state = state_for(dir.path());

        let req = Request::get("/index.html").body(()).unwrap();
        let resp = handle_request(req, state, peer()).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.headers()["server"].to_str().unwrap().starts_with("coi-server/"));
    }

    #[tokio::test]
    async fn test_unsupported_methods() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(dir.path());

        for method in [Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS] {
            let req = Request::builder()
                .method(method)
                .uri("/index.html")
                .body(())
                .unwrap();
            let resp = handle_request(req, Arc::clone(&state), peer()).await.unwrap();
            assert_eq!(resp.status(), 501);
        }
    }

    #[tokio::test]
    async fn test_query_string_is_ignored_for_lookup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("style.css"), "body{}").unwrap();
        let state = state_for(dir.path());

        let req = Request::get("/style.css?v=123").body(()).unwrap();
        let resp = handle_request(req, state, peer()).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], "text/css; charset=utf-8");
    }

    #[test]
    fn test_context_from_request() {
        let req = Request::head("/pkg/a%20b.js?x=1")
            .header("If-Modified-Since", "Sun, 06 Nov 1994 08:49:37 GMT")
            .header("If-None-Match", "\"abc\"")
            .body(())
            .unwrap();
        let ctx = RequestContext::from_request(&req);
        assert_eq!(ctx.path, "/pkg/a%20b.js");
        assert_eq!(ctx.query, Some("x=1"));
        assert!(ctx.is_head);
        assert!(ctx.has_if_none_match);
        assert_eq!(
            ctx.if_modified_since.as_deref(),
            Some("Sun, 06 Nov 1994 08:49:37 GMT")
        );
    }

    #[test]
    fn test_access_entry_fields() {
        let req = Request::get("/index.html?v=1")
            .header("User-Agent", "curl/8.0")
            .body(())
            .unwrap();
        let resp = http::build_404_response(false);
        let entry = access_entry(&req, &resp, peer(), Instant::now());
        assert_eq!(entry.remote_addr, "127.0.0.1");
        assert_eq!(entry.target, "/index.html?v=1");
        assert_eq!(entry.status, 404);
        assert_eq!(entry.body_bytes, "404 File not found\n".len());
        assert_eq!(entry.user_agent.as_deref(), Some("curl/8.0"));
        assert!(entry.referer.is_none());
    }
}
