//! HTTP response building module
//!
//! Builders for every status the file server answers with.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, ALLOW, SERVER};
use hyper::Response;

/// Build 200 OK response carrying a file
pub fn build_file_response(
    data: Vec<u8>,
    content_type: &str,
    last_modified: Option<&str>,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let content_length = data.len();
    let body = if is_head {
        Bytes::new()
    } else {
        Bytes::from(data)
    };

    let mut builder = Response::builder()
        .status(200)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length);
    if let Some(last_modified) = last_modified {
        builder = builder.header("Last-Modified", last_modified);
    }

    builder
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 301 Moved Permanently response (directory without trailing slash)
pub fn build_301_response(location: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(301)
        .header("Location", location)
        .header("Content-Length", 0)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("301", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 304 Not Modified response
pub fn build_304_response(last_modified: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(304)
        .header("Last-Modified", last_modified)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("304", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 400 Bad Request response
pub fn build_400_response(is_head: bool) -> Response<Full<Bytes>> {
    build_error_response(400, "Bad request path", is_head)
}

/// Build 404 Not Found response
pub fn build_404_response(is_head: bool) -> Response<Full<Bytes>> {
    build_error_response(404, "File not found", is_head)
}

/// Build 501 Not Implemented response for unsupported methods
pub fn build_501_response(method: &str) -> Response<Full<Bytes>> {
    let mut response = build_error_response(
        501,
        &format!("Unsupported method ('{method}')"),
        false,
    );
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
    response
}

/// Plain text error page: `<code> <message>`
fn build_error_response(status: u16, message: &str, is_head: bool) -> Response<Full<Bytes>> {
    let text = format!("{status} {message}\n");
    let content_length = text.len();
    let body = if is_head {
        Bytes::new()
    } else {
        Bytes::from(text)
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Content-Length", content_length)
        .header("Connection", "close")
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error(&status.to_string(), &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Stamp the `Server` header; an unusable name is logged and skipped
pub fn set_server_header(response: &mut Response<Full<Bytes>>, server_name: &str) {
    match HeaderValue::from_str(server_name) {
        Ok(value) => {
            response.headers_mut().insert(SERVER, value);
        }
        Err(e) => crate::logger::log_warning(&format!(
            "Invalid server name '{server_name}': {e}"
        )),
    }
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_text(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_file_response() {
        let resp = build_file_response(
            b"<h1>hi</h1>".to_vec(),
            "text/html; charset=utf-8",
            Some("Sun, 06 Nov 1994 08:49:37 GMT"),
            false,
        );
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-length"], "11");
        assert_eq!(resp.headers()["last-modified"], "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(body_text(resp).await, "<h1>hi</h1>");
    }

    #[tokio::test]
    async fn test_head_keeps_length_drops_body() {
        let resp = build_file_response(vec![0u8; 42], "application/wasm", None, true);
        assert_eq!(resp.headers()["content-length"], "42");
        assert!(resp.headers().get("last-modified").is_none());
        assert_eq!(body_text(resp).await, "");
    }

    #[tokio::test]
    async fn test_404_response() {
        let resp = build_404_response(false);
        assert_eq!(resp.status(), 404);
        assert_eq!(body_text(resp).await, "404 File not found\n");
    }

    #[tokio::test]
    async fn test_501_response() {
        let resp = build_501_response("POST");
        assert_eq!(resp.status(), 501);
        assert_eq!(resp.headers()["allow"], "GET, HEAD");
        assert_eq!(body_text(resp).await, "501 Unsupported method ('POST')\n");
    }

    #[test]
    fn test_redirect_response() {
        let resp = build_301_response("/pkg/?v=1");
        assert_eq!(resp.status(), 301);
        assert_eq!(resp.headers()["location"], "/pkg/?v=1");
    }

    #[test]
    fn test_server_header() {
        let mut resp = build_404_response(true);
        set_server_header(&mut resp, "coi-server/0.1.0");
        assert_eq!(resp.headers()["server"], "coi-server/0.1.0");

        let mut resp = build_404_response(true);
        set_server_header(&mut resp, "bad\nname");
        assert!(resp.headers().get("server").is_none());
    }
}
