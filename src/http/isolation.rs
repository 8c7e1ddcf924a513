//! Cross-origin isolation headers
//!
//! Browsers only expose `SharedArrayBuffer` (and with it threaded
//! WebAssembly) to documents that are cross-origin isolated. A document is
//! isolated when it is served with both of:
//!
//! ```text
//! Cross-Origin-Opener-Policy: same-origin
//! Cross-Origin-Embedder-Policy: require-corp
//! ```
//!
//! [`Isolated`] wraps any hyper [`Service`] and appends the pair to every
//! response the wrapped service produces, error pages and redirects
//! included.

use std::future::Future;
use std::pin::Pin;

use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::service::Service;
use hyper::{Request, Response};

pub const CROSS_ORIGIN_OPENER_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-opener-policy");
pub const CROSS_ORIGIN_EMBEDDER_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-embedder-policy");

pub const SAME_ORIGIN: HeaderValue = HeaderValue::from_static("same-origin");
pub const REQUIRE_CORP: HeaderValue = HeaderValue::from_static("require-corp");

/// Append the opener policy, then the embedder policy
///
/// Existing values are kept; the pair is added after them.
pub fn apply(headers: &mut HeaderMap) {
    headers.append(CROSS_ORIGIN_OPENER_POLICY, SAME_ORIGIN);
    headers.append(CROSS_ORIGIN_EMBEDDER_POLICY, REQUIRE_CORP);
}

/// Service wrapper that finalizes every response with [`apply`]
#[derive(Debug, Clone)]
pub struct Isolated<S> {
    inner: S,
}

impl<S> Isolated<S> {
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for Isolated<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: 'static,
    ResBody: 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<ReqBody>) -> Self::Future {
        let fut = self.inner.call(req);
        Box::pin(async move {
            let mut response = fut.await?;
            apply(response.headers_mut());
            Ok(response)
        })
    }
}
