// Connection IO adapter
// Adds the isolation headers to response heads hyper writes on its own

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{ready, Context, Poll};

use hyper::rt::{Read, ReadBufCursor, Write};

/// Header lines appended to heads that arrive without them, in wire order
const ISOLATION_LINES: &[u8] =
    b"Cross-Origin-Opener-Policy: same-origin\r\nCross-Origin-Embedder-Policy: require-corp\r\n";

/// A head that grows past this without a blank line is not a response head
const MAX_HEAD_LEN: usize = 64 * 1024;

/// Requests handed to the service on one connection, in dispatch order
///
/// Only the `HEAD` flag is kept: a response to `HEAD` advertises a
/// `Content-Length` but carries no body, and the rewriter has to know that
/// to find where the next head starts.
#[derive(Debug, Clone, Default)]
pub struct DispatchedRequests(Arc<Mutex<VecDeque<bool>>>);

impl DispatchedRequests {
    pub fn push(&self, is_head: bool) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(is_head);
    }

    fn pop(&self) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(false)
    }
}

/// Where the outgoing byte stream currently is
#[derive(Debug)]
enum Framing {
    /// Collecting a response head up to its blank line
    Head(Vec<u8>),
    /// Copying this many body bytes
    Body(u64),
    /// Message boundaries are unknown; copy everything as is
    Passthrough,
}

/// Status line and the few header fields the rewriter looks at
#[derive(Debug, PartialEq, Eq)]
struct ResponseHead {
    status: u16,
    content_length: Option<u64>,
    isolated: bool,
}

impl ResponseHead {
    fn parse(head: &[u8]) -> Option<Self> {
        let mut lines = head
            .split(|&b| b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line));

        let status_line = lines.next()?;
        if !status_line.starts_with(b"HTTP/") {
            return None;
        }
        let status = status_line
            .split(|&b| b == b' ')
            .nth(1)
            .and_then(|code| std::str::from_utf8(code).ok())
            .and_then(|code| code.parse().ok())?;

        let mut parsed = Self {
            status,
            content_length: None,
            isolated: false,
        };
        for line in lines {
            let Some(colon) = line.iter().position(|&b| b == b':') else {
                continue;
            };
            let name = &line[..colon];
            if name.eq_ignore_ascii_case(b"cross-origin-opener-policy") {
                parsed.isolated = true;
            } else if name.eq_ignore_ascii_case(b"content-length") {
                parsed.content_length = std::str::from_utf8(line[colon + 1..].trim_ascii())
                    .ok()
                    .and_then(|v| v.parse().ok());
            }
        }
        Some(parsed)
    }

    /// 1xx, 204 and 304 never carry a body
    const fn bodiless(&self) -> bool {
        self.status < 200 || self.status == 204 || self.status == 304
    }
}

/// Tracks response framing on the write side and completes bare heads
///
/// Heads produced by the service already carry the isolation headers. Heads
/// hyper writes itself (400 for a malformed request, 431 for oversized
/// headers) do not; those get the two lines inserted before their blank line.
#[derive(Debug)]
struct HeadRewriter {
    framing: Framing,
    dispatched: DispatchedRequests,
}

impl HeadRewriter {
    const fn new(dispatched: DispatchedRequests) -> Self {
        Self {
            framing: Framing::Head(Vec::new()),
            dispatched,
        }
    }

    fn feed(&mut self, mut input: &[u8], out: &mut Vec<u8>) {
        while !input.is_empty() {
            match &mut self.framing {
                Framing::Passthrough => {
                    out.extend_from_slice(input);
                    return;
                }
                Framing::Body(remaining) => {
                    let take = usize::try_from(*remaining)
                        .map_or(input.len(), |r| r.min(input.len()));
                    out.extend_from_slice(&input[..take]);
                    input = &input[take..];
                    *remaining -= take as u64;
                    if *remaining == 0 {
                        self.framing = Framing::Head(Vec::new());
                    }
                }
                Framing::Head(buf) => {
                    let seen = buf.len();
                    buf.extend_from_slice(input);
                    let Some(end) = find_head_end(buf, seen.saturating_sub(3)) else {
                        if buf.len() > MAX_HEAD_LEN {
                            out.extend_from_slice(buf);
                            self.framing = Framing::Passthrough;
                        }
                        return;
                    };
                    buf.truncate(end);
                    let head = std::mem::take(buf);
                    input = &input[end - seen..];
                    self.finish_head(&head, out);
                }
            }
        }
    }

    fn finish_head(&mut self, head: &[u8], out: &mut Vec<u8>) {
        let Some(parsed) = ResponseHead::parse(head) else {
            out.extend_from_slice(head);
            self.framing = Framing::Passthrough;
            return;
        };

        let mut bodiless = parsed.bodiless();
        if parsed.isolated {
            out.extend_from_slice(head);
            bodiless |= self.dispatched.pop();
        } else {
            out.extend_from_slice(&head[..head.len() - 2]);
            out.extend_from_slice(ISOLATION_LINES);
            out.extend_from_slice(b"\r\n");
        }

        self.framing = match (bodiless, parsed.content_length) {
            (true, _) | (false, Some(0)) => Framing::Head(Vec::new()),
            (false, Some(len)) => Framing::Body(len),
            (false, None) => Framing::Passthrough,
        };
    }
}

/// Index just past the first `\r\n\r\n` at or after `from`
fn find_head_end(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| from + pos + 4)
}

/// hyper IO wrapper that runs every outgoing byte through the head rewriter
///
/// Reads pass straight through. Writes are accepted whole into a pending
/// buffer, which is drained into the inner IO before the next write and on
/// flush or shutdown.
#[derive(Debug)]
pub struct IsolatedIo<T> {
    inner: T,
    rewriter: HeadRewriter,
    pending: Vec<u8>,
    written: usize,
}

impl<T> IsolatedIo<T> {
    pub const fn new(inner: T, dispatched: DispatchedRequests) -> Self {
        Self {
            inner,
            rewriter: HeadRewriter::new(dispatched),
            pending: Vec::new(),
            written: 0,
        }
    }
}

impl<T: Write + Unpin> IsolatedIo<T> {
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.written < self.pending.len() {
            let unsent = &self.pending[self.written..];
            let n = ready!(Pin::new(&mut self.inner).poll_write(cx, unsent))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.written += n;
        }
        self.pending.clear();
        self.written = 0;
        Poll::Ready(Ok(()))
    }
}

impl<T: Read + Unpin> Read for IsolatedIo<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<T: Write + Unpin> Write for IsolatedIo<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        this.rewriter.feed(buf, &mut this.pending);
        if let Poll::Ready(Err(err)) = this.poll_drain(cx) {
            return Poll::Ready(Err(err));
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}
