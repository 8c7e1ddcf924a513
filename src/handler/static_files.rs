//! Static file serving module
//!
//! Maps request paths onto the serving root and builds file responses.

use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Serve the file (or directory index) a request path names
pub async fn serve_path(
    ctx: &RequestContext<'_>,
    root: &Path,
    index_files: &[String],
) -> Response<Full<Bytes>> {
    let Some(target) = translate_path(root, ctx.path) else {
        logger::log_warning(&format!("Rejected undecodable path: {}", ctx.path));
        return http::build_400_response(ctx.is_head);
    };

    // File not found is common (404), no need to log at warning level
    let Some((mut target, mut meta)) = resolve_inside(root, &target, ctx.path).await else {
        return http::build_404_response(ctx.is_head);
    };

    if meta.is_dir() {
        if !ctx.path.ends_with('/') {
            return http::build_301_response(&directory_location(ctx.path, ctx.query));
        }
        match find_index(root, &target, index_files, ctx.path).await {
            Some((index, index_meta)) => {
                target = index;
                meta = index_meta;
            }
            None => return http::build_404_response(ctx.is_head),
        }
    } else if ctx.path.ends_with('/') {
        return http::build_404_response(ctx.is_head);
    }

    let modified = meta.modified().ok();
    let last_modified = modified.map(cache::last_modified);
    if let (Some(modified), Some(lm)) = (modified, last_modified.as_deref()) {
        if cache::is_not_modified(
            ctx.if_modified_since.as_deref(),
            ctx.has_if_none_match,
            modified,
        ) {
            return http::build_304_response(lm);
        }
    }

    let content = match fs::read(&target).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {}",
                target.display(),
                e
            ));
            return http::build_404_response(ctx.is_head);
        }
    };

    let content_type = mime::get_content_type(target.extension().and_then(|e| e.to_str()));
    http::build_file_response(content, content_type, last_modified.as_deref(), ctx.is_head)
}

/// Translate a raw request path into a filesystem path under `root`
///
/// The path is percent-decoded and split on `/`; empty, `.` and `..`
/// segments are dropped rather than interpreted, so the result never
/// climbs above `root` lexically. On Windows, segments holding a drive or
/// separator character (`:` or `\`) are dropped too; elsewhere those are
/// ordinary file name bytes. Returns `None` when the path does not decode to
/// UTF-8 or contains a NUL byte.
pub fn translate_path(root: &Path, raw_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(raw_path).ok()?;
    if decoded.contains('\0') {
        return None;
    }

    let mut path = root.to_path_buf();
    for segment in decoded.split('/') {
        if segment.is_empty()
            || segment == "."
            || segment == ".."
            || (cfg!(windows) && (segment.contains('\\') || segment.contains(':')))
        {
            continue;
        }
        path.push(segment);
    }
    Some(path)
}

/// Canonicalize `path` and require it to stay below `root` (symlinks included)
async fn resolve_inside(
    root: &Path,
    path: &Path,
    request_path: &str,
) -> Option<(PathBuf, Metadata)> {
    let canonical = fs::canonicalize(path).await.ok()?;
    if !canonical.starts_with(root) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {} -> {}",
            request_path,
            canonical.display()
        ));
        return None;
    }
    let meta = fs::metadata(&canonical).await.ok()?;
    Some((canonical, meta))
}

/// First configured index file that exists as a regular file in `dir`
async fn find_index(
    root: &Path,
    dir: &Path,
    index_files: &[String],
    request_path: &str,
) -> Option<(PathBuf, Metadata)> {
    for name in index_files {
        if let Some((path, meta)) = resolve_inside(root, &dir.join(name), request_path).await {
            if meta.is_file() {
                return Some((path, meta));
            }
        }
    }
    None
}

/// `Location` for a directory requested without its trailing slash
fn directory_location(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) => format!("{path}/?{q}"),
        None => format!("{path}/"),
    }
}
