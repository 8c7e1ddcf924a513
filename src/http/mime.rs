//! MIME type detection module
//!
//! Maps a file extension to the `Content-Type` sent with it.

const FALLBACK: &str = "application/octet-stream";

/// Extension table, matched case-insensitively
const TYPES: &[(&str, &str)] = &[
    // Documents and scripts
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("css", "text/css; charset=utf-8"),
    ("js", "text/javascript; charset=utf-8"),
    ("mjs", "text/javascript; charset=utf-8"),
    ("json", "application/json"),
    ("map", "application/json"),
    ("webmanifest", "application/manifest+json"),
    ("txt", "text/plain; charset=utf-8"),
    ("md", "text/markdown; charset=utf-8"),
    ("xml", "application/xml"),
    ("wasm", "application/wasm"),
    // Map data
    ("pbf", "application/x-protobuf"),
    ("mvt", "application/vnd.mapbox-vector-tile"),
    ("mbtiles", "application/vnd.sqlite3"),
    ("geojson", "application/geo+json"),
    // Images
    ("svg", "image/svg+xml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("ico", "image/x-icon"),
    // Fonts
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
    // Media
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    // Archives
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
];

/// Get MIME Content-Type based on file extension
///
/// # Examples
/// ```
/// use coi_server::http::mime::get_content_type;
/// assert_eq!(get_content_type(Some("wasm")), "application/wasm");
/// assert_eq!(get_content_type(Some("HTML")), "text/html; charset=utf-8");
/// assert_eq!(get_content_type(None), "application/octet-stream");
/// ```
pub fn get_content_type(extension: Option<&str>) -> &'static str {
    extension
        .and_then(|ext| {
            TYPES
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(ext))
                .map(|&(_, mime)| mime)
        })
        .unwrap_or(FALLBACK)
}
