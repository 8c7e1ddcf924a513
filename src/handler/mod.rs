//! Request handler module
//!
//! The base handler: maps GET/HEAD request paths onto files below the
//! serving root. Header policy is layered on top of it in `server`.

pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
