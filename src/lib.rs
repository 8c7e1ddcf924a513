//! Static file server whose every response is cross-origin isolated.
//!
//! Serves the working directory over plain HTTP on `0.0.0.0:5555` and
//! appends `Cross-Origin-Opener-Policy: same-origin` and
//! `Cross-Origin-Embedder-Policy: require-corp` to each response, which is
//! what browsers require before handing `SharedArrayBuffer` to threaded
//! WebAssembly builds.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
