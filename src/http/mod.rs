//! HTTP protocol layer module
//!
//! Header policy, content types, cache validation and response builders,
//! kept apart from the file-mapping logic in `handler`.

pub mod cache;
pub mod isolation;
pub mod mime;
pub mod response;

// Re-export commonly used items
pub use isolation::Isolated;
pub use response::{
    build_301_response, build_304_response, build_400_response, build_404_response,
    build_501_response, build_file_response,
};
