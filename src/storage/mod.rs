//! Disk storage and path resolution
//!
//! Handles name classification, OS file operations, and backend selection.

pub mod filesystem;
pub mod resolver;
pub mod validation;

pub use filesystem::{CHECK_DIRECTORY, CHECK_FILE, OpenMode};
pub use resolver::{PathResolver, Resolved, StreamingRoot};
