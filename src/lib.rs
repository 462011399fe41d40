//! File stream native interface
//!
//! One virtual file API over three places a file can live: a writable
//! persistent root, a read-only bundled archive (or directory), and absolute
//! paths. Streams can optionally pass through an AES-128 CFB stream cipher.
//! The [`ffi`] module exports the same operations to C.

pub mod archive;
pub mod config;
pub mod context;
pub mod error;
pub mod ffi;
pub mod storage;
pub mod stream;
pub mod utils;

pub use config::MountConfig;
pub use context::MountContext;
pub use error::StreamError;
pub use storage::{CHECK_DIRECTORY, CHECK_FILE, OpenMode};
pub use stream::{SeekOrigin, StreamId};
