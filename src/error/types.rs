//! Error types
//!
//! Every fallible stream operation returns a [`StreamError`]; only the C
//! layer turns them into sentinel values.

use std::fmt;
use std::io;

use zip::result::ZipError;

/// Stream layer errors
#[derive(Debug)]
pub enum StreamError {
    /// No backend resolves the path
    NotFound(String),
    /// OS level open/read/write failure
    IoError(io::Error),
    /// The archive reader failed to reopen or inflate an entry
    Archive(ZipError),
    /// A handle or cipher pool is exhausted
    OutOfMemory(&'static str),
    /// Unknown handle, bad mode, or a seek that would go negative
    InvalidArgument(String),
    /// Write against an archive-backed stream, or similar
    Unsupported(String),
    /// No mount context is active
    NotMounted,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::NotFound(p) => write!(f, "File not found: {}", p),
            StreamError::IoError(e) => write!(f, "IO error: {}", e),
            StreamError::Archive(e) => write!(f, "Archive error: {}", e),
            StreamError::OutOfMemory(pool) => write!(f, "Out of memory: {} pool exhausted", pool),
            StreamError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            StreamError::Unsupported(msg) => write!(f, "Unsupported operation: {}", msg),
            StreamError::NotMounted => write!(f, "File stream layer is not started"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::IoError(e) => Some(e),
            StreamError::Archive(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(error: io::Error) -> Self {
        StreamError::IoError(error)
    }
}

impl From<ZipError> for StreamError {
    fn from(error: ZipError) -> Self {
        match error {
            ZipError::Io(e) => StreamError::IoError(e),
            other => StreamError::Archive(other),
        }
    }
}
