//! Error handlers
//!
//! Logging and errno conversion for errors that cross the C boundary.

use crate::error::types::StreamError;
use log::error;

/// Log a failed stream operation
pub fn handle_error(operation: &str, err: &StreamError) {
    error!("{} failed: {}", operation, err);
}

/// Convert error to a platform errno value
pub fn error_to_errno(err: &StreamError) -> i32 {
    match err {
        StreamError::NotFound(_) => libc::ENOENT,
        StreamError::IoError(e) => e.raw_os_error().unwrap_or(libc::EIO),
        StreamError::Archive(_) => libc::EIO,
        StreamError::OutOfMemory(_) => libc::ENOMEM,
        StreamError::InvalidArgument(_) => libc::EINVAL,
        StreamError::Unsupported(_) => libc::EBADF,
        StreamError::NotMounted => libc::ENXIO,
    }
}
