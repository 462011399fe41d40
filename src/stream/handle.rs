//! Stream handle records

use std::fs::File;
use std::sync::Arc;

use crate::archive::ArchiveEntry;
use crate::stream::pool::SlotKey;

/// Where the bytes of an open stream live
#[derive(Debug)]
pub enum Backend {
    /// Plain OS file on the persistent root, an absolute path, or the
    /// streaming directory
    File(File),
    /// Entry of the mounted archive
    Archive(Arc<ArchiveEntry>),
}

/// One open virtual stream
#[derive(Debug)]
pub struct StreamHandle {
    pub backend: Backend,
    /// Logical position; tracked for both backends, authoritative for
    /// archive entries
    pub offset: u64,
    /// Cipher pool slot of a secured stream
    pub cipher: Option<SlotKey>,
}

impl StreamHandle {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            offset: 0,
            cipher: None,
        }
    }
}

/// Public identifier of an open stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub(crate) SlotKey);

impl StreamId {
    /// Opaque non-zero value handed across the C boundary
    pub fn into_raw(self) -> usize {
        self.0.into_raw()
    }

    pub fn from_raw(raw: usize) -> Option<Self> {
        SlotKey::from_raw(raw).map(StreamId)
    }
}

/// Origin for [`crate::MountContext::seek`], numbered like `SEEK_SET`,
/// `SEEK_CUR` and `SEEK_END`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Start,
    Current,
    End,
}

impl SeekOrigin {
    pub fn from_whence(whence: i32) -> Option<Self> {
        match whence {
            0 => Some(SeekOrigin::Start),
            1 => Some(SeekOrigin::Current),
            2 => Some(SeekOrigin::End),
            _ => None,
        }
    }
}

/// Logical offset after seeking `offset` bytes from `origin`, or `None` if
/// the result would be negative
pub fn seek_target(current: u64, size: u64, offset: i64, origin: SeekOrigin) -> Option<u64> {
    let base = match origin {
        SeekOrigin::Start => 0,
        SeekOrigin::Current => current,
        SeekOrigin::End => size,
    };
    let target = i128::from(base) + i128::from(offset);
    u64::try_from(target).ok()
}
