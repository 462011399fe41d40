//! Path resolution
//!
//! Decides which backend serves a logical name. Writes and appends always go
//! to the persistent root (or the absolute path). Reads try the persistent
//! root first so a hot-updated file shadows the bundled copy, then the
//! mounted archive, then the streaming directory.

use log::debug;
use std::borrow::Cow;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::{ArchiveEntry, MountedArchive};
use crate::error::StreamError;
use crate::storage::filesystem::{OpenMode, ensure_parent_dirs, open_file};
use crate::storage::validation::is_absolute_name;

/// Read-only bundled content location
pub enum StreamingRoot {
    Directory(PathBuf),
    Archive(MountedArchive),
    /// An archive was requested but could not be mounted
    Unavailable,
}

impl StreamingRoot {
    pub fn archive(&self) -> Option<&MountedArchive> {
        match self {
            StreamingRoot::Archive(archive) => Some(archive),
            _ => None,
        }
    }
}

/// Backend chosen for an open
#[derive(Debug)]
pub enum Resolved {
    File(File),
    Archive(Arc<ArchiveEntry>),
}

pub struct PathResolver<'a> {
    persist_root: &'a Path,
    streaming: &'a StreamingRoot,
}

impl<'a> PathResolver<'a> {
    pub fn new(persist_root: &'a Path, streaming: &'a StreamingRoot) -> Self {
        Self {
            persist_root,
            streaming,
        }
    }

    /// Location of `name` on the persistent root (or verbatim if absolute)
    pub fn persist_path(&self, name: &str) -> PathBuf {
        if is_absolute_name(name) {
            PathBuf::from(name)
        } else {
            self.persist_root.join(name)
        }
    }

    /// Disk locations `exists` should look at, in priority order
    pub fn disk_candidates(&self, name: &str) -> Vec<PathBuf> {
        let mut candidates = vec![self.persist_path(name)];
        if !is_absolute_name(name) {
            if let StreamingRoot::Directory(dir) = self.streaming {
                candidates.push(dir.join(name));
            }
        }
        candidates
    }

    pub fn resolve(&self, name: &str, mode: OpenMode) -> Result<Resolved, StreamError> {
        let absolute = is_absolute_name(name);
        let full_path = self.persist_path(name);

        if !mode.is_read_only() {
            ensure_parent_dirs(&full_path)?;
            return Ok(Resolved::File(open_file(&full_path, mode)?));
        }

        match open_file(&full_path, OpenMode::Read) {
            Ok(file) => return Ok(Resolved::File(file)),
            Err(e) if absolute => return Err(classify(name, e)),
            Err(e) => debug!("{} not on persistent root: {}", full_path.display(), e),
        }

        match self.streaming {
            StreamingRoot::Archive(archive) => {
                if let Some(entry) = archive.index().lookup(&archive_key(name)) {
                    if !entry.is_dir() && !names_directory(name) {
                        return Ok(Resolved::Archive(entry));
                    }
                }
            }
            StreamingRoot::Directory(dir) => {
                let fallback = dir.join(name);
                match open_file(&fallback, OpenMode::Read) {
                    Ok(file) => return Ok(Resolved::File(file)),
                    Err(e) => debug!("{} not on streaming root: {}", fallback.display(), e),
                }
            }
            StreamingRoot::Unavailable => {}
        }

        Err(StreamError::NotFound(name.to_string()))
    }
}

/// Index key for `name`: forward slashes, no trailing separator
pub fn archive_key(name: &str) -> Cow<'_, str> {
    let trimmed = name.trim_end_matches(['/', '\\']);
    if trimmed.contains('\\') {
        Cow::Owned(trimmed.replace('\\', "/"))
    } else {
        Cow::Borrowed(trimmed)
    }
}

/// A trailing separator only ever names a directory
pub fn names_directory(name: &str) -> bool {
    name.ends_with(['/', '\\'])
}

fn classify(name: &str, error: io::Error) -> StreamError {
    if error.kind() == io::ErrorKind::NotFound {
        StreamError::NotFound(name.to_string())
    } else {
        StreamError::IoError(error)
    }
}
