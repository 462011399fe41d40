//! File system operations
//!
//! Thin wrappers over the OS used by the resolver and the passthrough calls.

use std::fs::{self, File, OpenOptions};
use std::io::Result;
use std::path::Path;

/// Bit 1 of the `exists` flags: the path must be a regular file
pub const CHECK_FILE: u32 = 1;
/// Bit 2 of the `exists` flags: the path must be a directory
pub const CHECK_DIRECTORY: u32 = 1 << 1;

/// How a stream is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

impl OpenMode {
    /// Mode from the low byte of the C `mode` argument
    pub fn from_raw(mode: u32) -> Option<Self> {
        match mode & 0xff {
            0 => Some(OpenMode::Read),
            1 => Some(OpenMode::Write),
            2 => Some(OpenMode::Append),
            _ => None,
        }
    }

    pub fn is_read_only(self) -> bool {
        self == OpenMode::Read
    }
}

/// Open `path` on disk with the flags for `mode`. Write mode creates the
/// file but keeps existing contents.
pub fn open_file(path: &Path, mode: OpenMode) -> Result<File> {
    let mut options = OpenOptions::new();
    match mode {
        OpenMode::Read => options.read(true),
        OpenMode::Write => options.read(true).write(true).create(true),
        OpenMode::Append => options.read(true).append(true).create(true),
    };
    options.open(path)
}

/// Create every missing ancestor directory of `path`
pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
            fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}

/// Check `path` against the `exists` flags. Flags combine with OR.
pub fn exists_on_disk(path: &Path, flags: u32) -> bool {
    match fs::metadata(path) {
        Ok(metadata) => {
            (flags & CHECK_FILE != 0 && metadata.is_file())
                || (flags & CHECK_DIRECTORY != 0 && metadata.is_dir())
        }
        Err(_) => false,
    }
}

/// Delete a file or an empty directory
pub fn remove_path(path: &Path) -> Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    }
}

pub fn rename_path(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to)
}
