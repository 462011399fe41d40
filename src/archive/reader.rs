//! Mounted archive reader
//!
//! The zip reader has a single movable cursor. Every positional read takes
//! the archive lock, reopens the entry by locator, skips to the caller's
//! offset inside the decompressed stream, reads, and drops the extraction
//! before unlocking. Nothing outside this module ever sees the cursor.

use log::{debug, info};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::archive::index::{ArchiveEntry, ArchiveIndex};
use crate::error::StreamError;

/// An opened archive plus its index
pub struct MountedArchive {
    path: PathBuf,
    index: ArchiveIndex,
    reader: Mutex<ZipArchive<File>>,
}

impl MountedArchive {
    /// Open `path` and index the entries under `filter`
    pub fn open(path: &Path, filter: &str) -> Result<Self, StreamError> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;
        let index = ArchiveIndex::build(&mut archive, filter);

        info!(
            "Mounted archive {} ({} entries under {:?})",
            path.display(),
            index.len(),
            filter
        );

        Ok(Self {
            path: path.to_path_buf(),
            index,
            reader: Mutex::new(archive),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock-free: the index never changes after mount
    pub fn index(&self) -> &ArchiveIndex {
        &self.index
    }

    /// Read up to `buf.len()` bytes of `entry` starting at `offset`.
    ///
    /// Returns 0 without touching the archive when `offset` is at or past the
    /// entry's declared size.
    pub fn read_at(
        &self,
        entry: &ArchiveEntry,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize, StreamError> {
        if offset >= entry.size() || buf.is_empty() {
            return Ok(0);
        }

        let remaining = usize::try_from(entry.size() - offset).unwrap_or(usize::MAX);
        let want = buf.len().min(remaining);

        let mut archive = self.reader.lock();
        let mut file = archive.by_index(entry.locator())?;

        // Deflate streams cannot seek; inflate and discard up to the offset.
        let skipped = io::copy(&mut (&mut file).take(offset), &mut io::sink())?;
        if skipped < offset {
            debug!(
                "Archive entry {} ended at {} before offset {}",
                entry.name(),
                skipped,
                offset
            );
            return Ok(0);
        }

        let mut total = 0;
        while total < want {
            match file.read(&mut buf[total..want]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(total)
    }
}
