//! Archive index
//!
//! Built once at mount time by walking the archive's central directory.
//! Only names under the inner filter are kept, with the filter stripped,
//! so `assets/settings.xml` under filter `assets/` is looked up as
//! `settings.xml`.

use log::{debug, warn};
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::sync::Arc;
use zip::ZipArchive;

/// One retained archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    name: String,
    locator: usize,
    size: u64,
    is_dir: bool,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, locator: usize, size: u64, is_dir: bool) -> Self {
        Self {
            name: name.into(),
            locator,
            size,
            is_dir,
        }
    }

    /// Filter-stripped relative name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in the central directory; reopens the entry without a rescan
    pub fn locator(&self) -> usize {
        self.locator
    }

    /// Declared uncompressed size
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }
}

/// Immutable name → entry map
#[derive(Debug, Default)]
pub struct ArchiveIndex {
    entries: HashMap<String, Arc<ArchiveEntry>>,
}

impl ArchiveIndex {
    /// Scan every entry of `archive`, keeping those under `filter`.
    /// Duplicate names resolve last-write-wins.
    pub fn build<R: Read + Seek>(archive: &mut ZipArchive<R>, filter: &str) -> Self {
        let mut entries = HashMap::new();

        for locator in 0..archive.len() {
            let (raw_name, size, is_dir) = match archive.by_index_raw(locator) {
                Ok(file) => (file.name().to_string(), file.size(), file.is_dir()),
                Err(e) => {
                    warn!("Skipping unreadable archive entry #{locator}: {e}");
                    continue;
                }
            };

            let Some(name) = strip_filter(&raw_name, filter) else {
                continue;
            };

            let entry = ArchiveEntry::new(name, locator, size, is_dir);
            if let Some(previous) = entries.insert(name.to_string(), Arc::new(entry)) {
                warn!(
                    "Duplicate archive entry {} (#{} replaced by #{})",
                    name,
                    previous.locator(),
                    locator
                );
            }
        }

        debug!("Indexed {} archive entries under filter {:?}", entries.len(), filter);
        Self { entries }
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<ArchiveEntry>> {
        self.entries.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.values().map(|entry| entry.as_ref())
    }
}

/// Relative name of `raw` under `filter`, or `None` if it is not retained
fn strip_filter<'a>(raw: &'a str, filter: &str) -> Option<&'a str> {
    if !filter.is_empty() && (raw.len() <= filter.len() || !raw.starts_with(filter)) {
        return None;
    }
    let name = raw[filter.len()..].trim_end_matches('/');
    (!name.is_empty()).then_some(name)
}
