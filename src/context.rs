//! Mount context
//!
//! Owns the roots, the mounted archive, the cipher material and both pools.
//! Every stream operation goes through here; all methods take `&self` and
//! may be called from any number of threads.

use log::{debug, info, warn};
use parking_lot::RwLock;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::archive::{MountedArchive, parse_archive_path};
use crate::config::{MountConfig, SECRET_LEN, normalize_secret};
use crate::error::StreamError;
use crate::storage::filesystem::exists_on_disk;
use crate::storage::resolver::{archive_key, names_directory};
use crate::storage::validation::is_valid_name;
use crate::storage::{CHECK_DIRECTORY, CHECK_FILE, OpenMode, PathResolver, Resolved, StreamingRoot};
use crate::stream::handle::seek_target;
use crate::stream::{Backend, CipherState, Pool, SeekOrigin, SlotKey, StreamHandle, StreamId};

struct Secret {
    key: [u8; SECRET_LEN],
    iv: [u8; SECRET_LEN],
}

/// Process state between startup and cleanup
pub struct MountContext {
    persist_root: PathBuf,
    streaming: StreamingRoot,
    buffer_size: usize,
    secret: RwLock<Secret>,
    handles: Pool<StreamHandle>,
    ciphers: Pool<CipherState>,
}

impl MountContext {
    /// Record the roots and mount the archive if the streaming path names
    /// one. A failed mount leaves the context serving disk only.
    pub fn startup(config: MountConfig) -> Self {
        debug!(
            "startup: streaming path {:?}, persist path {:?}",
            config.streaming_path, config.persist_path
        );

        let streaming = match parse_archive_path(&config.streaming_path) {
            Some((archive_path, filter)) => {
                match MountedArchive::open(Path::new(archive_path), filter) {
                    Ok(archive) => StreamingRoot::Archive(archive),
                    Err(e) => {
                        warn!(
                            "Cannot mount archive {}: {}; streaming from disk only",
                            archive_path, e
                        );
                        StreamingRoot::Unavailable
                    }
                }
            }
            None => StreamingRoot::Directory(PathBuf::from(&config.streaming_path)),
        };

        Self {
            persist_root: config.persist_root(),
            streaming,
            buffer_size: config.buffer_size,
            secret: RwLock::new(Secret {
                key: config.key(),
                iv: config.iv(),
            }),
            handles: Pool::new("stream", config.max_streams),
            ciphers: Pool::new("cipher", config.max_streams),
        }
    }

    /// Release the archive and the roots. Streams still open are closed.
    pub fn cleanup(self) {
        let open = self.handles.in_use();
        if open > 0 {
            warn!("cleanup with {} stream(s) still open", open);
        }
        if let Some(archive) = self.streaming.archive() {
            info!("Unmounting archive {}", archive.path().display());
        }
    }

    pub fn persist_root(&self) -> &Path {
        &self.persist_root
    }

    pub fn archive(&self) -> Option<&MountedArchive> {
        self.streaming.archive()
    }

    /// Number of streams currently open
    pub fn open_streams(&self) -> usize {
        self.handles.in_use()
    }

    /// Replace the key and IV used by streams opened from now on
    pub fn set_secret(&self, key: &[u8], iv: &[u8]) {
        let mut secret = self.secret.write();
        secret.key = normalize_secret(key);
        secret.iv = normalize_secret(iv);
    }

    fn resolver(&self) -> PathResolver<'_> {
        PathResolver::new(&self.persist_root, &self.streaming)
    }

    /// Open `name`. With `secure`, every byte read or written through the
    /// stream passes through the stream cipher.
    pub fn open(&self, name: &str, mode: OpenMode, secure: bool) -> Result<StreamId, StreamError> {
        if !is_valid_name(name) {
            return Err(StreamError::InvalidArgument(format!("bad file name {name:?}")));
        }

        let backend = match self.resolver().resolve(name, mode)? {
            Resolved::File(file) => Backend::File(file),
            Resolved::Archive(entry) => Backend::Archive(entry),
        };

        let mut handle = StreamHandle::new(backend);
        if secure {
            let secret = self.secret.read();
            handle.cipher = Some(self.ciphers.acquire(CipherState::new(&secret.key, &secret.iv))?);
        }

        let cipher = handle.cipher;
        match self.handles.acquire(handle) {
            Ok(key) => {
                debug!("Opened {} ({:?}, secure: {})", name, mode, secure);
                Ok(StreamId(key))
            }
            Err(e) => {
                if let Some(cipher) = cipher {
                    self.ciphers.release(cipher);
                }
                Err(e)
            }
        }
    }

    /// Read up to `buf.len()` bytes; 0 means end of stream
    pub fn read(&self, id: StreamId, buf: &mut [u8]) -> Result<usize, StreamError> {
        self.with_handle(id, |handle| {
            let n = match &mut handle.backend {
                Backend::File(file) => read_file(file, buf)?,
                Backend::Archive(entry) => {
                    let archive = self.streaming.archive().ok_or(StreamError::NotMounted)?;
                    archive.read_at(entry, handle.offset, buf)?
                }
            };
            handle.offset += n as u64;

            if let Some(key) = handle.cipher {
                if n > 0 {
                    self.with_cipher(key, |cipher| cipher.decrypt(&mut buf[..n]))?;
                }
            }
            Ok(n)
        })
    }

    /// Write `buf`; archive-backed streams are read-only
    pub fn write(&self, id: StreamId, buf: &[u8]) -> Result<usize, StreamError> {
        self.with_handle(id, |handle| {
            let file = match &mut handle.backend {
                Backend::File(file) => file,
                Backend::Archive(entry) => {
                    return Err(StreamError::Unsupported(format!(
                        "{} is inside the archive and read-only",
                        entry.name()
                    )));
                }
            };

            let written = match handle.cipher {
                None => file.write(buf)?,
                Some(key) => {
                    self.write_secured(file, key, buf)?;
                    buf.len()
                }
            };
            handle.offset += written as u64;
            Ok(written)
        })
    }

    // Encrypts through a scratch chunk so the caller's buffer is untouched
    // and the cipher position always matches the bytes on disk.
    fn write_secured(&self, file: &mut File, key: SlotKey, buf: &[u8]) -> Result<(), StreamError> {
        let mut scratch = vec![0u8; self.buffer_size.min(buf.len())];
        self.with_cipher(key, |cipher| {
            for chunk in buf.chunks(self.buffer_size) {
                let out = &mut scratch[..chunk.len()];
                out.copy_from_slice(chunk);
                cipher.encrypt(out);
                file.write_all(out)?;
            }
            Ok::<(), io::Error>(())
        })??;
        Ok(())
    }

    /// Move the logical position. Negative targets are rejected and leave
    /// the position unchanged. Seeking never rewinds a stream cipher.
    pub fn seek(&self, id: StreamId, offset: i64, origin: SeekOrigin) -> Result<u64, StreamError> {
        self.with_handle(id, |handle| {
            if handle.cipher.is_some() {
                debug!("seek on a secured stream; cipher state is not re-derived");
            }

            let position = match &mut handle.backend {
                Backend::File(file) => {
                    let from = match origin {
                        SeekOrigin::Start => SeekFrom::Start(
                            u64::try_from(offset).map_err(|_| negative_seek(offset))?,
                        ),
                        SeekOrigin::Current => SeekFrom::Current(offset),
                        SeekOrigin::End => SeekFrom::End(offset),
                    };
                    file.seek(from)?
                }
                Backend::Archive(entry) => {
                    seek_target(handle.offset, entry.size(), offset, origin)
                        .ok_or_else(|| negative_seek(offset))?
                }
            };
            handle.offset = position;
            Ok(position)
        })
    }

    /// Total size in bytes. File streams keep their position.
    pub fn size(&self, id: StreamId) -> Result<u64, StreamError> {
        self.with_handle(id, |handle| match &mut handle.backend {
            Backend::Archive(entry) => Ok(entry.size()),
            Backend::File(file) => {
                let prior = file.stream_position().unwrap_or(0);
                let end = file.seek(SeekFrom::End(0))?;
                if let Err(e) = file.seek(SeekFrom::Start(prior)) {
                    warn!("Cannot restore position {} after size query: {}", prior, e);
                    handle.offset = file.seek(SeekFrom::Start(0))?;
                }
                Ok(end)
            }
        })
    }

    /// Close a stream. Returns false for unknown or already closed ids.
    pub fn close(&self, id: StreamId) -> bool {
        let cipher = match self.with_handle(id, |handle| Ok(handle.cipher.take())) {
            Ok(cipher) => cipher,
            Err(_) => return false,
        };
        if let Some(key) = cipher {
            self.ciphers.release(key);
        }
        // Dropping the record closes the OS descriptor.
        self.handles.release(id.0).is_some()
    }

    /// Whether `path` exists on disk (persistent root, then streaming
    /// directory) or in the archive index. `flags` bit 1 asks for a regular
    /// file, bit 2 for a directory.
    pub fn exists(&self, path: &str, flags: u32) -> bool {
        if !is_valid_name(path) {
            return false;
        }

        let resolver = self.resolver();
        if resolver
            .disk_candidates(path)
            .iter()
            .any(|candidate| exists_on_disk(candidate, flags))
        {
            return true;
        }

        self.streaming
            .archive()
            .and_then(|archive| archive.index().lookup(&archive_key(path)))
            .is_some_and(|entry| {
                if entry.is_dir() {
                    flags & CHECK_DIRECTORY != 0
                } else {
                    flags & CHECK_FILE != 0 && !names_directory(path)
                }
            })
    }

    fn with_handle<R>(
        &self,
        id: StreamId,
        f: impl FnOnce(&mut StreamHandle) -> Result<R, StreamError>,
    ) -> Result<R, StreamError> {
        self.handles.with(id.0, f).unwrap_or_else(|| Err(stale_handle()))
    }

    fn with_cipher<R>(&self, key: SlotKey, f: impl FnOnce(&mut CipherState) -> R) -> Result<R, StreamError> {
        self.ciphers.with(key, f).ok_or_else(stale_handle)
    }
}

fn read_file(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match file.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn stale_handle() -> StreamError {
    StreamError::InvalidArgument("stream handle is not open".into())
}

fn negative_seek(offset: i64) -> StreamError {
    StreamError::InvalidArgument(format!("seek by {offset} would move before the start"))
}
