//! C interface
//!
//! Wraps a process-wide [`MountContext`] in `extern "C"` functions for a
//! host runtime. Failures never unwind across the boundary; they come back
//! as sentinels (null, 0, -1 or false) and the errno of the last failure on
//! the calling thread is available from [`fsni_last_error`].

use log::warn;
use parking_lot::RwLock;
use std::cell::Cell;
use std::ffi::{CStr, c_char, c_int, c_void};
use std::path::Path;
use std::ptr;
use std::slice;
use std::sync::Arc;

use crate::config::MountConfig;
use crate::context::MountContext;
use crate::error::StreamError;
use crate::error::handlers::{error_to_errno, handle_error};
use crate::storage::OpenMode;
use crate::storage::filesystem::{remove_path, rename_path};
use crate::stream::{SeekOrigin, StreamId};
use crate::utils::logging::setup_logging;

/// Bits above the low 16 of the `mode` argument request a secured stream
pub const SECURE_SHIFT: u32 = 16;

static CONTEXT: RwLock<Option<Arc<MountContext>>> = RwLock::new(None);

static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

thread_local! {
    static LAST_ERROR: Cell<c_int> = const { Cell::new(0) };
}

fn context() -> Result<Arc<MountContext>, StreamError> {
    CONTEXT.read().clone().ok_or(StreamError::NotMounted)
}

/// Log a failure and remember its errno for this thread
fn record<T>(operation: &str, result: Result<T, StreamError>) -> Option<T> {
    match result {
        Ok(value) => {
            LAST_ERROR.set(0);
            Some(value)
        }
        Err(e) => {
            handle_error(operation, &e);
            LAST_ERROR.set(error_to_errno(&e));
            None
        }
    }
}

/// # Safety
/// `ptr` must be null or a valid NUL-terminated string that outlives `'a`.
unsafe fn c_str<'a>(ptr: *const c_char) -> Result<&'a str, StreamError> {
    if ptr.is_null() {
        return Err(StreamError::InvalidArgument("null path".into()));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| StreamError::InvalidArgument("path is not valid UTF-8".into()))
}

/// # Safety
/// `ptr` must be null or valid for `len` readable bytes for `'a`.
unsafe fn raw_bytes<'a>(ptr: *const c_void, len: c_int) -> &'a [u8] {
    if ptr.is_null() || len <= 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(ptr.cast::<u8>(), len as usize) }
    }
}

fn stream_id(fp: *mut c_void) -> Result<StreamId, StreamError> {
    StreamId::from_raw(fp.addr()).ok_or_else(|| StreamError::InvalidArgument("null stream".into()))
}

fn to_c_int(value: u64) -> Result<c_int, StreamError> {
    c_int::try_from(value)
        .map_err(|_| StreamError::InvalidArgument(format!("{value} does not fit the C int result")))
}

/// Start the layer. `streaming_path` is a directory or
/// `jar:file://<archive>!/<filter>`; `persist_path` is the writable root.
///
/// # Safety
/// Both arguments must be null or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsni_startup(streaming_path: *const c_char, persist_path: *const c_char) {
    setup_logging();

    let streaming = unsafe { c_str(streaming_path) }.unwrap_or("");
    let persist = unsafe { c_str(persist_path) }.unwrap_or("");

    let config = MountConfig::load().unwrap_or_else(|e| {
        warn!("Ignoring fsni configuration: {}", e);
        MountConfig::default()
    });
    let context = MountContext::startup(config.with_roots(streaming, persist));

    let previous = CONTEXT.write().replace(Arc::new(context));
    if previous.is_some() {
        warn!("fsni_startup called twice; the previous mount was replaced");
    }
}

/// Tear down process-wide state. Streams still open become invalid.
#[unsafe(no_mangle)]
pub extern "C" fn fsni_cleanup() {
    if let Some(context) = CONTEXT.write().take() {
        match Arc::try_unwrap(context) {
            Ok(context) => context.cleanup(),
            // Another thread is mid-call; the context drops when it returns.
            Err(_) => warn!("fsni_cleanup while calls are in flight"),
        }
    }
}

/// Open `path`. The low byte of `mode` is 0 read, 1 write, 2 append; any
/// bit from bit 16 up requests a secured stream. Returns null on failure.
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsni_open(path: *const c_char, mode: c_int) -> *mut c_void {
    let result: Result<StreamId, StreamError> = (|| {
        let name = unsafe { c_str(path) }?;
        let raw_mode = mode as u32;
        let open_mode = OpenMode::from_raw(raw_mode)
            .ok_or_else(|| StreamError::InvalidArgument(format!("unknown open mode {mode}")))?;
        let secure = raw_mode >> SECURE_SHIFT != 0;
        context()?.open(name, open_mode, secure)
    })();

    match record("fsni_open", result) {
        Some(id) => ptr::without_provenance_mut(id.into_raw()),
        None => ptr::null_mut(),
    }
}

/// Read up to `size` bytes into `buf`. Returns the byte count, 0 at end of
/// stream or on error.
///
/// # Safety
/// `buf` must be valid for `size` writable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsni_read(fp: *mut c_void, buf: *mut c_void, size: c_int) -> c_int {
    if buf.is_null() || size <= 0 {
        return 0;
    }
    let buf = unsafe { slice::from_raw_parts_mut(buf.cast::<u8>(), size as usize) };
    let result = stream_id(fp).and_then(|id| context()?.read(id, buf));
    record("fsni_read", result).map_or(0, |n| n as c_int)
}

/// Write `size` bytes from `buf`. Returns the byte count, 0 for
/// archive-backed streams or on error.
///
/// # Safety
/// `buf` must be valid for `size` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsni_write(fp: *mut c_void, buf: *const c_void, size: c_int) -> c_int {
    if buf.is_null() || size <= 0 {
        return 0;
    }
    let buf = unsafe { slice::from_raw_parts(buf.cast::<u8>(), size as usize) };
    let result = stream_id(fp).and_then(|id| context()?.write(id, buf));
    record("fsni_write", result).map_or(0, |n| n as c_int)
}

/// Seek like `lseek`: `origin` is `SEEK_SET`, `SEEK_CUR` or `SEEK_END`.
/// Returns the new offset or -1.
#[unsafe(no_mangle)]
pub extern "C" fn fsni_seek(fp: *mut c_void, offset: c_int, origin: c_int) -> c_int {
    let result: Result<c_int, StreamError> = (|| {
        let id = stream_id(fp)?;
        let origin = SeekOrigin::from_whence(origin)
            .ok_or_else(|| StreamError::InvalidArgument(format!("unknown seek origin {origin}")))?;
        to_c_int(context()?.seek(id, i64::from(offset), origin)?)
    })();
    record("fsni_seek", result).unwrap_or(-1)
}

/// Total size of the stream in bytes, or -1
#[unsafe(no_mangle)]
pub extern "C" fn fsni_getsize(fp: *mut c_void) -> c_int {
    let result = stream_id(fp).and_then(|id| to_c_int(context()?.size(id)?));
    record("fsni_getsize", result).unwrap_or(-1)
}

/// Close a stream. Null and already closed streams are ignored.
#[unsafe(no_mangle)]
pub extern "C" fn fsni_close(fp: *mut c_void) {
    let Ok(id) = stream_id(fp) else {
        return;
    };
    if let Ok(context) = context() {
        context.close(id);
    }
}

/// Delete a file or empty directory. Returns 0 or -1.
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsni_remove(path: *const c_char) -> c_int {
    let result = unsafe { c_str(path) }
        .and_then(|p| remove_path(Path::new(p)).map_err(StreamError::from));
    record("fsni_remove", result).map_or(-1, |_| 0)
}

/// Rename a file or directory. Returns 0 or -1.
///
/// # Safety
/// Both arguments must be null or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsni_rename(old_name: *const c_char, new_name: *const c_char) -> c_int {
    let result: Result<(), StreamError> = (|| {
        let from = unsafe { c_str(old_name) }?;
        let to = unsafe { c_str(new_name) }?;
        Ok(rename_path(Path::new(from), Path::new(to))?)
    })();
    record("fsni_rename", result).map_or(-1, |_| 0)
}

/// `flags` bit 1: regular file, bit 2: directory
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsni_exists(path: *const c_char, flags: c_int) -> bool {
    let Ok(path) = (unsafe { c_str(path) }) else {
        return false;
    };
    context().is_ok_and(|context| context.exists(path, flags as u32))
}

/// Replace the key and IV for streams opened afterwards. Shorter material
/// is zero-padded, longer is truncated to 16 bytes.
///
/// # Safety
/// `key` and `iv` must be null or valid for `key_len` / `iv_len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsni_set_secret(
    key: *const c_void,
    key_len: c_int,
    iv: *const c_void,
    iv_len: c_int,
) {
    let key = unsafe { raw_bytes(key, key_len) };
    let iv = unsafe { raw_bytes(iv, iv_len) };
    let result = context().map(|context| context.set_secret(key, iv));
    record("fsni_set_secret", result);
}

/// errno of the last failed call on this thread, 0 after a success
#[unsafe(no_mangle)]
pub extern "C" fn fsni_last_error() -> c_int {
    LAST_ERROR.get()
}

/// Library version as a static NUL-terminated string
#[unsafe(no_mangle)]
pub extern "C" fn fsni_version() -> *const c_char {
    VERSION.as_ptr().cast()
}
