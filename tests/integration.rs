use std::ffi::{CStr, CString};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use serial_test::serial;
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use fsni::ffi::*;
use fsni::{CHECK_DIRECTORY, CHECK_FILE, MountConfig, MountContext, OpenMode, SeekOrigin, StreamId};

const SETTINGS_XML: &[u8] = b"<settings><lang>en</lang></settings>\n";

// Helper to build a deterministic Lua-looking body of the given size
fn key_map(len: usize) -> Vec<u8> {
    let line = b"bind(\"ctrl+s\", \"save\")\n";
    line.iter().copied().cycle().take(len).collect()
}

// Helper to write a zip archive with the given entries
fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

// Helper to setup a persistent root and a bundle containing r.zip
fn setup_test_env(entries: &[(&str, &[u8])]) -> (TempDir, TempDir, PathBuf) {
    let persist = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    let zip_path = bundle.path().join("r.zip");
    write_zip(&zip_path, entries);
    (persist, bundle, zip_path)
}

fn archive_path(zip_path: &Path, filter: &str) -> String {
    format!("jar:file://{}!/{}", zip_path.display(), filter)
}

fn mount(persist: &Path, streaming: &str) -> MountContext {
    MountContext::startup(
        MountConfig::default().with_roots(streaming, persist.to_str().unwrap()),
    )
}

fn read_all(context: &MountContext, id: StreamId, chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        let n = context.read(id, &mut buf).unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

fn c(s: &str) -> CString {
    CString::new(s).unwrap()
}

#[test]
#[serial]
fn test_ffi_mounted_archive_scenario() {
    let key_map = key_map(912);
    let (persist, _bundle, zip_path) = setup_test_env(&[
        ("assets/settings.xml", SETTINGS_XML),
        ("assets/EditorKeyMap.lua", &key_map),
        ("res/ignored.txt", b"outside the filter"),
    ]);
    assert_eq!(SETTINGS_XML.len(), 37);

    let streaming = c(&archive_path(&zip_path, "assets/"));
    let persist_path = c(&format!("{}/", persist.path().display()));

    unsafe {
        fsni_startup(streaming.as_ptr(), persist_path.as_ptr());

        assert!(fsni_exists(c("settings.xml").as_ptr(), CHECK_FILE as i32));
        assert!(fsni_exists(c("EditorKeyMap.lua").as_ptr(), CHECK_FILE as i32));
        assert!(!fsni_exists(c("ignored.txt").as_ptr(), CHECK_FILE as i32));

        let fp = fsni_open(c("settings.xml").as_ptr(), 0);
        assert!(!fp.is_null());
        assert_eq!(fsni_getsize(fp), 37);

        let mut content = vec![0u8; 37];
        assert_eq!(fsni_read(fp, content.as_mut_ptr().cast(), 37), 37);
        assert_eq!(content, SETTINGS_XML);
        assert_eq!(fsni_read(fp, content.as_mut_ptr().cast(), 37), 0);

        assert_eq!(fsni_seek(fp, 0, 2), 37);
        assert_eq!(fsni_seek(fp, 0, 0), 0);
        assert_eq!(fsni_seek(fp, -1, 0), -1);
        assert_eq!(fsni_last_error(), libc::EINVAL);
        assert_eq!(fsni_write(fp, content.as_ptr().cast(), 4), 0);
        fsni_close(fp);
        // closing again is a guarded no-op
        fsni_close(fp);
        fsni_close(std::ptr::null_mut());

        let fp = fsni_open(c("EditorKeyMap.lua").as_ptr(), 0);
        assert_eq!(fsni_getsize(fp), 912);
        let mut body = vec![0u8; 1024];
        let mut total = 0;
        loop {
            let n = fsni_read(fp, body[total..].as_mut_ptr().cast(), 100);
            if n == 0 {
                break;
            }
            total += n as usize;
        }
        assert_eq!(&body[..total], key_map.as_slice());
        fsni_close(fp);

        fsni_cleanup();
    }
}

#[test]
#[serial]
fn test_ffi_open_failures_are_distinguishable() {
    let persist = tempfile::tempdir().unwrap();
    let persist_path = c(persist.path().to_str().unwrap());

    unsafe {
        // before startup nothing resolves
        assert!(fsni_open(c("a.txt").as_ptr(), 0).is_null());

        fsni_startup(c("").as_ptr(), persist_path.as_ptr());
        assert!(fsni_open(c("missing.txt").as_ptr(), 0).is_null());
        assert_eq!(fsni_last_error(), libc::ENOENT);

        assert!(fsni_open(c("bad-mode.txt").as_ptr(), 7).is_null());
        assert_eq!(fsni_last_error(), libc::EINVAL);

        assert!(fsni_open(std::ptr::null(), 0).is_null());
        fsni_cleanup();
    }
}

#[test]
#[serial]
fn test_ffi_secured_round_trip_and_passthrough() {
    let persist = tempfile::tempdir().unwrap();
    let persist_path = c(persist.path().to_str().unwrap());
    let secure_write = 1 | (1 << SECURE_SHIFT);
    let secure_read = 1 << SECURE_SHIFT;
    let plaintext = b"player=ada;level=12;checkpoint=bridge";

    unsafe {
        fsni_startup(c("").as_ptr(), persist_path.as_ptr());
        fsni_set_secret(b"game-key".as_ptr().cast(), 8, b"game-iv".as_ptr().cast(), 7);

        let fp = fsni_open(c("saves/profile.dat").as_ptr(), secure_write);
        assert!(!fp.is_null());
        let original = plaintext.to_vec();
        assert_eq!(fsni_write(fp, original.as_ptr().cast(), 20), 20);
        assert_eq!(
            fsni_write(fp, original[20..].as_ptr().cast(), (plaintext.len() - 20) as i32),
            (plaintext.len() - 20) as i32
        );
        // caller's buffer is never encrypted in place
        assert_eq!(original.as_slice(), plaintext);
        fsni_close(fp);

        let stored = fs::read(persist.path().join("saves/profile.dat")).unwrap();
        assert_ne!(stored.as_slice(), plaintext);

        let fp = fsni_open(c("saves/profile.dat").as_ptr(), secure_read);
        let mut back = vec![0u8; plaintext.len()];
        let first = fsni_read(fp, back.as_mut_ptr().cast(), 5) as usize;
        let rest = fsni_read(fp, back[first..].as_mut_ptr().cast(), 100) as usize;
        assert_eq!(first + rest, plaintext.len());
        assert_eq!(back.as_slice(), plaintext);
        fsni_close(fp);

        let from = persist.path().join("saves/profile.dat");
        let to = persist.path().join("saves/profile.bak");
        assert_eq!(
            fsni_rename(c(from.to_str().unwrap()).as_ptr(), c(to.to_str().unwrap()).as_ptr()),
            0
        );
        assert!(fsni_exists(c("saves/profile.bak").as_ptr(), CHECK_FILE as i32));
        assert_eq!(fsni_remove(c(to.to_str().unwrap()).as_ptr()), 0);
        assert_eq!(fsni_remove(c(to.to_str().unwrap()).as_ptr()), -1);
        assert!(fsni_exists(c("saves").as_ptr(), CHECK_DIRECTORY as i32));

        fsni_cleanup();
    }
}

#[test]
fn test_ffi_version_is_nul_terminated() {
    let version = unsafe { CStr::from_ptr(fsni_version()) };
    assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_every_entry_reads_to_declared_size() {
    let entries: Vec<(String, Vec<u8>)> = (0..12)
        .map(|i| (format!("assets/level{i}.dat"), key_map(i * 333 + 1)))
        .collect();
    let named: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(n, d)| (n.as_str(), d.as_slice()))
        .collect();
    let (persist, _bundle, zip_path) = setup_test_env(&named);
    let context = mount(persist.path(), &archive_path(&zip_path, "assets/"));

    let archive = context.archive().unwrap();
    assert_eq!(archive.index().len(), entries.len());
    for entry in archive.index().entries() {
        assert!(context.exists(entry.name(), CHECK_FILE));
        let id = context.open(entry.name(), OpenMode::Read, false).unwrap();
        assert_eq!(read_all(&context, id, 256).len() as u64, entry.size());
        assert!(context.close(id));
    }
}

#[test]
fn test_persistent_copy_shadows_archive() {
    let (persist, _bundle, zip_path) =
        setup_test_env(&[("assets/settings.xml", SETTINGS_XML)]);
    fs::write(persist.path().join("settings.xml"), b"<settings hot=\"1\"/>").unwrap();
    let context = mount(persist.path(), &archive_path(&zip_path, "assets/"));

    let id = context.open("settings.xml", OpenMode::Read, false).unwrap();
    assert_eq!(read_all(&context, id, 64), b"<settings hot=\"1\"/>");
    assert_eq!(context.size(id).unwrap(), 19);
}

#[test]
fn test_seek_end_then_start() {
    let (persist, _bundle, zip_path) = setup_test_env(&[("assets/a.bin", &key_map(500))]);
    fs::write(persist.path().join("b.bin"), key_map(300)).unwrap();
    let context = mount(persist.path(), &archive_path(&zip_path, "assets/"));

    for name in ["a.bin", "b.bin"] {
        let id = context.open(name, OpenMode::Read, false).unwrap();
        let end = context.seek(id, 0, SeekOrigin::End).unwrap();
        assert_eq!(context.seek(id, 0, SeekOrigin::Start).unwrap(), 0);
        assert_eq!(context.size(id).unwrap(), end);
        assert_eq!(read_all(&context, id, 64).len() as u64, end);
    }
}

#[test]
fn test_concurrent_archive_reads_match_sequential() {
    let entries: Vec<(String, Vec<u8>)> = (0..8)
        .map(|i| {
            let body: Vec<u8> = (0..4000 + i * 97).map(|b| (b * (i + 3)) as u8).collect();
            (format!("assets/chunk{i}.bin"), body)
        })
        .collect();
    let named: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(n, d)| (n.as_str(), d.as_slice()))
        .collect();
    let (persist, _bundle, zip_path) = setup_test_env(&named);
    let context = Arc::new(mount(persist.path(), &archive_path(&zip_path, "assets/")));

    let sequential: Vec<Vec<u8>> = (0..entries.len())
        .map(|i| {
            let id = context.open(&format!("chunk{i}.bin"), OpenMode::Read, false).unwrap();
            let bytes = read_all(&context, id, 4096);
            context.close(id);
            bytes
        })
        .collect();

    let workers: Vec<_> = (0..entries.len())
        .map(|i| {
            let context = Arc::clone(&context);
            thread::spawn(move || {
                let id = context.open(&format!("chunk{i}.bin"), OpenMode::Read, false).unwrap();
                let bytes = read_all(&context, id, 61 + i);
                context.close(id);
                bytes
            })
        })
        .collect();

    for (i, worker) in workers.into_iter().enumerate() {
        let bytes = worker.join().unwrap();
        assert_eq!(bytes, sequential[i]);
        assert_eq!(bytes, entries[i].1);
    }
    assert_eq!(context.open_streams(), 0);
}

#[test]
fn test_write_creates_missing_directories() {
    let persist = tempfile::tempdir().unwrap();
    let context = mount(persist.path(), "");

    let id = context.open("a/b/c/file.txt", OpenMode::Write, false).unwrap();
    assert_eq!(context.write(id, b"hello").unwrap(), 5);
    context.close(id);

    for dir in ["a", "a/b", "a/b/c"] {
        assert!(persist.path().join(dir).is_dir(), "{dir} should exist");
    }
    assert_eq!(fs::read(persist.path().join("a/b/c/file.txt")).unwrap(), b"hello");

    let id = context.open("a/b/c/file.txt", OpenMode::Append, false).unwrap();
    context.write(id, b", world").unwrap();
    context.close(id);
    assert_eq!(
        fs::read_to_string(persist.path().join("a/b/c/file.txt")).unwrap(),
        "hello, world"
    );
}

#[test]
fn test_streaming_directory_fallback() {
    let persist = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    fs::create_dir(bundle.path().join("lua")).unwrap();
    fs::write(bundle.path().join("lua/boot.lua"), b"require('main')").unwrap();
    let context = mount(persist.path(), bundle.path().to_str().unwrap());

    assert!(context.archive().is_none());
    assert!(context.exists("lua/boot.lua", CHECK_FILE));
    assert!(context.exists("lua", CHECK_DIRECTORY));
    let id = context.open("lua/boot.lua", OpenMode::Read, false).unwrap();
    assert_eq!(read_all(&context, id, 4), b"require('main')");
}

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_context_is_shareable_across_threads() {
    assert_send_sync::<MountContext>();
}
