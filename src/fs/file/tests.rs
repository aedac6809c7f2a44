#![cfg(test)]

use std::fs;
use std::io::{IoSlice, IoSliceMut};

use libc::{O_APPEND, O_CREAT, O_EXCL, O_RDONLY, O_RDWR, O_TMPFILE, O_TRUNC, O_WRONLY};
use tempfile::TempDir;

use super::*;
use crate::fs::{Context, LockError, Origin, Resource};

fn temp_origin() -> (TempDir, Origin) {
    let temp = TempDir::new().expect("temp dir should be created");
    let origin = Context::new("file-tests")
        .resolved(temp.path(), true)
        .expect("temp dir should resolve");
    (temp, origin)
}

#[test]
fn test_open_flags() {
    assert_eq!(FileOptions::READ.open_flags(), O_RDONLY);
    assert_eq!(FileOptions::WRITE.open_flags(), O_WRONLY);
    assert_eq!((FileOptions::READ | FileOptions::WRITE).open_flags(), O_RDWR);
    assert_eq!(FileOptions::empty().open_flags(), O_RDONLY);
    assert_eq!(
        (FileOptions::WRITE | FileOptions::CREATE | FileOptions::EXCLUSIVE).open_flags(),
        O_WRONLY | O_CREAT | O_EXCL
    );
    assert_eq!(
        (FileOptions::WRITE | FileOptions::APPEND | FileOptions::TRUNCATE).open_flags(),
        O_WRONLY | O_APPEND | O_TRUNC
    );
    assert_eq!((FileOptions::READ | FileOptions::WRITE | FileOptions::TMPFILE).open_flags(), O_RDWR | O_TMPFILE);
}

#[test]
fn test_creation_mode() {
    assert_eq!(FileOptions::empty().creation_mode(), 0o600, "The owner can always read and write.");
    assert_eq!(FileOptions::EXECUTABLE.creation_mode(), 0o700);
    assert_eq!(FileOptions::GROUP.creation_mode(), 0o660);
    assert_eq!((FileOptions::GROUP | FileOptions::OTHERS).creation_mode(), 0o666);
    assert_eq!(
        (FileOptions::EXECUTABLE | FileOptions::GROUP | FileOptions::OTHERS).creation_mode(),
        0o777
    );
    assert_eq!((FileOptions::EXECUTABLE | FileOptions::OTHERS).creation_mode(), 0o707);
}

#[test]
fn test_create_exclusive() {
    let (_temp, origin) = temp_origin();
    let path = origin.path("once");
    let options = FileOptions::CREATE | FileOptions::EXCLUSIVE | FileOptions::WRITE;

    let file = File::open(&path, options).expect("first exclusive create should succeed");
    assert_eq!(file.write_some(b"hello", 0).expect("write should succeed"), 5);
    drop(file);

    let err = File::open(&path, options).expect_err("second exclusive create should fail");
    assert_eq!(err.code(), libc::EEXIST);
    assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);
}

#[test]
fn test_read_write_at_offsets() {
    let (temp, origin) = temp_origin();
    let file = File::open(
        &origin.path("data"),
        FileOptions::CREATE | FileOptions::READ | FileOptions::WRITE,
    )
    .expect("file should be created");

    assert_eq!(file.write_some(b"world", 6).expect("write should succeed"), 5);
    assert_eq!(file.write_some(b"hello ", 0).expect("write should succeed"), 6);
    assert_eq!(fs::read(temp.path().join("data")).expect("file should read"), b"hello world");

    let mut buf = [0_u8; 5];
    assert_eq!(file.read_some(&mut buf, 6).expect("read should succeed"), 5);
    assert_eq!(&buf, b"world");
    assert_eq!(file.read_some(&mut buf, 11).expect("read should succeed"), 0, "Reads at the end return nothing.");

    assert_eq!(file.read_to_end().expect("file should read"), b"hello world");
    assert_eq!(file.stat().expect("file should stat").size, 11);
}

#[test]
fn test_vectored_io() {
    let (_temp, origin) = temp_origin();
    let file = File::open(
        &origin.path("vectored"),
        FileOptions::CREATE | FileOptions::READ | FileOptions::WRITE,
    )
    .expect("file should be created");

    let written = file
        .write_some_vectored(&[IoSlice::new(b"abc"), IoSlice::new(b"defg")], 2)
        .expect("vectored write should succeed");
    assert_eq!(written, 7);

    let (mut first, mut second) = ([0_u8; 4], [0_u8; 5]);
    let read = file
        .read_some_vectored(&mut [IoSliceMut::new(&mut first), IoSliceMut::new(&mut second)], 0)
        .expect("vectored read should succeed");
    assert_eq!(read, 9);
    assert_eq!(&first, b"\0\0ab", "The gap before the write offset reads as zeroes.");
    assert_eq!(&second, b"cdefg");
}

#[test]
fn test_read_to_end_spans_chunks() {
    let (temp, origin) = temp_origin();
    let content: Vec<u8> = (0..20_000_u32).map(|i| (i % 251) as u8).collect();
    fs::write(temp.path().join("big"), &content).expect("file should be written");

    let file = File::open(&origin.path("big"), FileOptions::READ).expect("file should open");
    assert_eq!(file.read_to_end().expect("file should read"), content);
}

#[test]
fn test_truncate_and_fallocate() {
    let (_temp, origin) = temp_origin();
    let file = File::open(&origin.path("sized"), FileOptions::CREATE | FileOptions::WRITE)
        .expect("file should be created");

    file.posix_fallocate(0, 8192).expect("fallocate should succeed");
    assert_eq!(file.stat().expect("file should stat").size, 8192);
    file.truncate(100).expect("truncate should succeed");
    assert_eq!(file.stat().expect("file should stat").size, 100);
    file.posix_fadvise(0, 0, Advice::Sequential).expect("fadvise should succeed");
}

#[test]
fn test_lock_contention() {
    let (_temp, origin) = temp_origin();
    let path = origin.path("locked");
    let first = File::open(&path, FileOptions::CREATE | FileOptions::WRITE).expect("file should be created");
    let second = File::open(&path, FileOptions::READ).expect("file should open");

    let lock = first.acquire_lock(true, false).expect("first lock should succeed");
    assert!(lock.is_exclusive());
    let err = second.acquire_lock(true, false).expect_err("second lock should fail");
    assert!(matches!(err, LockError::Locked(_)), "Contention should be reported as locked: {}", err);
    assert!(
        second.acquire_lock(false, false).is_err(),
        "A shared lock conflicts with an exclusive one."
    );

    drop(lock);
    let shared = second.acquire_lock(false, false).expect("lock should succeed once released");
    assert!(!shared.is_exclusive());
    let also_shared = first.acquire_lock(false, false).expect("shared locks should coexist");
    drop(also_shared);
    drop(shared);
}

#[test]
fn test_channel_copies_beyond_pipe_capacity() {
    let (temp, origin) = temp_origin();
    let content: Vec<u8> = (0..200_000_u32).map(|i| (i % 253) as u8).collect();
    fs::write(temp.path().join("source"), &content).expect("file should be written");

    let source = File::open(&origin.path("source"), FileOptions::READ).expect("source should open");
    let target = File::open(&origin.path("target"), FileOptions::CREATE | FileOptions::WRITE)
        .expect("target should be created");
    let mut channel = target.make_channel().expect("channel should be created");

    let mut copied = 0;
    while copied < content.len() {
        let size = (content.len() - copied).min(1 << 16);
        let filled = channel.fill(&source, size, copied as libc::off_t).expect("fill should succeed");
        assert!(filled > 0, "The source still has data.");
        let mut drained = 0;
        while drained < filled {
            drained += channel
                .drain(filled - drained, (copied + drained) as libc::off_t)
                .expect("drain should succeed");
        }
        copied += filled;
    }

    assert_eq!(copied, content.len());
    assert_eq!(fs::read(temp.path().join("target")).expect("target should read"), content);
}

#[test]
fn test_try_clone_shares_file() {
    let (_temp, origin) = temp_origin();
    let file = File::open(&origin.path("shared"), FileOptions::CREATE | FileOptions::READ | FileOptions::WRITE)
        .expect("file should be created");
    let clone = file.try_clone().expect("file should clone");
    assert_ne!(clone.handle().get(), file.handle().get());

    clone.write_some(b"via clone", 0).expect("write should succeed");
    assert_eq!(file.read_to_end().expect("file should read"), b"via clone");
}

#[test]
fn test_linkto_names_tmpfile() {
    let (temp, origin) = temp_origin();
    let file = match File::open(
        &origin.path("."),
        FileOptions::TMPFILE | FileOptions::READ | FileOptions::WRITE,
    ) {
        Ok(file) => file,
        // Not every filesystem supports unnamed files.
        Err(err) if err.code() == libc::EOPNOTSUPP || err.code() == libc::EISDIR => return,
        Err(err) => panic!("tmpfile should be created: {}", err),
    };
    file.write_some(b"named later", 0).expect("write should succeed");
    assert!(fs::read_dir(temp.path()).expect("dir should read").next().is_none());

    file.linkto(&origin.path("linked")).expect("tmpfile should be linked");
    assert_eq!(fs::read(temp.path().join("linked")).expect("linked file should read"), b"named later");
}
