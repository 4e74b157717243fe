//! End-to-end scenarios for the encrypted vault.

use std::io::SeekFrom;

use sealbox::{FsError, OpenFlags, VaultFs};

#[test]
fn write_seek_read_full() {
    let fs = VaultFs::new();

    let file = fs.create("/readme.txt").unwrap();
    file.write(b"1....2....3....4").unwrap();
    file.write(b"abcdefghijklmnop").unwrap();

    file.seek(SeekFrom::Start(0)).unwrap();
    let mut buf = [0u8; 32];
    let n = file.read(&mut buf).unwrap();

    assert_eq!(n, 32);
    assert_eq!(&buf[..], b"1....2....3....4abcdefghijklmnop".as_slice());
    file.close().unwrap();
}

#[test]
fn write_on_read_only_handle() {
    let fs = VaultFs::new();

    let file = fs
        .open_file("/x", OpenFlags::CREATE | OpenFlags::RDONLY, 0o666)
        .unwrap();
    let err = file.write(b"hi").unwrap_err();
    assert!(err.is_permission_denied());
    file.close().unwrap();

    assert_eq!(fs.stat("/x").unwrap().len(), 0);
}

#[test]
fn append_across_reopen() {
    let fs = VaultFs::new();

    let file = fs
        .open_file(
            "/x",
            OpenFlags::CREATE | OpenFlags::APPEND | OpenFlags::RDWR,
            0o666,
        )
        .unwrap();
    file.write(b"new").unwrap();
    file.close().unwrap();

    let file = fs
        .open_file("/x", OpenFlags::APPEND | OpenFlags::RDWR, 0o666)
        .unwrap();
    file.write(b"|append").unwrap();
    file.close().unwrap();

    assert_eq!(fs.read_file("/x").unwrap(), b"new|append");
}

#[test]
fn truncate_shrink_then_extend() {
    let fs = VaultFs::new();

    let file = fs.create("/f").unwrap();
    file.write(b"hello, world\n").unwrap();
    file.truncate(10).unwrap();
    file.close().unwrap();

    assert_eq!(fs.stat("/f").unwrap().len(), 10);
    assert_eq!(fs.read_file("/f").unwrap(), b"hello, wor");

    fs.truncate("/f", 1024).unwrap();
    assert_eq!(fs.stat("/f").unwrap().len(), 1024);

    let data = fs.read_file("/f").unwrap();
    assert_eq!(&data[..10], b"hello, wor");
    assert!(data[10..].iter().all(|&b| b == 0), "extension must zero-fill");
}

#[test]
fn remove_directory_bottom_up() {
    let fs = VaultFs::new();

    fs.mkdir("/a", 0o755).unwrap();
    fs.mkdir("/a/b", 0o755).unwrap();

    let err = fs.remove("/a").unwrap_err();
    assert!(err.to_string().contains("directory not empty"));

    fs.remove("/a/b").unwrap();
    fs.remove("/a").unwrap();
    assert!(fs.stat("/a").unwrap_err().is_not_found());
}

#[test]
fn rename_replaces_destination_file() {
    let fs = VaultFs::new();

    fs.create("/from").unwrap().close().unwrap();
    fs.write_file("/from", b"from", 0o644).unwrap();
    fs.write_file("/to", b"to", 0o644).unwrap();

    fs.rename("/from", "/to").unwrap();
    assert!(fs.stat("/from").unwrap_err().is_not_found());
    assert_eq!(fs.read_file("/to").unwrap(), b"from");
}

#[test]
fn roundtrip_arbitrary_bytes() {
    let fs = VaultFs::new();

    for (i, body) in [
        b"".as_slice(),
        b"a",
        b"hello world",
        &[0u8; 1024],
        &[0xFF; 4096],
    ]
    .iter()
    .enumerate()
    {
        let path = format!("/file-{i}");
        let file = fs.create(&path).unwrap();
        file.write(body).unwrap();
        file.close().unwrap();

        let file = fs.open(&path).unwrap();
        let mut back = vec![0u8; body.len() + 7];
        let n = file.read(&mut back).unwrap();
        assert_eq!(&back[..n], *body);
        file.close().unwrap();
    }
}

#[test]
fn positional_write_zero_fills_gap() {
    let fs = VaultFs::new();

    let file = fs.create("/sparse").unwrap();
    file.write_at(b"tail", 5).unwrap();

    let mut buf = [0u8; 16];
    let n = file.read_at(&mut buf, 0).unwrap();
    assert_eq!(n, 9);
    assert_eq!(&buf[..n], b"\0\0\0\0\0tail");

    // The handle offset never moved.
    let mut from_start = [0u8; 3];
    file.read(&mut from_start).unwrap();
    assert_eq!(&from_start, b"\0\0\0");
    file.close().unwrap();
}

#[test]
fn positioned_write_refused_in_append_mode() {
    let fs = VaultFs::new();

    let file = fs
        .open_file(
            "/log",
            OpenFlags::CREATE | OpenFlags::APPEND | OpenFlags::RDWR,
            0o644,
        )
        .unwrap();
    file.write(b"entry").unwrap();

    let err = file.write_at(b"x", 0).unwrap_err();
    assert!(err.is_permission_denied());
    file.close().unwrap();
}

#[test]
fn read_at_end_returns_zero() {
    let fs = VaultFs::new();

    fs.write_file("/f", b"1234", 0o644).unwrap();
    let file = fs.open("/f").unwrap();

    let mut buf = [0u8; 8];
    assert_eq!(file.read_at(&mut buf, 4).unwrap(), 0);
    assert_eq!(file.read_at(&mut buf, 99).unwrap(), 0);

    // Zero-length destination reads zero bytes at any offset.
    let mut empty = [0u8; 0];
    assert_eq!(file.read_at(&mut empty, 0).unwrap(), 0);
    file.close().unwrap();
}

#[test]
fn closed_handle_is_inert() {
    let fs = VaultFs::new();

    let file = fs.create("/f").unwrap();
    file.write(b"once").unwrap();
    file.close().unwrap();

    let mut buf = [0u8; 4];
    assert!(file.read(&mut buf).unwrap_err().is_closed());
    assert!(file.write(b"again").unwrap_err().is_closed());
    assert!(file.seek(SeekFrom::Start(0)).unwrap_err().is_closed());
    assert!(file.truncate(0).unwrap_err().is_closed());
    assert!(file.stat().unwrap_err().is_closed());
    assert!(file.sync().unwrap_err().is_closed());
    assert!(file.close().unwrap_err().is_closed());

    // The file itself is untouched.
    assert_eq!(fs.read_file("/f").unwrap(), b"once");
}

#[test]
fn directory_identity_through_dot_entries() {
    let fs = VaultFs::new();

    fs.mkdir_all("/a/b", 0o755).unwrap();

    let root = fs.stat("/").unwrap();
    let a = fs.stat("/a").unwrap();
    let b = fs.stat("/a/b").unwrap();

    assert_eq!(fs.stat("/a/.").unwrap().ino(), a.ino());
    assert_eq!(fs.stat("/a/..").unwrap().ino(), root.ino());
    assert_eq!(fs.stat("/a/b/..").unwrap().ino(), a.ino());
    assert_eq!(fs.stat("/..").unwrap().ino(), root.ino());
    assert_eq!(fs.stat("/a/b/../..").unwrap().ino(), root.ino());
    assert_ne!(b.ino(), a.ino());
}

#[test]
fn readdir_batches_and_cursor() {
    let fs = VaultFs::new();

    for name in ["c", "a", "d", "b"] {
        fs.create(&format!("/{name}")).unwrap().close().unwrap();
    }

    let dir = fs.open("/").unwrap();
    let first = dir.read_dir(3).unwrap();
    let names: Vec<&str> = first.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "c"]);

    let rest = dir.read_dir(3).unwrap();
    let names: Vec<&str> = rest.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["d"]);

    assert!(dir.read_dir(3).unwrap().is_empty());
    dir.close().unwrap();
}

#[test]
fn readdir_on_write_only_handle() {
    let fs = VaultFs::new();

    let dir = fs.open("/").unwrap();
    let all = dir.read_dir(-1).unwrap();
    assert!(all.is_empty());
    dir.close().unwrap();

    let dir = fs.open_file("/", OpenFlags::WRONLY, 0).unwrap();
    assert!(dir.read_dir(-1).unwrap_err().is_permission_denied());
    dir.close().unwrap();

    let file = fs.create("/f").unwrap();
    let err = file.read_dir(-1).unwrap_err();
    assert!(matches!(err, FsError::NotADirectory { .. }));
    file.close().unwrap();
}

#[test]
fn seek_whence_matrix() {
    let fs = VaultFs::new();

    fs.write_file("/f", b"0123456789", 0o644).unwrap();
    let file = fs.open_file("/f", OpenFlags::RDWR, 0).unwrap();

    assert_eq!(file.seek(SeekFrom::Start(4)).unwrap(), 4);
    assert_eq!(file.seek(SeekFrom::Current(3)).unwrap(), 7);
    assert_eq!(file.seek(SeekFrom::Current(-5)).unwrap(), 2);
    assert_eq!(file.seek(SeekFrom::End(-4)).unwrap(), 6);
    assert_eq!(file.seek(SeekFrom::End(6)).unwrap(), 16);

    // Writing at the past-the-end position zero-fills the gap.
    file.write(b"!").unwrap();
    let data = fs.read_file("/f").unwrap();
    assert_eq!(data.len(), 17);
    assert_eq!(&data[..10], b"0123456789");
    assert!(data[10..16].iter().all(|&b| b == 0));
    assert_eq!(data[16], b'!');

    assert!(matches!(
        file.seek(SeekFrom::Current(-100)).unwrap_err(),
        FsError::InvalidPath { .. }
    ));
    file.close().unwrap();
}

#[test]
fn rename_is_atomic_on_failure() {
    let fs = VaultFs::new();

    fs.mkdir("/src", 0o755).unwrap();
    fs.mkdir("/dst", 0o755).unwrap();
    fs.write_file("/src/f", b"payload", 0o644).unwrap();

    // Directory over directory is refused and nothing moves.
    let err = fs.rename("/src", "/dst").unwrap_err();
    assert!(matches!(err, FsError::Rename { .. }));
    assert!(fs.stat("/src").unwrap().is_dir());
    assert!(fs.stat("/dst").unwrap().is_dir());
    assert_eq!(fs.read_file("/src/f").unwrap(), b"payload");

    // Moving a file into an existing directory keeps its base name.
    fs.rename("/src/f", "/dst").unwrap();
    assert!(fs.stat("/src/f").unwrap_err().is_not_found());
    assert_eq!(fs.read_file("/dst/f").unwrap(), b"payload");
}

#[test]
fn sizes_track_content() {
    let fs = VaultFs::new();

    let file = fs.create("/grow").unwrap();
    assert_eq!(file.stat().unwrap().len(), 0);

    file.write(b"12345").unwrap();
    assert_eq!(file.stat().unwrap().len(), 5);

    file.write_at(b"xyz", 10).unwrap();
    assert_eq!(file.stat().unwrap().len(), 13);

    file.truncate(2).unwrap();
    assert_eq!(file.stat().unwrap().len(), 2);
    file.close().unwrap();

    assert_eq!(fs.stat("/grow").unwrap().len(), 2);
}
