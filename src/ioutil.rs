//! Convenience I/O helpers generic over any [`FileSystem`].

use std::io::Read;

use rand::Rng;

use crate::error::{FsError, Result};
use crate::fs::{FileSystem, OpenFlags};

/// Number of name-collision retries before temp-file creation gives up.
const TEMP_RETRIES: u32 = 10_000;

/// Reads a reader to its end.
pub fn read_all(r: &mut impl Read) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    r.read_to_end(&mut data)?;
    Ok(data)
}

fn temp_name(dir: &str, prefix: &str) -> String {
    let n: u32 = rand::rng().random();
    let dir = dir.trim_end_matches('/');
    format!("{dir}/{prefix}{n}")
}

/// Creates a uniquely named file under `dir` (the filesystem's temp
/// directory if `dir` is empty), opened read-write with mode `0o600`.
///
/// The caller owns removing the file when done with it.
pub fn temp_file<F: FileSystem>(fs: &F, dir: &str, prefix: &str) -> Result<F::File> {
    let dir = if dir.is_empty() { fs.temp_dir() } else { dir.to_string() };

    for _ in 0..TEMP_RETRIES {
        let name = temp_name(&dir, prefix);
        match fs.open_file(
            &name,
            OpenFlags::RDWR | OpenFlags::CREATE | OpenFlags::EXCL,
            0o600,
        ) {
            Err(e) if e.is_already_exists() => continue,
            other => return other,
        }
    }

    Err(FsError::already_exists("tempfile", format!("{dir}/{prefix}*")))
}

/// Creates a uniquely named directory under `dir` (the filesystem's temp
/// directory if `dir` is empty) with mode `0o700`, returning its path.
pub fn temp_dir<F: FileSystem>(fs: &F, dir: &str, prefix: &str) -> Result<String> {
    let dir = if dir.is_empty() { fs.temp_dir() } else { dir.to_string() };

    for _ in 0..TEMP_RETRIES {
        let name = temp_name(&dir, prefix);
        match fs.mkdir(&name, 0o700) {
            Err(e) if e.is_already_exists() => continue,
            Err(e) => return Err(e),
            Ok(()) => return Ok(name),
        }
    }

    Err(FsError::already_exists("tempdir", format!("{dir}/{prefix}*")))
}
