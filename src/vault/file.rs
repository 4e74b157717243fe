//! Open-file handles for the vault.
//!
//! A handle shares the inode record and the sealed slot with every other
//! handle opened on the same path. The read/write offset is a lock-free
//! atomic; the directory-enumeration cursor has its own lock; the closed
//! flag makes the handle permanently inert once set.

use std::io;
use std::io::SeekFrom;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use crate::crypto::Sealer;
use crate::error::{FsError, Result};
use crate::fs::{Metadata, OpenFlags};
use crate::inode::{path, DirEntry, FileType, Inode};

use super::sealed::SealedFile;

/// Builds a metadata snapshot for `node` under its read lock.
pub(crate) fn metadata_of(name: &str, node: &Arc<Inode>) -> Metadata {
    let st = node.state.read().unwrap_or_else(PoisonError::into_inner);
    Metadata {
        name: name.to_string(),
        len: st.size,
        mode: st.mode,
        nlink: st.nlink,
        ino: node.ino,
        created: st.ctime,
        accessed: st.atime,
        modified: st.mtime,
    }
}

impl DirEntry {
    /// Metadata snapshot of the entry's inode.
    pub fn metadata(&self) -> Metadata {
        metadata_of(&self.name, &self.node)
    }

    pub fn is_dir(&self) -> bool {
        self.node.is_dir()
    }

    pub fn file_type(&self) -> FileType {
        self.node.file_type()
    }

    /// Inode number of the entry's target.
    pub fn ino(&self) -> u64 {
        self.node.ino
    }
}

/// An open file or directory inside the vault.
pub struct VaultFile {
    name: String,
    flags: OpenFlags,
    node: Arc<Inode>,
    data: Option<Arc<SealedFile>>,
    sealer: Arc<dyn Sealer>,
    offset: AtomicI64,
    dir_offset: Mutex<usize>,
    closed: AtomicBool,
}

impl std::fmt::Debug for VaultFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultFile")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("node", &self.node)
            .field("offset", &self.offset)
            .field("dir_offset", &self.dir_offset)
            .field("closed", &self.closed)
            .finish()
    }
}

impl VaultFile {
    pub(crate) fn new(
        name: &str,
        flags: OpenFlags,
        node: Arc<Inode>,
        data: Option<Arc<SealedFile>>,
        sealer: Arc<dyn Sealer>,
    ) -> Self {
        Self {
            name: name.to_string(),
            flags,
            node,
            data,
            sealer,
            offset: AtomicI64::new(0),
            dir_offset: Mutex::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_offset(&self, off: i64) {
        self.offset.store(off, Ordering::SeqCst);
    }

    /// The name the file was opened with. Not re-resolved on later calls.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Reads from the current offset, advancing it by the count returned.
    ///
    /// Returns `Ok(0)` at end of file; a count smaller than `buf.len()`
    /// means the remainder of the file was shorter than the buffer.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let n = self.read_inner(buf, self.offset.load(Ordering::SeqCst), "read")?;
        self.offset.fetch_add(n as i64, Ordering::SeqCst);
        Ok(n)
    }

    /// Reads at `off` without touching the handle offset.
    pub fn read_at(&self, buf: &mut [u8], off: i64) -> Result<usize> {
        self.read_inner(buf, off, "readat")
    }

    fn read_inner(&self, buf: &mut [u8], off: i64, op: &'static str) -> Result<usize> {
        if self.is_closed() {
            return Err(FsError::closed(op, &self.name));
        }
        if off < 0 {
            return Err(FsError::invalid_path(op, &self.name));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if self.flags.is_write_only() {
            return Err(FsError::permission_denied(op, &self.name));
        }
        if self.node.is_dir() {
            return Err(FsError::is_a_directory(op, &self.name));
        }

        let size = self.node.size();
        let off = off as u64;
        if size == 0 || off >= size {
            return Ok(0);
        }

        let data = self
            .data
            .as_ref()
            .ok_or_else(|| FsError::not_found(op, &self.name))?;
        let plaintext = data.plaintext(self.sealer.as_ref())?;

        // The size captured above may race a concurrent truncate; the
        // decrypted buffer's own length is authoritative.
        let off = off as usize;
        if off >= plaintext.len() {
            return Ok(0);
        }
        let n = buf.len().min(plaintext.len() - off);
        buf[..n].copy_from_slice(&plaintext[off..off + n]);

        Ok(n)
    }

    /// Writes at the current offset, advancing it by the count returned.
    /// Writing past the end zero-fills the gap.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let n = self.write_inner(buf, self.offset.load(Ordering::SeqCst), "write")?;
        self.offset.fetch_add(n as i64, Ordering::SeqCst);
        Ok(n)
    }

    /// Writes at `off` without touching the handle offset.
    ///
    /// Append-mode handles refuse positioned writes.
    pub fn write_at(&self, buf: &[u8], off: i64) -> Result<usize> {
        if self.flags.has(OpenFlags::APPEND) {
            return Err(FsError::permission_denied("writeat", &self.name));
        }
        self.write_inner(buf, off, "writeat")
    }

    fn write_inner(&self, buf: &[u8], off: i64, op: &'static str) -> Result<usize> {
        if self.is_closed() {
            return Err(FsError::closed(op, &self.name));
        }
        if off < 0 {
            return Err(FsError::invalid_path(op, &self.name));
        }
        if self.flags.is_read_only() {
            return Err(FsError::permission_denied(op, &self.name));
        }
        if self.node.is_dir() {
            return Err(FsError::is_a_directory(op, &self.name));
        }

        let data = self
            .data
            .as_ref()
            .ok_or_else(|| FsError::not_found(op, &self.name))?;

        // Inode write lock, then slot write lock inside splice.
        let mut st = self.node.state.write().map_err(|_| FsError::LockPoisoned)?;
        let new_size = data.splice(self.sealer.as_ref(), off as usize, buf)?;
        st.size = new_size;
        let now = SystemTime::now();
        st.atime = now;
        st.mtime = now;

        Ok(buf.len())
    }

    /// Repositions the handle offset, returning the new position.
    ///
    /// Seeking from the end may land past the current size; a later write
    /// zero-fills the gap.
    pub fn seek(&self, pos: SeekFrom) -> Result<u64> {
        if self.is_closed() {
            return Err(FsError::closed("seek", &self.name));
        }
        if self.node.is_dir() {
            return Err(FsError::is_a_directory("seek", &self.name));
        }

        match pos {
            SeekFrom::Start(offset) => {
                let offset = i64::try_from(offset)
                    .map_err(|_| FsError::invalid_path("seek", &self.name))?;
                self.offset.store(offset, Ordering::SeqCst);
                Ok(offset as u64)
            }
            SeekFrom::Current(delta) => {
                let prev = self
                    .offset
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                        cur.checked_add(delta).filter(|n| *n >= 0)
                    })
                    .map_err(|_| FsError::invalid_path("seek", &self.name))?;
                Ok((prev + delta) as u64)
            }
            SeekFrom::End(delta) => {
                let new = (self.node.size() as i64)
                    .checked_add(delta)
                    .filter(|n| *n >= 0)
                    .ok_or_else(|| FsError::invalid_path("seek", &self.name))?;
                self.offset.store(new, Ordering::SeqCst);
                Ok(new as u64)
            }
        }
    }

    /// Resizes the file to exactly `size` bytes, rekeying unless the size
    /// is unchanged.
    pub fn truncate(&self, size: u64) -> Result<()> {
        if self.is_closed() {
            return Err(FsError::closed("truncate", &self.name));
        }
        if self.flags.is_read_only() {
            return Err(FsError::permission_denied("truncate", &self.name));
        }
        if self.node.is_dir() {
            return Err(FsError::is_a_directory("truncate", &self.name));
        }

        let data = self
            .data
            .as_ref()
            .ok_or_else(|| FsError::not_found("truncate", &self.name))?;

        let mut st = self.node.state.write().map_err(|_| FsError::LockPoisoned)?;
        data.truncate(self.sealer.as_ref(), size as usize)?;
        st.size = size;
        let now = SystemTime::now();
        st.atime = now;
        st.mtime = now;

        Ok(())
    }

    /// Reads up to `n` directory entries, or all remaining if `n <= 0`.
    ///
    /// The first call on a fresh handle skips `"."` and `".."`, matching
    /// what callers of standard directory listings expect. The cursor
    /// advances by the number of entries returned.
    pub fn read_dir(&self, n: isize) -> Result<Vec<DirEntry>> {
        if self.is_closed() {
            return Err(FsError::closed("readdir", &self.name));
        }
        if self.flags.is_write_only() {
            return Err(FsError::permission_denied("readdir", &self.name));
        }
        if !self.node.is_dir() {
            return Err(FsError::not_a_directory("readdir", &self.name));
        }

        let mut cursor = self.dir_offset.lock().map_err(|_| FsError::LockPoisoned)?;
        let entries = self.node.entries()?;

        if *cursor == 0 {
            *cursor = 2.min(entries.len());
        }

        let remaining = entries.len().saturating_sub(*cursor);
        let take = if n <= 0 { remaining } else { remaining.min(n as usize) };

        let out = entries[*cursor..*cursor + take].to_vec();
        *cursor += take;

        Ok(out)
    }

    /// Metadata snapshot of the open file.
    pub fn stat(&self) -> Result<Metadata> {
        if self.is_closed() {
            return Err(FsError::closed("stat", &self.name));
        }
        Ok(metadata_of(path::base(&self.name), &self.node))
    }

    /// No-op for the vault: every write already committed to the sealed
    /// store before returning.
    pub fn sync(&self) -> Result<()> {
        if self.is_closed() {
            return Err(FsError::closed("sync", &self.name));
        }
        Ok(())
    }

    /// Closes the handle. Any later operation, including another close,
    /// fails with `Closed`.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(FsError::closed("close", &self.name));
        }
        Ok(())
    }
}

impl crate::fs::File for VaultFile {
    fn name(&self) -> &str {
        VaultFile::name(self)
    }

    fn read_at(&self, buf: &mut [u8], off: i64) -> Result<usize> {
        VaultFile::read_at(self, buf, off)
    }

    fn write_at(&self, buf: &[u8], off: i64) -> Result<usize> {
        VaultFile::write_at(self, buf, off)
    }

    fn stat(&self) -> Result<Metadata> {
        VaultFile::stat(self)
    }

    fn truncate(&self, size: u64) -> Result<()> {
        VaultFile::truncate(self, size)
    }

    fn read_dir(&self, n: isize) -> Result<Vec<Metadata>> {
        let entries = VaultFile::read_dir(self, n)?;
        Ok(entries.iter().map(DirEntry::metadata).collect())
    }

    fn sync(&self) -> Result<()> {
        VaultFile::sync(self)
    }

    fn close(&self) -> Result<()> {
        VaultFile::close(self)
    }
}

impl io::Read for VaultFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        VaultFile::read(self, buf).map_err(Into::into)
    }
}

impl io::Write for VaultFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        VaultFile::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        VaultFile::sync(self).map_err(Into::into)
    }
}

impl io::Seek for VaultFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        VaultFile::seek(self, pos).map_err(Into::into)
    }
}
