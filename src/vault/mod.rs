//! The encrypted in-memory filesystem.
//!
//! [`VaultFs`] owns the namespace: the root inode, the current working
//! directory, and the table mapping inode numbers to sealed-file slots.
//! File bodies exist only as authenticated ciphertext inside those slots;
//! see [`sealed`] for the rekey-on-mutation rules.
//!
//! A single reader/writer lock serializes namespace traversal against
//! mutation. Handles returned by [`VaultFs::open_file`] share the inode
//! and slot with every other handle on the same path, and stay usable
//! after the path is removed (unlink-while-open semantics).

pub(crate) mod file;
pub(crate) mod sealed;
mod stdfs;

pub use file::VaultFile;
pub use stdfs::StdView;

use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use tracing::debug;

use crate::crypto::{AesGcmSealer, Sealer};
use crate::error::{FsError, Result};
use crate::fs::{FileSystem, Metadata, OpenFlags};
use crate::inode::{path, DirEntry, Inode, InodeAllocator};

use file::metadata_of;
use sealed::SealedFile;

/// The encrypted in-memory virtual filesystem.
pub struct VaultFs {
    sealer: Arc<dyn Sealer>,
    alloc: InodeAllocator,
    root: Arc<Inode>,
    tempdir: String,
    state: RwLock<NsState>,
}

/// Namespace state behind the filesystem-wide lock.
struct NsState {
    cwd: String,
    dir: Arc<Inode>,
    slots: Vec<Option<Arc<SealedFile>>>,
}

impl NsState {
    fn slot(&self, ino: u64) -> Option<Arc<SealedFile>> {
        self.slots.get(ino as usize).cloned().flatten()
    }
}

impl VaultFs {
    /// Creates an empty vault using AES-256-GCM.
    pub fn new() -> Self {
        Self::with_sealer(Arc::new(AesGcmSealer::new()))
    }

    /// Creates an empty vault with a caller-supplied AEAD.
    pub fn with_sealer(sealer: Arc<dyn Sealer>) -> Self {
        let alloc = InodeAllocator::new();
        let root = alloc.new_dir(0o755);

        Self {
            sealer,
            alloc,
            tempdir: crate::config::TEMP_DIR.to_string(),
            state: RwLock::new(NsState {
                cwd: "/".to_string(),
                dir: Arc::clone(&root),
                // Index 0 is never allocated; the root holds no slot.
                slots: vec![None, None],
            }),
            root,
        }
    }

    /// Opens `name` read-only.
    pub fn open(&self, name: &str) -> Result<VaultFile> {
        self.open_file(name, OpenFlags::RDONLY, 0)
    }

    /// Creates or truncates `name` read-write with mode `0o644`.
    pub fn create(&self, name: &str) -> Result<VaultFile> {
        self.open_file(
            name,
            OpenFlags::CREATE | OpenFlags::RDWR | OpenFlags::TRUNC,
            0o644,
        )
    }

    /// Opens `name` with the given flags; `perm` applies when the call
    /// creates the file.
    pub fn open_file(&self, name: &str, flags: OpenFlags, perm: u32) -> Result<VaultFile> {
        if name == "/" {
            let st = self.state.read().map_err(|_| FsError::LockPoisoned)?;
            let slot = st.slot(self.root.ino);
            return Ok(VaultFile::new(
                name,
                flags,
                Arc::clone(&self.root),
                slot,
                Arc::clone(&self.sealer),
            ));
        }

        if !path::is_valid(name) {
            return Err(FsError::invalid_path("open", name));
        }

        if name == "." {
            let (node, slot) = {
                let st = self.state.read().map_err(|_| FsError::LockPoisoned)?;
                (Arc::clone(&st.dir), st.slot(st.dir.ino))
            };
            let file = VaultFile::new(name, flags, Arc::clone(&node), slot, Arc::clone(&self.sealer));
            if flags.has(OpenFlags::APPEND) {
                file.set_offset(node.size() as i64);
            }
            return Ok(file);
        }

        let mut st = self.state.write().map_err(|_| FsError::LockPoisoned)?;

        let wd = if path::is_abs(name) {
            Arc::clone(&self.root)
        } else {
            Arc::clone(&st.dir)
        };

        let existing = wd.resolve(name).ok();

        let (dirname, basename) = path::split(name);
        let dirname = path::clean(dirname);
        let parent = wd
            .resolve(&dirname)
            .map_err(|e| e.with_context("open", name))?;

        let node = match existing {
            Some(node) => {
                if flags.has(OpenFlags::CREATE) && flags.has(OpenFlags::EXCL) {
                    return Err(FsError::already_exists("open", name));
                }
                if node.is_dir() && (!flags.is_read_only() || flags.has(OpenFlags::TRUNC)) {
                    return Err(FsError::is_a_directory("open", name));
                }
                node
            }
            None => {
                if !flags.has(OpenFlags::CREATE) {
                    return Err(FsError::not_found("open", name));
                }

                let node = self.alloc.new_file(perm);
                if let Err(e) = parent.link(basename, &node) {
                    self.alloc.rollback();
                    return Err(e.with_context("open", name));
                }

                debug_assert_eq!(st.slots.len() as u64, node.ino);
                st.slots.push(Some(Arc::new(SealedFile::new())));
                debug!(path = name, ino = node.ino, "created file");
                node
            }
        };

        let slot = st.slot(node.ino);
        let file = VaultFile::new(name, flags, Arc::clone(&node), slot, Arc::clone(&self.sealer));

        if flags.has(OpenFlags::TRUNC) {
            file.truncate(0).map_err(|e| e.with_context("open", name))?;
        }
        if flags.has(OpenFlags::APPEND) {
            file.set_offset(node.size() as i64);
        }

        Ok(file)
    }

    /// Reads the whole file at `name`, failing `UnexpectedEof` if the
    /// body comes up short of the recorded size.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let file = self.open(name)?;

        let size = file.stat()?.len();
        let mut data = vec![0u8; size as usize];
        let n = file.read(&mut data)?;

        let result = if n < data.len() {
            Err(FsError::UnexpectedEof)
        } else {
            Ok(data)
        };
        file.close()?;
        result
    }

    /// Writes `data` as the entire contents of `name`.
    pub fn write_file(&self, name: &str, data: &[u8], perm: u32) -> Result<()> {
        let file = self.open_file(
            name,
            OpenFlags::WRONLY | OpenFlags::CREATE | OpenFlags::TRUNC,
            perm,
        )?;

        let n = file.write(data)?;
        let result = if n < data.len() {
            Err(FsError::ShortWrite)
        } else {
            Ok(())
        };
        file.close()?;
        result
    }

    /// Lists the directory at `name`, without `"."`/`".."`, in name order.
    pub fn read_dir(&self, name: &str) -> Result<Vec<DirEntry>> {
        let file = self.open(name)?;
        let entries = file.read_dir(-1)?;
        file.close()?;
        Ok(entries)
    }

    /// Creates the directory `name` with permission `perm`.
    pub fn mkdir(&self, name: &str, perm: u32) -> Result<()> {
        let mut st = self.state.write().map_err(|_| FsError::LockPoisoned)?;
        self.mkdir_locked(&mut st, name, perm)
    }

    fn mkdir_locked(&self, st: &mut NsState, name: &str, perm: u32) -> Result<()> {
        if !path::is_valid(name) {
            return Err(FsError::invalid_path("mkdir", name));
        }

        let wd = if path::is_abs(name) {
            Arc::clone(&self.root)
        } else {
            Arc::clone(&st.dir)
        };
        let abs = path::abs(&st.cwd, name);

        if wd.resolve(name).is_ok() {
            return Err(FsError::already_exists("mkdir", name));
        }

        let (dirname, basename) = path::split(&abs);
        let parent = self
            .root
            .resolve(&path::clean(dirname))
            .map_err(|e| e.with_context("mkdir", name))?;

        let child = self.alloc.new_dir(perm);
        if let Err(e) = parent.link(basename, &child) {
            self.alloc.rollback();
            return Err(e.with_context("mkdir", name));
        }
        child
            .link("..", &parent)
            .map_err(|e| e.with_context("mkdir", name))?;

        debug_assert_eq!(st.slots.len() as u64, child.ino);
        st.slots.push(None);
        debug!(path = name, ino = child.ino, "created directory");

        Ok(())
    }

    /// Creates `name` and any missing parents, tolerating components that
    /// already exist.
    pub fn mkdir_all(&self, name: &str, perm: u32) -> Result<()> {
        let mut st = self.state.write().map_err(|_| FsError::LockPoisoned)?;
        let abs = path::abs(&st.cwd, name);

        let mut dirpath = String::new();
        for comp in abs.split(crate::config::PATH_SEPARATOR) {
            let comp = if comp.is_empty() { "/" } else { comp };
            dirpath = path::join(&[&dirpath, comp]);

            match self.mkdir_locked(&mut st, &dirpath, perm) {
                Err(e) if e.is_already_exists() => {}
                other => other?,
            }
        }

        Ok(())
    }

    /// Removes a file or an empty directory.
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut st = self.state.write().map_err(|_| FsError::LockPoisoned)?;

        let wd = if path::is_abs(name) {
            Arc::clone(&self.root)
        } else {
            Arc::clone(&st.dir)
        };
        let abs = path::abs(&st.cwd, name);

        let child = wd
            .resolve(name)
            .map_err(|e| e.with_context("remove", name))?;
        if child.is_dir() && child.entries()?.len() > 2 {
            return Err(FsError::DirectoryNotEmpty { op: "remove", path: name.to_string() });
        }

        let (dirname, basename) = path::split(&abs);
        let parent = self
            .root
            .resolve(&path::clean(dirname))
            .map_err(|e| e.with_context("remove", name))?;

        parent
            .unlink(basename)
            .map_err(|e| e.with_context("remove", name))?;

        if child.is_dir() {
            // Break the "." and ".." cycles so the orphaned inode drops.
            child.unlink_all()?;
        } else if let Some(slot) = st.slots.get_mut(child.ino as usize) {
            *slot = None;
        }

        debug!(path = name, ino = child.ino, "removed");
        Ok(())
    }

    /// Removes `name` and everything beneath it. No permission checks.
    pub fn remove_all(&self, name: &str) -> Result<()> {
        let mut st = self.state.write().map_err(|_| FsError::LockPoisoned)?;

        let wd = if path::is_abs(name) {
            Arc::clone(&self.root)
        } else {
            Arc::clone(&st.dir)
        };
        let abs = path::abs(&st.cwd, name);

        let child = wd
            .resolve(name)
            .map_err(|e| e.with_context("remove", name))?;

        let (dirname, basename) = path::split(&abs);
        let parent = self
            .root
            .resolve(&path::clean(dirname))
            .map_err(|e| e.with_context("remove", name))?;

        child.unlink_all()?;
        parent
            .unlink(basename)
            .map_err(|e| e.with_context("remove", name))?;

        if let Some(slot) = st.slots.get_mut(child.ino as usize) {
            *slot = None;
        }

        debug!(path = name, ino = child.ino, "removed tree");
        Ok(())
    }

    /// Moves `oldpath` to `newpath`. The root cannot be renamed. Either
    /// the move fully succeeds or both paths are unchanged.
    pub fn rename(&self, oldpath: &str, newpath: &str) -> Result<()> {
        let link_err = |source: FsError| FsError::Rename {
            old: oldpath.to_string(),
            new: newpath.to_string(),
            source: Box::new(source),
        };

        if oldpath == "/" {
            return Err(link_err(FsError::invalid_path("rename", oldpath)));
        }

        let st = self.state.write().map_err(|_| FsError::LockPoisoned)?;
        let old_abs = path::abs(&st.cwd, oldpath);
        let new_abs = path::abs(&st.cwd, newpath);

        self.root
            .rename(&old_abs, &new_abs)
            .map_err(link_err)?;

        debug!(from = oldpath, to = newpath, "renamed");
        Ok(())
    }

    /// Metadata for the inode at `name`.
    pub fn stat(&self, name: &str) -> Result<Metadata> {
        if name == "/" {
            return Ok(metadata_of("/", &self.root));
        }

        let st = self.state.read().map_err(|_| FsError::LockPoisoned)?;
        let abs = path::abs(&st.cwd, name);
        let node = self
            .root
            .resolve(&abs)
            .map_err(|e| e.with_context("stat", name))?;

        Ok(metadata_of(path::base(name), &node))
    }

    /// Like [`stat`](Self::stat); symlinks are plain entries here, so the
    /// two agree.
    pub fn lstat(&self, name: &str) -> Result<Metadata> {
        self.stat(name)
    }

    /// Resizes the file at `name` to exactly `size` bytes.
    pub fn truncate(&self, name: &str, size: u64) -> Result<()> {
        let (node, slot) = {
            let st = self.state.read().map_err(|_| FsError::LockPoisoned)?;
            let abs = path::abs(&st.cwd, name);
            let node = self
                .root
                .resolve(&abs)
                .map_err(|e| e.with_context("truncate", name))?;
            let slot = st.slot(node.ino);
            (node, slot)
        };

        let file = VaultFile::new(name, OpenFlags::WRONLY, node, slot, Arc::clone(&self.sealer));
        file.truncate(size)
    }

    /// Replaces the permission bits of the inode at `name`.
    pub fn chmod(&self, name: &str, perm: u32) -> Result<()> {
        let node = self.resolve_for("chmod", name)?;
        let mut st = node.state.write().map_err(|_| FsError::LockPoisoned)?;
        st.mode = st.mode.with_perm(perm);
        st.ctime = SystemTime::now();
        Ok(())
    }

    /// Sets access and modification times of the inode at `name`.
    pub fn chtimes(&self, name: &str, atime: SystemTime, mtime: SystemTime) -> Result<()> {
        let node = self.resolve_for("chtimes", name)?;
        let mut st = node.state.write().map_err(|_| FsError::LockPoisoned)?;
        st.atime = atime;
        st.mtime = mtime;
        Ok(())
    }

    fn resolve_for(&self, op: &'static str, name: &str) -> Result<Arc<Inode>> {
        let st = self.state.read().map_err(|_| FsError::LockPoisoned)?;
        let abs = path::abs(&st.cwd, name);
        self.root.resolve(&abs).map_err(|e| e.with_context(op, name))
    }

    /// Changes the working directory. `cwd` stays absolute and lexically
    /// clean, and always resolves to the directory it names.
    pub fn chdir(&self, name: &str) -> Result<()> {
        let mut st = self.state.write().map_err(|_| FsError::LockPoisoned)?;

        if name == "/" {
            st.cwd = "/".to_string();
            st.dir = Arc::clone(&self.root);
            return Ok(());
        }

        let wd = if path::is_abs(name) {
            Arc::clone(&self.root)
        } else {
            Arc::clone(&st.dir)
        };

        let node = wd.resolve(name).map_err(|e| e.with_context("chdir", name))?;
        if !node.is_dir() {
            return Err(FsError::not_a_directory("chdir", name));
        }

        st.cwd = path::abs(&st.cwd, name);
        st.dir = node;

        Ok(())
    }

    /// The current working directory, absolute and clean.
    pub fn getwd(&self) -> Result<String> {
        let st = self.state.read().map_err(|_| FsError::LockPoisoned)?;
        Ok(st.cwd.clone())
    }

    /// The reserved temporary-directory path.
    pub fn temp_dir(&self) -> String {
        self.tempdir.clone()
    }

    /// Absolute, cleaned form of `p`, joined against the working directory
    /// when relative.
    pub fn abs(&self, p: &str) -> Result<String> {
        if path::is_abs(p) {
            return Ok(path::clean(p));
        }
        let st = self.state.read().map_err(|_| FsError::LockPoisoned)?;
        Ok(path::join(&[&st.cwd, p]))
    }

    /// Read-only view of the vault obeying the no-leading-slash convention
    /// of standard directory walkers.
    pub fn std_view(&self) -> StdView<'_> {
        StdView::new(self)
    }

    /// Visits `root` and everything beneath it in pre-order, entries in
    /// name order. A `"/"` root is walked as `"."` per the standard-FS
    /// convention.
    pub fn walk_dir<F>(&self, root: &str, visit: F) -> Result<()>
    where
        F: FnMut(&str, &DirEntry) -> Result<()>,
    {
        self.std_view().walk_dir_from(root, visit)
    }
}

impl Default for VaultFs {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for VaultFs {
    fn drop(&mut self) {
        // "." and ".." entries make the inode graph cyclic; empty every
        // directory so the Arc graph can actually drop.
        let _ = self.root.unlink_all();
    }
}

impl FileSystem for VaultFs {
    type File = VaultFile;

    fn open_file(&self, name: &str, flags: OpenFlags, perm: u32) -> Result<VaultFile> {
        VaultFs::open_file(self, name, flags, perm)
    }

    fn mkdir(&self, name: &str, perm: u32) -> Result<()> {
        VaultFs::mkdir(self, name, perm)
    }

    fn mkdir_all(&self, name: &str, perm: u32) -> Result<()> {
        VaultFs::mkdir_all(self, name, perm)
    }

    fn remove(&self, name: &str) -> Result<()> {
        VaultFs::remove(self, name)
    }

    fn remove_all(&self, name: &str) -> Result<()> {
        VaultFs::remove_all(self, name)
    }

    fn rename(&self, oldpath: &str, newpath: &str) -> Result<()> {
        VaultFs::rename(self, oldpath, newpath)
    }

    fn stat(&self, name: &str) -> Result<Metadata> {
        VaultFs::stat(self, name)
    }

    fn lstat(&self, name: &str) -> Result<Metadata> {
        VaultFs::lstat(self, name)
    }

    fn truncate(&self, name: &str, size: u64) -> Result<()> {
        VaultFs::truncate(self, name, size)
    }

    fn chmod(&self, name: &str, perm: u32) -> Result<()> {
        VaultFs::chmod(self, name, perm)
    }

    fn chtimes(&self, name: &str, atime: SystemTime, mtime: SystemTime) -> Result<()> {
        VaultFs::chtimes(self, name, atime, mtime)
    }

    fn chdir(&self, name: &str) -> Result<()> {
        VaultFs::chdir(self, name)
    }

    fn getwd(&self) -> Result<String> {
        VaultFs::getwd(self)
    }

    fn temp_dir(&self) -> String {
        VaultFs::temp_dir(self)
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        VaultFs::read_file(self, name)
    }

    fn write_file(&self, name: &str, data: &[u8], perm: u32) -> Result<()> {
        VaultFs::write_file(self, name, data, perm)
    }
}
