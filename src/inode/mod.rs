//! The in-memory inode graph: metadata records, sorted directory entries,
//! and the namespace primitives (link/unlink/resolve/rename) the vault is
//! built on.
//!
//! Directories hold their entries as a vector sorted by byte value, so
//! lookup is a binary search and enumeration is deterministic. Every
//! directory carries `"."` and `".."` as ordinary entries; cycles they
//! introduce are broken during [`Inode::unlink_all`], which treats `".."`
//! and self-links as non-owning.

pub mod mode;
pub mod path;

pub use mode::{FileMode, FileType};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use crate::error::{FsError, Result};

/// The basic metadata of a file or directory.
///
/// The inode number and the file type never change after allocation;
/// everything else lives behind the per-inode lock.
#[derive(Debug)]
pub struct Inode {
    /// Unique inode number, assigned by the allocator.
    pub ino: u64,
    ftype: FileType,
    pub(crate) state: RwLock<InodeState>,
}

/// Mutable inode metadata, guarded by the inode lock.
#[derive(Debug)]
pub(crate) struct InodeState {
    pub(crate) mode: FileMode,
    pub(crate) nlink: u64,
    pub(crate) size: u64,
    pub(crate) ctime: SystemTime,
    pub(crate) atime: SystemTime,
    pub(crate) mtime: SystemTime,
    pub(crate) dir: Vec<DirEntry>,
}

/// One directory entry: a name bound to an inode.
#[derive(Clone, Debug)]
pub struct DirEntry {
    pub name: String,
    pub node: Arc<Inode>,
}

impl InodeState {
    fn accessed(&mut self) {
        self.atime = SystemTime::now();
    }

    fn modified(&mut self) {
        let now = SystemTime::now();
        self.atime = now;
        self.mtime = now;
    }
}

/// Locates `name` in a sorted entry vector.
fn find(dir: &[DirEntry], name: &str) -> std::result::Result<usize, usize> {
    dir.binary_search_by(|e| e.name.as_str().cmp(name))
}

impl Inode {
    fn new(ino: u64, mode: FileMode) -> Arc<Self> {
        let now = SystemTime::now();
        Arc::new(Self {
            ino,
            ftype: mode.file_type(),
            state: RwLock::new(InodeState {
                mode,
                nlink: 0,
                size: 0,
                ctime: now,
                atime: now,
                mtime: now,
                dir: Vec::new(),
            }),
        })
    }

    pub fn is_dir(&self) -> bool {
        self.ftype == FileType::Directory
    }

    pub fn file_type(&self) -> FileType {
        self.ftype
    }

    /// Current plaintext size in bytes (0 for directories).
    pub fn size(&self) -> u64 {
        self.state.read().unwrap_or_else(PoisonError::into_inner).size
    }

    /// Current link count.
    pub fn nlink(&self) -> u64 {
        self.state.read().unwrap_or_else(PoisonError::into_inner).nlink
    }

    /// Current mode bits.
    pub fn mode(&self) -> FileMode {
        self.state.read().unwrap_or_else(PoisonError::into_inner).mode
    }

    fn count_up(&self) {
        let mut st = self.state.write().unwrap_or_else(PoisonError::into_inner);
        st.nlink += 1;
        st.accessed();
    }

    fn count_down(&self) {
        let mut st = self.state.write().unwrap_or_else(PoisonError::into_inner);
        assert!(st.nlink > 0, "inode {}: negative link count", self.ino);
        st.nlink -= 1;
        st.accessed();
    }

    /// Adds a directory entry binding `name` to `child`.
    ///
    /// An existing entry with the same name is replaced; the previous
    /// target's link count drops and the new target's rises. Entries stay
    /// sorted by name.
    pub fn link(&self, name: &str, child: &Arc<Inode>) -> Result<()> {
        if !self.is_dir() {
            return Err(FsError::not_a_directory("link", name));
        }

        let entry = DirEntry { name: name.to_string(), node: Arc::clone(child) };
        let replaced = {
            let mut st = self.state.write().map_err(|_| FsError::LockPoisoned)?;
            let replaced = match find(&st.dir, name) {
                Ok(i) => Some(std::mem::replace(&mut st.dir[i], entry)),
                Err(i) => {
                    st.dir.insert(i, entry);
                    None
                }
            };
            st.modified();
            replaced
        };

        // Link counts are adjusted outside the directory lock: the child
        // may be this very inode (the "." entry).
        if let Some(old) = replaced {
            old.node.count_down();
        }
        child.count_up();

        Ok(())
    }

    /// Removes the directory entry `name`, dropping its target's link count.
    pub fn unlink(&self, name: &str) -> Result<()> {
        if !self.is_dir() {
            return Err(FsError::not_a_directory("unlink", name));
        }

        let removed = {
            let mut st = self.state.write().map_err(|_| FsError::LockPoisoned)?;
            let i = match find(&st.dir, name) {
                Ok(i) => i,
                Err(_) => return Err(FsError::not_found("unlink", name)),
            };
            let removed = st.dir.remove(i);
            st.modified();
            removed
        };

        removed.node.count_down();
        Ok(())
    }

    /// Recursively unlinks every entry, leaving the entry sequence empty.
    ///
    /// `".."` is skipped as non-owning; entries that point back at this
    /// inode only have their count dropped. Used by `remove_all` and when
    /// tearing down the tree, since `"."`/`".."` make the graph cyclic.
    pub fn unlink_all(&self) -> Result<()> {
        let entries = {
            let mut st = self.state.write().map_err(|_| FsError::LockPoisoned)?;
            std::mem::take(&mut st.dir)
        };

        for e in &entries {
            if e.name == ".." {
                continue;
            }
            if e.node.ino == self.ino {
                e.node.count_down();
                continue;
            }
            if e.node.is_dir() {
                e.node.unlink_all()?;
            }
            e.node.count_down();
        }

        let mut st = self.state.write().map_err(|_| FsError::LockPoisoned)?;
        st.modified();
        Ok(())
    }

    /// Walks `path` from this inode, returning the inode it names.
    ///
    /// A leading `/` anchors the walk at this node (the caller passes the
    /// root for absolute paths); `.` and `..` resolve as ordinary entries.
    pub fn resolve(self: &Arc<Self>, path: &str) -> Result<Arc<Inode>> {
        let mut cur = Arc::clone(self);
        let mut rest = path;

        loop {
            let (name, trim) = path::pop_first(rest);
            match name {
                "" => return Ok(cur),
                "/" => {
                    if trim.is_empty() {
                        return Ok(cur);
                    }
                    rest = trim;
                }
                _ => {
                    let next = {
                        let st = cur.state.read().map_err(|_| FsError::LockPoisoned)?;
                        match find(&st.dir, name) {
                            Ok(i) => Arc::clone(&st.dir[i].node),
                            Err(_) => return Err(FsError::not_found("resolve", path)),
                        }
                    };
                    if trim.is_empty() {
                        return Ok(next);
                    }
                    cur = next;
                    rest = trim;
                }
            }
        }
    }

    /// Moves `oldpath` to `newpath`, both resolved from this inode (the
    /// root in practice).
    ///
    /// A destination that exists as a directory receives the source *into*
    /// it under the source's base name, unless the source is itself a
    /// directory; directories never overwrite directories. A destination
    /// that exists as a file is replaced.
    pub fn rename(self: &Arc<Self>, oldpath: &str, newpath: &str) -> Result<()> {
        let (odir, oname) = path::split(oldpath);
        let odir = path::clean(odir);

        let snode = self.resolve(oldpath)?;
        let sparent = self.resolve(&odir)?;

        let (target_dir, target_name) = match self.resolve(newpath) {
            Ok(t) if t.is_dir() => {
                if snode.is_dir() {
                    return Err(FsError::already_exists("rename", newpath));
                }
                (t, oname)
            }
            Ok(_) => {
                let (ndir, nname) = path::split(newpath);
                (self.resolve(&path::clean(ndir))?, nname)
            }
            Err(e) if e.is_not_found() => {
                let (ndir, nname) = path::split(newpath);
                (self.resolve(&path::clean(ndir))?, nname)
            }
            Err(e) => return Err(e),
        };

        target_dir.link(target_name, &snode)?;
        sparent.unlink(oname)?;

        Ok(())
    }

    /// Snapshot of the directory entries, in name order.
    pub(crate) fn entries(&self) -> Result<Vec<DirEntry>> {
        let st = self.state.read().map_err(|_| FsError::LockPoisoned)?;
        Ok(st.dir.clone())
    }
}

/// Monotonic inode-number allocator.
///
/// Numbers start at 1 and never repeat, except through [`rollback`], which
/// reclaims the most recent number when a create fails between allocation
/// and linking.
///
/// [`rollback`]: InodeAllocator::rollback
pub struct InodeAllocator {
    next: AtomicU64,
}

impl InodeAllocator {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(0) }
    }

    /// Allocates a regular-file inode with the given permission bits.
    pub fn new_file(&self, perm: u32) -> Arc<Inode> {
        let ino = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Inode::new(ino, FileMode::regular(perm))
    }

    /// Allocates a directory inode seeded with `"."` and `".."`, both
    /// pointing at the new directory until a parent rebinds `".."`.
    pub fn new_dir(&self, perm: u32) -> Arc<Inode> {
        let ino = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        let dir = Inode::new(ino, FileMode::directory(perm));

        // A fresh directory can always accept these two links.
        dir.link(".", &dir).expect("seeding new directory");
        dir.link("..", &dir).expect("seeding new directory");

        dir
    }

    /// Reclaims the most recently allocated number after a failed create.
    pub fn rollback(&self) {
        self.next.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for InodeAllocator {
    fn default() -> Self {
        Self::new()
    }
}
