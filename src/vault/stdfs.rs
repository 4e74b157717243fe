//! Read-only standard-FS view of the vault.
//!
//! Standard directory-walk utilities expect embedded filesystems to reject
//! absolute names; callers translate `"/"` to `"."` before walking. This
//! adapter enforces that convention and resolves every name from the
//! vault's root, ignoring the working directory.

use crate::error::{FsError, Result};
use crate::fs::Metadata;
use crate::inode::{path, DirEntry};

use super::{VaultFile, VaultFs};

/// Read-only, root-anchored view of a [`VaultFs`].
pub struct StdView<'fs> {
    fs: &'fs VaultFs,
}

fn check_path(op: &'static str, name: &str) -> Result<()> {
    if path::is_abs(name) {
        return Err(FsError::invalid_path(op, name));
    }
    Ok(())
}

fn rooted(name: &str) -> String {
    if name == "." {
        "/".to_string()
    } else {
        format!("/{name}")
    }
}

impl<'fs> StdView<'fs> {
    pub(crate) fn new(fs: &'fs VaultFs) -> Self {
        Self { fs }
    }

    /// Opens `name` read-only. Absolute names are rejected.
    pub fn open(&self, name: &str) -> Result<VaultFile> {
        check_path("open", name)?;
        self.fs.open(&rooted(name))
    }

    /// Metadata for `name`. Absolute names are rejected.
    pub fn stat(&self, name: &str) -> Result<Metadata> {
        check_path("stat", name)?;
        self.fs.stat(&rooted(name))
    }

    /// Whole-file read of `name`. Absolute names are rejected.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        check_path("open", name)?;
        self.fs.read_file(&rooted(name))
    }

    /// Directory listing of `name`, sorted, without `"."`/`".."`.
    /// Absolute names are rejected.
    pub fn read_dir(&self, name: &str) -> Result<Vec<DirEntry>> {
        check_path("open", name)?;
        self.fs.read_dir(&rooted(name))
    }

    /// Pre-order walk from `name`, entries in name order. Absolute names
    /// are rejected.
    pub fn walk_dir<F>(&self, name: &str, mut visit: F) -> Result<()>
    where
        F: FnMut(&str, &DirEntry) -> Result<()>,
    {
        check_path("walk", name)?;
        self.walk_inner(name, &mut visit)
    }

    /// Entry point for [`VaultFs::walk_dir`]: maps absolute roots onto the
    /// no-leading-slash convention first.
    pub(crate) fn walk_dir_from<F>(&self, root: &str, mut visit: F) -> Result<()>
    where
        F: FnMut(&str, &DirEntry) -> Result<()>,
    {
        let start = if path::is_abs(root) {
            if root == "/" {
                ".".to_string()
            } else {
                root[1..].to_string()
            }
        } else {
            root.to_string()
        };

        self.walk_inner(&start, &mut visit)
    }

    fn walk_inner<F>(&self, name: &str, visit: &mut F) -> Result<()>
    where
        F: FnMut(&str, &DirEntry) -> Result<()>,
    {
        let node = self
            .fs
            .root
            .resolve(&rooted(name))
            .map_err(|e| e.with_context("walk", name))?;
        let entry = DirEntry { name: path::base(name).to_string(), node };

        visit(name, &entry)?;

        if entry.node.is_dir() {
            for child in entry.node.entries()? {
                if child.name == "." || child.name == ".." {
                    continue;
                }
                let child_path = if name == "." {
                    child.name.clone()
                } else {
                    format!("{name}/{}", child.name)
                };
                self.walk_inner(&child_path, visit)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_absolute_paths() {
        let fs = VaultFs::new();
        let view = fs.std_view();

        assert!(matches!(view.open("/x").unwrap_err(), FsError::InvalidPath { .. }));
        assert!(matches!(view.stat("/").unwrap_err(), FsError::InvalidPath { .. }));
    }

    #[test]
    fn test_resolves_from_root_not_cwd() {
        let fs = VaultFs::new();
        fs.mkdir_all("/a/b", 0o755).unwrap();
        fs.write_file("/a/b/f", b"data", 0o644).unwrap();
        fs.chdir("/a").unwrap();

        let view = fs.std_view();
        assert_eq!(view.read_file("a/b/f").unwrap(), b"data");
        assert!(view.stat("b").unwrap_err().is_not_found());
    }

    #[test]
    fn test_walk_preorder_lexicographic() {
        let fs = VaultFs::new();
        fs.mkdir_all("/b/sub", 0o755).unwrap();
        fs.write_file("/a.txt", b"1", 0o644).unwrap();
        fs.write_file("/b/sub/deep.txt", b"2", 0o644).unwrap();
        fs.write_file("/b/z.txt", b"3", 0o644).unwrap();

        let mut seen = Vec::new();
        fs.walk_dir("/", |p, _e| {
            seen.push(p.to_string());
            Ok(())
        })
        .unwrap();

        assert_eq!(seen, [".", "a.txt", "b", "b/sub", "b/sub/deep.txt", "b/z.txt"]);
    }

    #[test]
    fn test_walk_callback_error_aborts() {
        let fs = VaultFs::new();
        fs.write_file("/a", b"", 0o644).unwrap();
        fs.write_file("/b", b"", 0o644).unwrap();

        let mut count = 0;
        let err = fs.walk_dir("/", |_p, _e| {
            count += 1;
            Err(FsError::ShortWrite)
        });
        assert!(err.is_err());
        assert_eq!(count, 1);
    }
}
