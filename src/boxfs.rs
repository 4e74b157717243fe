//! Dispatch facade routing paths to the encrypted vault or the host OS.
//!
//! Paths beginning with [`VAULT_PREFIX`](crate::config::VAULT_PREFIX)
//! (`vfs://`) address the in-memory vault; everything else goes to the
//! host filesystem. Two-path operations must keep both paths on the same
//! side.
//!
//! Prefer constructing a [`SealBox`] and passing it around explicitly;
//! [`install_default`]/[`default_box`] exist for callers that want the
//! ergonomics of a process-wide instance.

use std::io;
use std::io::SeekFrom;
use std::sync::OnceLock;
use std::time::SystemTime;

use crate::config::VAULT_PREFIX;
use crate::error::{FsError, Result};
use crate::fs::{File, FileSystem, Metadata, OpenFlags};
use crate::osfs::{OsFile, OsFs};
use crate::vault::{VaultFile, VaultFs};

/// True if `path` addresses the vault.
pub fn is_vault_path(path: &str) -> bool {
    path.starts_with(VAULT_PREFIX)
}

/// Strips the vault prefix, returning the in-vault absolute path and
/// whether the input was a vault path at all.
pub fn convert_vault_path(path: &str) -> (String, bool) {
    match path.strip_prefix(VAULT_PREFIX) {
        Some(rest) => (format!("/{rest}"), true),
        None => (path.to_string(), false),
    }
}

/// A handle returned by [`SealBox`]: either side of the dispatch.
pub enum BoxFile {
    Vault(VaultFile),
    Host(OsFile),
}

macro_rules! delegate {
    ($self:ident, $f:ident => $e:expr) => {
        match $self {
            BoxFile::Vault($f) => $e,
            BoxFile::Host($f) => $e,
        }
    };
}

impl File for BoxFile {
    fn name(&self) -> &str {
        delegate!(self, f => f.name())
    }

    fn read_at(&self, buf: &mut [u8], off: i64) -> Result<usize> {
        delegate!(self, f => f.read_at(buf, off))
    }

    fn write_at(&self, buf: &[u8], off: i64) -> Result<usize> {
        delegate!(self, f => f.write_at(buf, off))
    }

    fn stat(&self) -> Result<Metadata> {
        delegate!(self, f => f.stat())
    }

    fn truncate(&self, size: u64) -> Result<()> {
        delegate!(self, f => f.truncate(size))
    }

    fn read_dir(&self, n: isize) -> Result<Vec<Metadata>> {
        delegate!(self, f => File::read_dir(f, n))
    }

    fn sync(&self) -> Result<()> {
        delegate!(self, f => f.sync())
    }

    fn close(&self) -> Result<()> {
        delegate!(self, f => f.close())
    }
}

impl io::Read for BoxFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        delegate!(self, f => io::Read::read(f, buf))
    }
}

impl io::Write for BoxFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        delegate!(self, f => io::Write::write(f, buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        delegate!(self, f => io::Write::flush(f))
    }
}

impl io::Seek for BoxFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        delegate!(self, f => io::Seek::seek(f, pos))
    }
}

/// The dispatch facade: one encrypted vault plus the host filesystem.
pub struct SealBox {
    vault: VaultFs,
    host: OsFs,
}

impl SealBox {
    /// A fresh, empty vault alongside the host filesystem.
    pub fn new() -> Self {
        Self { vault: VaultFs::new(), host: OsFs::new() }
    }

    /// Direct access to the vault side.
    pub fn vault(&self) -> &VaultFs {
        &self.vault
    }

    /// Direct access to the host side.
    pub fn host(&self) -> &OsFs {
        &self.host
    }

    pub fn open(&self, name: &str) -> Result<BoxFile> {
        self.open_file(name, OpenFlags::RDONLY, 0)
    }

    pub fn create(&self, name: &str) -> Result<BoxFile> {
        self.open_file(
            name,
            OpenFlags::CREATE | OpenFlags::RDWR | OpenFlags::TRUNC,
            0o644,
        )
    }

    pub fn open_file(&self, name: &str, flags: OpenFlags, perm: u32) -> Result<BoxFile> {
        let (path, in_vault) = convert_vault_path(name);
        if in_vault {
            Ok(BoxFile::Vault(self.vault.open_file(&path, flags, perm)?))
        } else {
            Ok(BoxFile::Host(self.host.open_file(&path, flags, perm)?))
        }
    }

    pub fn mkdir(&self, name: &str, perm: u32) -> Result<()> {
        let (path, in_vault) = convert_vault_path(name);
        if in_vault {
            self.vault.mkdir(&path, perm)
        } else {
            self.host.mkdir(&path, perm)
        }
    }

    pub fn mkdir_all(&self, name: &str, perm: u32) -> Result<()> {
        let (path, in_vault) = convert_vault_path(name);
        if in_vault {
            self.vault.mkdir_all(&path, perm)
        } else {
            self.host.mkdir_all(&path, perm)
        }
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let (path, in_vault) = convert_vault_path(name);
        if in_vault {
            self.vault.remove(&path)
        } else {
            self.host.remove(&path)
        }
    }

    pub fn remove_all(&self, name: &str) -> Result<()> {
        let (path, in_vault) = convert_vault_path(name);
        if in_vault {
            self.vault.remove_all(&path)
        } else {
            self.host.remove_all(&path)
        }
    }

    /// Renames within one side; mixing a vault path with a host path is
    /// refused.
    pub fn rename(&self, oldpath: &str, newpath: &str) -> Result<()> {
        let (old, old_vault) = convert_vault_path(oldpath);
        let (new, new_vault) = convert_vault_path(newpath);

        match (old_vault, new_vault) {
            (true, true) => self.vault.rename(&old, &new),
            (false, false) => self.host.rename(&old, &new),
            _ => Err(FsError::Rename {
                old: oldpath.to_string(),
                new: newpath.to_string(),
                source: Box::new(FsError::invalid_path("rename", oldpath)),
            }),
        }
    }

    pub fn stat(&self, name: &str) -> Result<Metadata> {
        let (path, in_vault) = convert_vault_path(name);
        if in_vault {
            self.vault.stat(&path)
        } else {
            FileSystem::stat(&self.host, &path)
        }
    }

    pub fn lstat(&self, name: &str) -> Result<Metadata> {
        let (path, in_vault) = convert_vault_path(name);
        if in_vault {
            self.vault.lstat(&path)
        } else {
            FileSystem::lstat(&self.host, &path)
        }
    }

    pub fn truncate(&self, name: &str, size: u64) -> Result<()> {
        let (path, in_vault) = convert_vault_path(name);
        if in_vault {
            self.vault.truncate(&path, size)
        } else {
            FileSystem::truncate(&self.host, &path, size)
        }
    }

    pub fn chmod(&self, name: &str, perm: u32) -> Result<()> {
        let (path, in_vault) = convert_vault_path(name);
        if in_vault {
            self.vault.chmod(&path, perm)
        } else {
            self.host.chmod(&path, perm)
        }
    }

    pub fn chtimes(&self, name: &str, atime: SystemTime, mtime: SystemTime) -> Result<()> {
        let (path, in_vault) = convert_vault_path(name);
        if in_vault {
            self.vault.chtimes(&path, atime, mtime)
        } else {
            self.host.chtimes(&path, atime, mtime)
        }
    }

    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let (path, in_vault) = convert_vault_path(name);
        if in_vault {
            self.vault.read_file(&path)
        } else {
            self.host.read_file(&path)
        }
    }

    pub fn write_file(&self, name: &str, data: &[u8], perm: u32) -> Result<()> {
        let (path, in_vault) = convert_vault_path(name);
        if in_vault {
            self.vault.write_file(&path, data, perm)
        } else {
            self.host.write_file(&path, data, perm)
        }
    }

    /// Sorted directory listing, without `"."`/`".."`.
    pub fn read_dir(&self, name: &str) -> Result<Vec<Metadata>> {
        let (path, in_vault) = convert_vault_path(name);
        if in_vault {
            let entries = self.vault.read_dir(&path)?;
            Ok(entries.iter().map(|e| e.metadata()).collect())
        } else {
            self.host.read_dir(&path)
        }
    }

    /// Creates a uniquely named temporary file under `dir` (that side's
    /// temp directory if empty).
    pub fn temp_file(&self, dir: &str, prefix: &str) -> Result<BoxFile> {
        let (path, in_vault) = convert_vault_path(dir);
        if in_vault {
            Ok(BoxFile::Vault(crate::ioutil::temp_file(&self.vault, &path, prefix)?))
        } else {
            Ok(BoxFile::Host(crate::ioutil::temp_file(&self.host, &path, prefix)?))
        }
    }

    /// Creates a uniquely named temporary directory under `dir`, returning
    /// its path as addressable through this facade.
    pub fn temp_dir(&self, dir: &str, prefix: &str) -> Result<String> {
        let (path, in_vault) = convert_vault_path(dir);
        if in_vault {
            let created = crate::ioutil::temp_dir(&self.vault, &path, prefix)?;
            Ok(format!("{}{}", VAULT_PREFIX, created.trim_start_matches('/')))
        } else {
            crate::ioutil::temp_dir(&self.host, &path, prefix)
        }
    }
}

impl Default for SealBox {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT: OnceLock<SealBox> = OnceLock::new();

/// Installs a process-wide default instance. Fails if one is already
/// installed (returning the rejected instance).
pub fn install_default(sealbox: SealBox) -> std::result::Result<(), SealBox> {
    DEFAULT.set(sealbox)
}

/// The process-wide default instance, created on first use.
pub fn default_box() -> &'static SealBox {
    DEFAULT.get_or_init(SealBox::new)
}
