//! Host-OS passthrough filesystem.
//!
//! A thin delegation layer over `std::fs` implementing the same traits as
//! the vault, so the dispatch facade can route non-vault paths here. Host
//! errors surface as [`FsError::Io`].

use std::fs as stdfs;
use std::io;
use std::io::SeekFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::error::{FsError, Result};
use crate::fs::{File, FileSystem, Metadata, OpenFlags};
use crate::inode::FileMode;

/// The host operating system's filesystem.
#[derive(Debug, Default)]
pub struct OsFs;

impl OsFs {
    pub fn new() -> Self {
        Self
    }

    /// Sorted directory listing of `name`, as metadata snapshots.
    pub fn read_dir(&self, name: &str) -> Result<Vec<Metadata>> {
        let mut out = Vec::new();
        for entry in stdfs::read_dir(name)? {
            let entry = entry?;
            let md = entry.metadata()?;
            out.push(metadata_from_std(&entry.file_name().to_string_lossy(), &md));
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}

fn metadata_from_std(name: &str, md: &stdfs::Metadata) -> Metadata {
    let now = SystemTime::now();

    #[cfg(unix)]
    let (mode, nlink, ino) = {
        use std::os::unix::fs::MetadataExt;
        (FileMode::from_bits(md.mode()), md.nlink(), md.ino())
    };

    #[cfg(not(unix))]
    let (mode, nlink, ino) = {
        let mode = if md.is_dir() {
            FileMode::directory(0o755)
        } else if md.file_type().is_symlink() {
            FileMode::symlink(0o777)
        } else {
            FileMode::regular(0o644)
        };
        (mode, 1, 0)
    };

    Metadata {
        name: name.to_string(),
        len: md.len(),
        mode,
        nlink,
        ino,
        created: md.created().unwrap_or(now),
        accessed: md.accessed().unwrap_or(now),
        modified: md.modified().unwrap_or(now),
    }
}

/// An open host-OS file.
pub struct OsFile {
    name: String,
    file: stdfs::File,
    dir_listing: Mutex<Option<Vec<Metadata>>>,
    closed: AtomicBool,
}

impl OsFile {
    fn check_open(&self, op: &'static str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FsError::closed(op, &self.name));
        }
        Ok(())
    }
}

impl File for OsFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_at(&self, buf: &mut [u8], off: i64) -> Result<usize> {
        self.check_open("readat")?;
        if off < 0 {
            return Err(FsError::invalid_path("readat", &self.name));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            Ok(self.file.read_at(buf, off as u64)?)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            Ok(self.file.seek_read(buf, off as u64)?)
        }
    }

    fn write_at(&self, buf: &[u8], off: i64) -> Result<usize> {
        self.check_open("writeat")?;
        if off < 0 {
            return Err(FsError::invalid_path("writeat", &self.name));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            Ok(self.file.write_at(buf, off as u64)?)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            Ok(self.file.seek_write(buf, off as u64)?)
        }
    }

    fn stat(&self) -> Result<Metadata> {
        self.check_open("stat")?;
        let md = self.file.metadata()?;
        let base = crate::inode::path::base(&self.name).to_string();
        Ok(metadata_from_std(&base, &md))
    }

    fn truncate(&self, size: u64) -> Result<()> {
        self.check_open("truncate")?;
        Ok(self.file.set_len(size)?)
    }

    fn read_dir(&self, n: isize) -> Result<Vec<Metadata>> {
        self.check_open("readdir")?;

        let mut listing = self.dir_listing.lock().map_err(|_| FsError::LockPoisoned)?;
        if listing.is_none() {
            *listing = Some(OsFs.read_dir(&self.name)?);
        }

        let entries = listing.as_mut().expect("listing populated above");
        let take = if n <= 0 { entries.len() } else { entries.len().min(n as usize) };
        Ok(entries.drain(..take).collect())
    }

    fn sync(&self) -> Result<()> {
        self.check_open("sync")?;
        Ok(self.file.sync_all()?)
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(FsError::closed("close", &self.name));
        }
        Ok(())
    }
}

impl io::Read for OsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_open("read").map_err(io::Error::from)?;
        io::Read::read(&mut self.file, buf)
    }
}

impl io::Write for OsFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_open("write").map_err(io::Error::from)?;
        io::Write::write(&mut self.file, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut self.file)
    }
}

impl io::Seek for OsFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.check_open("seek").map_err(io::Error::from)?;
        io::Seek::seek(&mut self.file, pos)
    }
}

impl FileSystem for OsFs {
    type File = OsFile;

    fn open_file(&self, name: &str, flags: OpenFlags, perm: u32) -> Result<OsFile> {
        let mut options = stdfs::OpenOptions::new();
        options
            .read(!flags.is_write_only())
            .write(!flags.is_read_only())
            .append(flags.has(OpenFlags::APPEND))
            .truncate(flags.has(OpenFlags::TRUNC));

        if flags.has(OpenFlags::CREATE) && flags.has(OpenFlags::EXCL) {
            options.create_new(true);
        } else if flags.has(OpenFlags::CREATE) {
            options.create(true);
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(perm);
        }
        #[cfg(not(unix))]
        let _ = perm;

        let file = options.open(name)?;
        Ok(OsFile {
            name: name.to_string(),
            file,
            dir_listing: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    fn mkdir(&self, name: &str, perm: u32) -> Result<()> {
        let mut builder = stdfs::DirBuilder::new();

        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(perm);
        }
        #[cfg(not(unix))]
        let _ = perm;

        Ok(builder.create(name)?)
    }

    fn mkdir_all(&self, name: &str, perm: u32) -> Result<()> {
        let mut builder = stdfs::DirBuilder::new();
        builder.recursive(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(perm);
        }
        #[cfg(not(unix))]
        let _ = perm;

        Ok(builder.create(name)?)
    }

    fn remove(&self, name: &str) -> Result<()> {
        if stdfs::symlink_metadata(name)?.is_dir() {
            Ok(stdfs::remove_dir(name)?)
        } else {
            Ok(stdfs::remove_file(name)?)
        }
    }

    fn remove_all(&self, name: &str) -> Result<()> {
        match stdfs::symlink_metadata(name) {
            Ok(md) if md.is_dir() => Ok(stdfs::remove_dir_all(name)?),
            Ok(_) => Ok(stdfs::remove_file(name)?),
            // Mirrors the usual remove-all contract: nothing to do.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn rename(&self, oldpath: &str, newpath: &str) -> Result<()> {
        stdfs::rename(oldpath, newpath).map_err(|e| FsError::Rename {
            old: oldpath.to_string(),
            new: newpath.to_string(),
            source: Box::new(e.into()),
        })
    }

    fn stat(&self, name: &str) -> Result<Metadata> {
        let md = stdfs::metadata(name)?;
        Ok(metadata_from_std(crate::inode::path::base(name), &md))
    }

    fn lstat(&self, name: &str) -> Result<Metadata> {
        let md = stdfs::symlink_metadata(name)?;
        Ok(metadata_from_std(crate::inode::path::base(name), &md))
    }

    fn truncate(&self, name: &str, size: u64) -> Result<()> {
        let file = stdfs::OpenOptions::new().write(true).open(name)?;
        Ok(file.set_len(size)?)
    }

    fn chmod(&self, name: &str, perm: u32) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            Ok(stdfs::set_permissions(name, stdfs::Permissions::from_mode(perm))?)
        }

        #[cfg(not(unix))]
        {
            let _ = (name, perm);
            Ok(())
        }
    }

    fn chtimes(&self, name: &str, atime: SystemTime, mtime: SystemTime) -> Result<()> {
        let file = stdfs::OpenOptions::new().write(true).open(name)?;
        let times = stdfs::FileTimes::new().set_accessed(atime).set_modified(mtime);
        Ok(file.set_times(times)?)
    }

    fn chdir(&self, name: &str) -> Result<()> {
        Ok(std::env::set_current_dir(name)?)
    }

    fn getwd(&self) -> Result<String> {
        Ok(std::env::current_dir()?.to_string_lossy().into_owned())
    }

    fn temp_dir(&self) -> String {
        std::env::temp_dir().to_string_lossy().into_owned()
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        Ok(stdfs::read(name)?)
    }

    fn write_file(&self, name: &str, data: &[u8], perm: u32) -> Result<()> {
        stdfs::write(name, data)?;
        self.chmod(name, perm)
    }
}
