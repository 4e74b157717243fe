//! sealbox - an in-process encrypted virtual filesystem
//!
//! Every regular file in the vault lives only as authenticated ciphertext
//! (AES-256-GCM), decrypted transiently on demand and re-encrypted under a
//! freshly generated key after each mutation. The vault exposes
//! hierarchical paths, POSIX-like open flags and file handles, directory
//! enumeration, and a concurrency-safe core for many readers and writers
//! in one process.
//!
//! # Features
//!
//! - **Ciphertext at rest**: file bodies are never stored as plaintext
//! - **Rekey on every write**: a key is never reused for new content
//! - **Secure wiping**: transient plaintext and retired keys are zeroized
//! - **Unix-flavored semantics**: offsets, append mode, truncate,
//!   unlink-while-open, sorted directory listings
//! - **Host passthrough**: a dispatch facade routes `vfs://` paths to the
//!   vault and everything else to `std::fs`
//!
//! # Example
//!
//! ```
//! use sealbox::{SealBox, File};
//!
//! let sealbox = SealBox::new();
//!
//! // Lives only in memory, encrypted:
//! sealbox.mkdir_all("vfs://notes", 0o700)?;
//! sealbox.write_file("vfs://notes/secret.txt", b"ciphertext only", 0o600)?;
//! assert_eq!(sealbox.read_file("vfs://notes/secret.txt")?, b"ciphertext only");
//!
//! let file = sealbox.open("vfs://notes/secret.txt")?;
//! let mut buf = [0u8; 10];
//! let n = file.read_at(&mut buf, 11)?;
//! assert_eq!(&buf[..n], b"only");
//! file.close()?;
//! # Ok::<(), sealbox::FsError>(())
//! ```
//!
//! The vault alone (no host side) is [`VaultFs`]; see [`fs::FileSystem`]
//! for the interface both sides implement.

pub mod boxfs;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fs;
pub mod inode;
pub mod ioutil;
pub mod memory;
pub mod osfs;
pub mod vault;

// Re-export commonly used types
pub use boxfs::{convert_vault_path, default_box, install_default, is_vault_path, BoxFile, SealBox};
pub use config::{OVERHEAD, VAULT_PREFIX};
pub use crypto::{AesGcmSealer, FileKey, SealedKey, Sealer};
pub use error::{FsError, Result};
pub use fs::{File, FileSystem, Metadata, OpenFlags};
pub use inode::{DirEntry, FileMode, FileType};
pub use osfs::{OsFile, OsFs};
pub use vault::{StdView, VaultFile, VaultFs};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_routes_between_sides() {
        let sealbox = SealBox::new();

        sealbox.write_file("vfs://v.txt", b"vault", 0o600).unwrap();
        assert!(sealbox.stat("vfs://v.txt").is_ok());

        let dir = tempfile::tempdir().unwrap();
        let host_path = dir.path().join("h.txt");
        let host_path = host_path.to_str().unwrap();
        sealbox.write_file(host_path, b"host", 0o644).unwrap();

        assert_eq!(sealbox.read_file("vfs://v.txt").unwrap(), b"vault");
        assert_eq!(sealbox.read_file(host_path).unwrap(), b"host");
    }

    #[test]
    fn test_default_box_is_usable() {
        let b = default_box();
        b.write_file("vfs://default.txt", b"shared", 0o600).unwrap();
        assert_eq!(default_box().read_file("vfs://default.txt").unwrap(), b"shared");
    }
}
