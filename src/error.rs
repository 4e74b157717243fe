//! Error types for vault and host filesystem operations.
//!
//! Every public operation returns [`FsError`]. Path-bearing variants carry
//! the operation name and the path as presented by the caller, so errors
//! read like `open /tmp/x: no such file or directory`.

use thiserror::Error;

/// Main error type for all filesystem operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// The path does not resolve to an inode.
    #[error("{op} {path}: no such file or directory")]
    NotFound { op: &'static str, path: String },

    /// The path already resolves to an inode and the operation forbids it.
    #[error("{op} {path}: file already exists")]
    AlreadyExists { op: &'static str, path: String },

    /// A regular-file operation was applied to a directory.
    #[error("{op} {path}: is a directory")]
    IsADirectory { op: &'static str, path: String },

    /// A directory operation was applied to a non-directory.
    #[error("{op} {path}: not a directory")]
    NotADirectory { op: &'static str, path: String },

    /// Refusing to remove a directory that still has entries.
    #[error("{op} {path}: directory not empty")]
    DirectoryNotEmpty { op: &'static str, path: String },

    /// The name is empty or syntactically malformed.
    #[error("{op} {path}: invalid argument")]
    InvalidPath { op: &'static str, path: String },

    /// The handle's open flags forbid this operation.
    #[error("{op} {path}: permission denied")]
    PermissionDenied { op: &'static str, path: String },

    /// The handle was closed; it is permanently unusable.
    #[error("{op} {path}: file already closed")]
    Closed { op: &'static str, path: String },

    /// A whole-file read came up short of the recorded size.
    #[error("unexpected end of file")]
    UnexpectedEof,

    /// A whole-file write accepted fewer bytes than offered.
    #[error("short write")]
    ShortWrite,

    /// Authentication failed on decrypt: the ciphertext is corrupt or was
    /// tampered with. Fatal for the affected file.
    #[error("decryption failed: ciphertext corrupt or tampered with")]
    Decryption,

    /// The AEAD refused to encrypt. The slot is left unchanged.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// A lock was poisoned by a panicking thread.
    #[error("lock poisoned")]
    LockPoisoned,

    /// Structural error for rename, carrying both paths and the cause.
    #[error("rename {old} {new}: {source}")]
    Rename {
        old: String,
        new: String,
        #[source]
        source: Box<FsError>,
    },

    /// I/O error from the host-OS passthrough.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    pub(crate) fn not_found(op: &'static str, path: impl Into<String>) -> Self {
        FsError::NotFound { op, path: path.into() }
    }

    pub(crate) fn already_exists(op: &'static str, path: impl Into<String>) -> Self {
        FsError::AlreadyExists { op, path: path.into() }
    }

    pub(crate) fn is_a_directory(op: &'static str, path: impl Into<String>) -> Self {
        FsError::IsADirectory { op, path: path.into() }
    }

    pub(crate) fn not_a_directory(op: &'static str, path: impl Into<String>) -> Self {
        FsError::NotADirectory { op, path: path.into() }
    }

    pub(crate) fn invalid_path(op: &'static str, path: impl Into<String>) -> Self {
        FsError::InvalidPath { op, path: path.into() }
    }

    pub(crate) fn permission_denied(op: &'static str, path: impl Into<String>) -> Self {
        FsError::PermissionDenied { op, path: path.into() }
    }

    pub(crate) fn closed(op: &'static str, path: impl Into<String>) -> Self {
        FsError::Closed { op, path: path.into() }
    }

    /// Rewrites the operation and path context, preserving the error kind.
    ///
    /// Used when an inner layer reported the failure but the caller owns
    /// the user-facing operation name.
    pub(crate) fn with_context(self, op: &'static str, path: &str) -> Self {
        let path = path.to_string();
        match self {
            FsError::NotFound { .. } => FsError::NotFound { op, path },
            FsError::AlreadyExists { .. } => FsError::AlreadyExists { op, path },
            FsError::IsADirectory { .. } => FsError::IsADirectory { op, path },
            FsError::NotADirectory { .. } => FsError::NotADirectory { op, path },
            FsError::DirectoryNotEmpty { .. } => FsError::DirectoryNotEmpty { op, path },
            FsError::InvalidPath { .. } => FsError::InvalidPath { op, path },
            FsError::PermissionDenied { .. } => FsError::PermissionDenied { op, path },
            FsError::Closed { .. } => FsError::Closed { op, path },
            other => other,
        }
    }

    /// True if the path failed to resolve.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }

    /// True if the path already existed.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, FsError::AlreadyExists { .. })
    }

    /// True if the operation was refused by the handle's open flags.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, FsError::PermissionDenied { .. })
    }

    /// True if the handle had already been closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, FsError::Closed { .. })
    }
}

/// Type alias for Results using FsError.
pub type Result<T> = std::result::Result<T, FsError>;

impl From<FsError> for std::io::Error {
    fn from(err: FsError) -> Self {
        use std::io::ErrorKind;

        let kind = match &err {
            FsError::NotFound { .. } => ErrorKind::NotFound,
            FsError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            FsError::IsADirectory { .. } => ErrorKind::IsADirectory,
            FsError::NotADirectory { .. } => ErrorKind::NotADirectory,
            FsError::DirectoryNotEmpty { .. } => ErrorKind::DirectoryNotEmpty,
            FsError::InvalidPath { .. } => ErrorKind::InvalidInput,
            FsError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            FsError::Closed { .. } => ErrorKind::Other,
            FsError::UnexpectedEof => ErrorKind::UnexpectedEof,
            FsError::ShortWrite => ErrorKind::WriteZero,
            FsError::Decryption | FsError::Encryption(_) => ErrorKind::InvalidData,
            FsError::LockPoisoned => ErrorKind::Other,
            FsError::Rename { .. } => ErrorKind::Other,
            FsError::Io(e) => return std::io::Error::new(e.kind(), err.to_string()),
        };

        std::io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FsError::not_found("open", "/a/b");
        assert_eq!(err.to_string(), "open /a/b: no such file or directory");

        let err = FsError::closed("read", "x.txt");
        assert_eq!(err.to_string(), "read x.txt: file already closed");
    }

    #[test]
    fn test_rename_error_carries_cause() {
        let err = FsError::Rename {
            old: "/from".into(),
            new: "/to".into(),
            source: Box::new(FsError::not_found("rename", "/from")),
        };
        let msg = err.to_string();
        assert!(msg.contains("/from"));
        assert!(msg.contains("/to"));
    }

    #[test]
    fn test_with_context_preserves_kind() {
        let err = FsError::not_found("resolve", "inner").with_context("open", "/x");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "open /x: no such file or directory");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err: std::io::Error = FsError::not_found("open", "/x").into();
        assert_eq!(io_err.kind(), std::io::ErrorKind::NotFound);
    }
}
