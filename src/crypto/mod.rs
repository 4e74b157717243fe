//! Cryptographic primitives backing the sealed file store.
//!
//! The vault treats authenticated encryption as a black box behind the
//! [`Sealer`] trait: a fixed ciphertext expansion
//! ([`OVERHEAD`](crate::config::OVERHEAD)), random
//! fixed-size keys, and an authenticated decrypt that fails loudly on
//! tampering. Keys exist in two forms: a transient [`FileKey`] that is
//! wiped on drop, and a [`SealedKey`] held at rest in page-locked memory.

pub mod aes_gcm;

pub use aes_gcm::AesGcmSealer;

use rand::RngCore;
use zeroize::Zeroize;

use crate::config::KEY_LEN;
use crate::error::Result;
use crate::memory::LockedMemory;

/// A freshly generated or freshly opened per-file encryption key.
///
/// The bytes are wiped when the key drops; a `FileKey` should never outlive
/// the single seal or open call it was produced for.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct FileKey {
    key: [u8; KEY_LEN],
}

impl FileKey {
    /// Generates a fresh random key from the OS RNG.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut key);
        Self { key }
    }

    pub(crate) fn from_bytes(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

/// A key at rest: zeroized on drop and held in page-locked memory so it
/// cannot be swapped to disk (best effort where `mlock` is restricted).
pub struct SealedKey {
    mem: LockedMemory<[u8; KEY_LEN]>,
}

impl SealedKey {
    /// Seals a key for storage alongside its ciphertext.
    pub fn seal(key: &FileKey) -> Self {
        let (mem, _locked) = LockedMemory::new_best_effort(*key.as_bytes());
        Self { mem }
    }

    /// Opens the sealed container, yielding a transient copy of the key.
    pub fn open(&self) -> FileKey {
        FileKey::from_bytes(*self.mem)
    }
}

/// Trait for the authenticated-encryption primitive.
///
/// Implementations must produce ciphertext exactly
/// `plaintext.len() + OVERHEAD` bytes long, and must reject any modified
/// ciphertext on open.
pub trait Sealer: Send + Sync {
    /// Encrypts `plaintext` under `key`, returning the sealed body.
    fn seal(&self, key: &FileKey, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypts `ciphertext` under `key` into the caller-provided buffer,
    /// which must be exactly `ciphertext.len() - OVERHEAD` bytes long.
    fn open(&self, key: &FileKey, ciphertext: &[u8], plaintext: &mut [u8]) -> Result<()>;
}
