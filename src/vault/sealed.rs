//! Per-file sealed storage: the `(ciphertext, sealed key)` pair behind
//! every regular file in the vault.
//!
//! All mutation follows the rekey rule: decrypt under the old key, build
//! the new plaintext, generate a fresh key, re-encrypt, and only then
//! commit. A key is never reused for different plaintext, and after a
//! mutation the previous key is unreachable. Transient plaintext lives in
//! [`ScrubGuard`]s so it is wiped on every exit path.

use std::sync::RwLock;

use crate::config::OVERHEAD;
use crate::crypto::{FileKey, SealedKey, Sealer};
use crate::error::{FsError, Result};
use crate::memory::scrub::ScrubGuard;

/// The sealed body of one regular file.
///
/// A never-written file holds an empty ciphertext and no key. Whenever the
/// ciphertext is non-empty, the plaintext length is exactly
/// `ciphertext.len() - OVERHEAD`.
pub(crate) struct SealedFile {
    state: RwLock<SealedState>,
}

struct SealedState {
    ciphertext: Vec<u8>,
    key: Option<SealedKey>,
}

impl SealedState {
    fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(OVERHEAD)
    }

    /// Decrypts the current body into a fresh guarded buffer.
    fn open_plaintext(&self, sealer: &dyn Sealer) -> Result<ScrubGuard<Vec<u8>>> {
        let mut buf = ScrubGuard::new(vec![0u8; self.plaintext_len()]);
        if !self.ciphertext.is_empty() {
            let key = self.key.as_ref().ok_or(FsError::Decryption)?.open();
            sealer.open(&key, &self.ciphertext, &mut buf)?;
        }
        Ok(buf)
    }

    /// Seals `plaintext` under a fresh key and commits it. The previous
    /// key drops (and zeroizes) on success; on failure nothing changes.
    fn reseal(&mut self, sealer: &dyn Sealer, plaintext: &[u8]) -> Result<()> {
        let key = FileKey::generate();
        let ciphertext = sealer.seal(&key, plaintext)?;
        self.ciphertext = ciphertext;
        self.key = Some(SealedKey::seal(&key));
        Ok(())
    }
}

impl SealedFile {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(SealedState { ciphertext: Vec::new(), key: None }),
        }
    }

    /// Decrypts the whole body under the slot read lock.
    ///
    /// The returned buffer is wiped when dropped. An empty slot yields an
    /// empty buffer.
    pub(crate) fn plaintext(&self, sealer: &dyn Sealer) -> Result<ScrubGuard<Vec<u8>>> {
        let st = self.state.read().map_err(|_| FsError::LockPoisoned)?;
        st.open_plaintext(sealer)
    }

    /// Writes `data` at byte offset `off`, extending and zero-filling as
    /// needed, under the slot write lock. Returns the new plaintext size.
    ///
    /// The whole read-modify-rekey cycle happens under the one lock, so
    /// concurrent writers serialize and a failed encrypt leaves the
    /// previous ciphertext and key in place.
    pub(crate) fn splice(&self, sealer: &dyn Sealer, off: usize, data: &[u8]) -> Result<u64> {
        let mut st = self.state.write().map_err(|_| FsError::LockPoisoned)?;

        let cur = st.plaintext_len();
        let new_len = cur.max(off + data.len());

        let mut buf = ScrubGuard::new(vec![0u8; new_len]);
        if !st.ciphertext.is_empty() {
            let key = st.key.as_ref().ok_or(FsError::Decryption)?.open();
            sealer.open(&key, &st.ciphertext, &mut buf[..cur])?;
        }
        buf[off..off + data.len()].copy_from_slice(data);

        st.reseal(sealer, &buf)?;
        Ok(new_len as u64)
    }

    /// Resizes the plaintext to `new_size` under the slot write lock.
    ///
    /// Truncating to zero discards both ciphertext and key. Shrinking
    /// re-encrypts the prefix under a fresh key; extending zero-fills.
    /// Matching sizes are a no-op (no rekey).
    pub(crate) fn truncate(&self, sealer: &dyn Sealer, new_size: usize) -> Result<()> {
        let mut st = self.state.write().map_err(|_| FsError::LockPoisoned)?;

        if new_size == 0 {
            if !st.ciphertext.is_empty() {
                st.ciphertext = Vec::new();
                st.key = None;
            }
            return Ok(());
        }

        let cur = st.plaintext_len();
        if new_size == cur {
            return Ok(());
        }

        let old = st.open_plaintext(sealer)?;
        let mut buf = ScrubGuard::new(vec![0u8; new_size]);
        let keep = cur.min(new_size);
        buf[..keep].copy_from_slice(&old[..keep]);
        drop(old);

        st.reseal(sealer, &buf)
    }

    /// The sealed key bytes, for rekey-freshness checks.
    #[cfg(test)]
    pub(crate) fn key_snapshot(&self) -> Option<[u8; crate::config::KEY_LEN]> {
        let st = self.state.read().unwrap();
        st.key.as_ref().map(|k| *k.open().as_bytes())
    }
}
