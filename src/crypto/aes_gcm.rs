//! AES-256-GCM sealer.
//!
//! Sealed bodies are laid out as `nonce || ciphertext || tag` with a fresh
//! random nonce per seal, giving the fixed [`OVERHEAD`] expansion the slot
//! accounting relies on.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

use super::{FileKey, Sealer};
use crate::config::{NONCE_LEN, OVERHEAD};
use crate::error::{FsError, Result};

/// AES-256-GCM implementation of the vault's AEAD.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmSealer;

impl AesGcmSealer {
    /// Creates a new AES-256-GCM sealer.
    pub fn new() -> Self {
        Self
    }
}

impl Sealer for AesGcmSealer {
    fn seal(&self, key: &FileKey, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new(key.as_bytes().into());

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        let body = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| FsError::Encryption(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + body.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&body);

        Ok(sealed)
    }

    fn open(&self, key: &FileKey, ciphertext: &[u8], plaintext: &mut [u8]) -> Result<()> {
        if ciphertext.len() < OVERHEAD || ciphertext.len() - OVERHEAD != plaintext.len() {
            return Err(FsError::Decryption);
        }

        let cipher = Aes256Gcm::new(key.as_bytes().into());

        let (nonce_bytes, body) = ciphertext.split_at(NONCE_LEN);
        let nonce_array: [u8; NONCE_LEN] =
            nonce_bytes.try_into().map_err(|_| FsError::Decryption)?;
        let nonce = Nonce::from(nonce_array);

        let opened = Zeroizing::new(cipher.decrypt(&nonce, body).map_err(|_| FsError::Decryption)?);
        plaintext.copy_from_slice(&opened);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let sealer = AesGcmSealer::new();
        let key = FileKey::generate();
        let plaintext = b"Hello, World!";

        let sealed = sealer.seal(&key, plaintext).unwrap();
        assert_eq!(sealed.len(), plaintext.len() + OVERHEAD);
        assert_ne!(&sealed[NONCE_LEN..NONCE_LEN + plaintext.len()], plaintext);

        let mut opened = vec![0u8; plaintext.len()];
        sealer.open(&key, &sealed, &mut opened).unwrap();
        assert_eq!(opened.as_slice(), plaintext);
    }

    #[test]
    fn test_open_wrong_key() {
        let sealer = AesGcmSealer::new();
        let sealed = sealer.seal(&FileKey::generate(), b"Secret message").unwrap();

        let mut out = vec![0u8; sealed.len() - OVERHEAD];
        let result = sealer.open(&FileKey::generate(), &sealed, &mut out);
        assert!(matches!(result, Err(FsError::Decryption)));
    }

    #[test]
    fn test_tampered_ciphertext() {
        let sealer = AesGcmSealer::new();
        let key = FileKey::generate();
        let mut sealed = sealer.seal(&key, b"Important data").unwrap();

        sealed[NONCE_LEN] ^= 1;

        let mut out = vec![0u8; sealed.len() - OVERHEAD];
        let result = sealer.open(&key, &sealed, &mut out);
        assert!(result.is_err(), "tampered ciphertext must fail authentication");
    }

    #[test]
    fn test_buffer_length_mismatch() {
        let sealer = AesGcmSealer::new();
        let key = FileKey::generate();
        let sealed = sealer.seal(&key, b"abc").unwrap();

        let mut short = vec![0u8; 1];
        assert!(sealer.open(&key, &sealed, &mut short).is_err());
    }

    #[test]
    fn test_empty_plaintext() {
        let sealer = AesGcmSealer::new();
        let key = FileKey::generate();

        let sealed = sealer.seal(&key, b"").unwrap();
        assert_eq!(sealed.len(), OVERHEAD);

        let mut out = vec![0u8; 0];
        sealer.open(&key, &sealed, &mut out).unwrap();
    }

    #[test]
    fn test_nonce_freshness() {
        let sealer = AesGcmSealer::new();
        let key = FileKey::generate();

        let a = sealer.seal(&key, b"same bytes").unwrap();
        let b = sealer.seal(&key, b"same bytes").unwrap();
        assert_ne!(a, b);
    }
}
