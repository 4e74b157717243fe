//! Memory scrubbing for transient plaintext.
//!
//! Every plaintext buffer the vault materializes lives between a slot-lock
//! acquisition and its release; these helpers guarantee the bytes are wiped
//! before the memory is released, on every exit path including errors.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{compiler_fence, Ordering};
use zeroize::Zeroize;

/// Securely wipe a byte slice.
///
/// Uses volatile writes (via `zeroize`) plus a compiler fence so the wipe
/// cannot be optimized away.
///
/// # Example
///
/// ```
/// use sealbox::memory::scrub::scrub_bytes;
///
/// let mut secret = vec![0x42; 256];
/// scrub_bytes(&mut secret);
/// assert!(secret.iter().all(|&b| b == 0));
/// ```
pub fn scrub_bytes(data: &mut [u8]) {
    data.zeroize();
    compiler_fence(Ordering::SeqCst);
}

/// RAII wrapper that scrubs the wrapped value on drop.
///
/// Dropping the guard wipes the value even when the owning function returns
/// early with an error.
///
/// # Example
///
/// ```
/// use sealbox::memory::scrub::ScrubGuard;
///
/// {
///     let plaintext = ScrubGuard::new(vec![0x42; 256]);
///     assert_eq!(plaintext[0], 0x42);
/// } // wiped here
/// ```
pub struct ScrubGuard<T: Zeroize> {
    value: T,
}

impl<T: Zeroize> ScrubGuard<T> {
    /// Create a new scrub guard wrapping the value.
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Zeroize> Drop for ScrubGuard<T> {
    fn drop(&mut self) {
        self.value.zeroize();
        compiler_fence(Ordering::SeqCst);
    }
}

impl<T: Zeroize> Deref for ScrubGuard<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T: Zeroize> DerefMut for ScrubGuard<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.value
    }
}
