//! Memory protection utilities for keeping key material out of swap.
//!
//! This module provides cross-platform memory locking using:
//! - Linux/macOS: `mlock(2)` / `munlock(2)`
//! - Windows: `VirtualLock()` / `VirtualUnlock()`
//!
//! Memory locking prevents the OS from swapping sealed keys to disk, which
//! could leave traces in swap files or hibernation images. Locking is best
//! effort: a container with a tight `RLIMIT_MEMLOCK` still works, it just
//! loses the no-swap guarantee.

pub mod scrub;

use std::ops::{Deref, DerefMut};
use zeroize::Zeroize;

#[cfg(unix)]
use libc::{mlock, munlock};

#[cfg(windows)]
use winapi::um::memoryapi::{VirtualLock, VirtualUnlock};

/// A wrapper that locks memory pages to prevent swapping to disk.
///
/// The data is zeroized and the pages unlocked when the wrapper drops.
pub struct LockedMemory<T: Zeroize> {
    data: T,
    locked: bool,
}

impl<T: Zeroize> LockedMemory<T> {
    /// Creates a locked memory region, proceeding unlocked if the system
    /// refuses (permissions, `RLIMIT_MEMLOCK`).
    ///
    /// The returned bool reports whether locking succeeded.
    pub fn new_best_effort(data: T) -> (Self, bool) {
        let mut mem = Self { data, locked: false };
        let ok = mem.lock();
        (mem, ok)
    }

    fn lock(&mut self) -> bool {
        let ptr = &self.data as *const T as *const u8;
        let len = std::mem::size_of::<T>();
        if len == 0 {
            return false;
        }

        #[cfg(unix)]
        {
            // SAFETY: locking memory we own; ptr/len cover exactly `data`
            let rc = unsafe { mlock(ptr as *const libc::c_void, len) };
            self.locked = rc == 0;
        }

        #[cfg(windows)]
        {
            // SAFETY: locking memory we own; ptr/len cover exactly `data`
            let rc = unsafe { VirtualLock(ptr as *mut winapi::ctypes::c_void, len) };
            self.locked = rc != 0;
        }

        #[cfg(not(any(unix, windows)))]
        {
            let _ = ptr;
        }

        self.locked
    }

    fn unlock(&mut self) {
        if !self.locked {
            return;
        }

        let ptr = &self.data as *const T as *const u8;
        let len = std::mem::size_of::<T>();

        #[cfg(unix)]
        // SAFETY: unlocking memory we previously locked
        unsafe {
            munlock(ptr as *const libc::c_void, len);
        }

        #[cfg(windows)]
        // SAFETY: unlocking memory we previously locked
        unsafe {
            VirtualUnlock(ptr as *mut winapi::ctypes::c_void, len);
        }

        self.locked = false;
    }

    /// Returns whether the memory is currently locked.
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl<T: Zeroize> Deref for LockedMemory<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T: Zeroize> DerefMut for LockedMemory<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl<T: Zeroize> Drop for LockedMemory<T> {
    fn drop(&mut self) {
        self.data.zeroize();
        self.unlock();
    }
}
