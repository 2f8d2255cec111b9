//! Non-blocking mutual exclusion flag.
//!
//! A [`SoftLock`] never parks a thread. A caller that cannot acquire it is
//! told so immediately and picks its own fallback: spin and retry, or skip
//! the critical section altogether.
//!
//! # Examples
//!
//! ```rust
//! use semimutable::SoftLock;
//!
//! let lock = SoftLock::new();
//!
//! assert!(lock.try_acquire());
//! assert!(!lock.try_acquire());
//!
//! lock.release();
//! assert!(lock.try_acquire());
//! ```

use std::fmt;

use crate::sync::{AtomicBool, Ordering};

/// A single acquired/free flag with test-and-set acquisition.
///
/// # Contract
///
/// Only the caller whose [`try_acquire`](Self::try_acquire) returned `true`
/// may call [`release`](Self::release). The lock does not record its owner,
/// so releasing without owning it silently frees somebody else's critical
/// section. Acquiring twice without releasing simply fails the second time.
pub struct SoftLock {
    acquired: AtomicBool,
}

impl SoftLock {
    /// Creates a free lock.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            acquired: AtomicBool::new(false),
        }
    }

    /// Attempts to move the flag from free to acquired.
    ///
    /// Returns `true` iff this call performed the transition and the caller
    /// now owns the lock. Never blocks.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use semimutable::SoftLock;
    ///
    /// let lock = SoftLock::new();
    /// assert!(lock.try_acquire());
    /// assert!(lock.is_lock_acquired());
    /// ```
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.acquired
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Resets the flag to free, whoever acquired it.
    #[inline]
    pub fn release(&self) {
        self.acquired.store(false, Ordering::Release);
    }

    /// Returns whether the flag is currently acquired.
    #[inline]
    pub fn is_lock_acquired(&self) -> bool {
        self.acquired.load(Ordering::Acquire)
    }
}

impl Default for SoftLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SoftLock {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SoftLock")
            .field("acquired", &self.is_lock_acquired())
            .finish()
    }
}
