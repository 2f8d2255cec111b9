//! Atomic, cell and spin primitives used by the lock-free paths.
//!
//! With the `loom` feature these resolve to loom's model-checked versions so
//! the soft lock, the freeze protocol and the memo's evaluation race can be
//! explored by `loom::model`. Outside of a loom model the `loom` feature must
//! stay disabled.
//!
//! [`UnsafeCell`] follows loom's closure-based API on both sides, so call
//! sites read the same with and without the feature.

#[cfg(feature = "loom")]
pub(crate) use loom::cell::UnsafeCell;
#[cfg(feature = "loom")]
pub(crate) use loom::hint::spin_loop;
#[cfg(feature = "loom")]
pub(crate) use loom::sync::atomic::{AtomicBool, AtomicU8, Ordering};
#[cfg(feature = "loom")]
pub(crate) use loom::thread::yield_now;

#[cfg(not(feature = "loom"))]
pub(crate) use std::hint::spin_loop;
#[cfg(not(feature = "loom"))]
pub(crate) use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
#[cfg(not(feature = "loom"))]
pub(crate) use std::thread::yield_now;

/// `std::cell::UnsafeCell` with loom's `with`/`with_mut` accessors.
#[cfg(not(feature = "loom"))]
#[repr(transparent)]
pub(crate) struct UnsafeCell<T>(std::cell::UnsafeCell<T>);

#[cfg(not(feature = "loom"))]
impl<T> UnsafeCell<T> {
    #[inline]
    pub(crate) const fn new(value: T) -> Self {
        Self(std::cell::UnsafeCell::new(value))
    }

    #[inline]
    pub(crate) fn with<R>(&self, function: impl FnOnce(*const T) -> R) -> R {
        function(self.0.get())
    }

    #[inline]
    pub(crate) fn with_mut<R>(&self, function: impl FnOnce(*mut T) -> R) -> R {
        function(self.0.get())
    }
}
