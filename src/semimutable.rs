#![allow(unsafe_code)]
//! Values that are mutable until first read, then frozen.
//!
//! A [`Semimutable<T>`] starts out holding a *pending* factory that can be
//! replaced at will. The first read (or an explicit
//! [`lock_value`](Semimutable::lock_value)) freezes it: the pending factory
//! moves into the *locked* slot, is evaluated at most once, and every later
//! write is rejected with [`LockedWriteError`].
//!
//! # Freeze protocol
//!
//! Readers and writers contend for one [`SoftLock`] guarding the pending
//! slot:
//!
//! - a writer acquires it, swaps the pending factory and releases it;
//! - the reader that freezes acquires it, moves the pending factory into
//!   the locked slot and never releases it.
//!
//! The unreleased soft lock is what keeps every later writer out. A writer
//! that finds the locked slot populated fails at once instead of retrying,
//! since no retry could succeed. Neither side ever parks a thread: losing
//! the soft lock means a short spin with backoff while the holder swaps a
//! pointer.
//!
//! # Safety
//!
//! The following invariants are maintained:
//! - `pending` is only read or written by the holder of `soft_lock`, or
//!   through `&mut self`
//! - `locked` is written once, by the freezing reader while it holds
//!   `soft_lock`, before `frozen` is published with `Release`
//! - `locked` is only read after `frozen` is observed with `Acquire`, and
//!   only cleared again through `&mut self`
//!
//! # Examples
//!
//! ```rust
//! use semimutable::Semimutable;
//!
//! let level = Semimutable::with_value(42);
//! level.set_value(7).unwrap();
//!
//! assert_eq!(*level.value(), 7);
//! assert!(level.set_value(8).is_err());
//! ```

use std::any::type_name;
use std::fmt;

use crate::backoff::Backoff;
use crate::error::LockedWriteError;
use crate::factory::Factory;
use crate::memo::Memo;
use crate::soft_lock::SoftLock;
use crate::sync::{AtomicBool, Ordering, UnsafeCell};

/// A value that can be replaced until it is first read, and never after.
///
/// # Thread Safety
///
/// `Semimutable<T>` is `Sync` when `T: Send + Sync`. After the freeze,
/// [`value`](Self::value) is wait-free: one atomic load for the locked slot
/// and one for the evaluated value.
///
/// Racing writes against the first read is allowed but not deterministic:
/// whichever factory is pending when the freeze wins the soft lock becomes
/// the value, and a racing writer sees either `Ok(())` or
/// [`LockedWriteError`].
///
/// # Examples
///
/// ```rust
/// use semimutable::Semimutable;
///
/// let greeting = Semimutable::new(|| String::from("default"));
/// assert!(greeting.has_default_value());
///
/// assert_eq!(greeting.value(), "default");
/// assert!(greeting.set_with(|| String::from("other")).is_err());
/// ```
pub struct Semimutable<T> {
    soft_lock: SoftLock,
    pending: UnsafeCell<Option<Factory<T>>>,
    locked: UnsafeCell<Option<Memo<T>>>,
    frozen: AtomicBool,
    default_factory: Factory<T>,
    has_default_value: AtomicBool,
}

// # Safety
//
// - `pending` is only touched by the soft lock holder, which gives exclusive
//   access across threads; Acquire/Release on the soft lock orders those
//   accesses
// - `locked` is immutable while shared once `frozen` is published, and the
//   memo inside hands out `&T` to every thread, hence T: Send + Sync
unsafe impl<T: Send + Sync> Send for Semimutable<T> {}
unsafe impl<T: Send + Sync> Sync for Semimutable<T> {}

impl<T> Semimutable<T> {
    /// Creates an unlocked value whose default comes from `default`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use semimutable::Semimutable;
    ///
    /// let value = Semimutable::new(|| vec![1, 2, 3]);
    /// assert!(!value.is_locked());
    /// assert_eq!(value.value(), &[1, 2, 3]);
    /// ```
    pub fn new<F>(default: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::from_factory(Factory::new(default))
    }

    /// Creates an unlocked value with an existing default factory.
    pub fn from_factory(default_factory: Factory<T>) -> Self {
        Self {
            soft_lock: SoftLock::new(),
            pending: UnsafeCell::new(Some(default_factory.clone())),
            locked: UnsafeCell::new(None),
            frozen: AtomicBool::new(false),
            default_factory,
            has_default_value: AtomicBool::new(true),
        }
    }

    /// Returns the value, freezing it on first call.
    ///
    /// The first call moves the pending factory into the locked slot and
    /// evaluates it; every later call returns the same reference without
    /// synchronization beyond two atomic loads.
    ///
    /// # Panics
    ///
    /// Propagates a panic from the frozen factory. The value is poisoned
    /// afterwards and every later call panics too.
    pub fn value(&self) -> &T {
        self.freeze().force()
    }

    /// Freezes and evaluates the value without returning it.
    ///
    /// Calling this on an already locked value only re-reads the cached
    /// value.
    ///
    /// # Panics
    ///
    /// Propagates a panic from the frozen factory, like [`value`](Self::value).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use semimutable::Semimutable;
    ///
    /// let value = Semimutable::with_value(1);
    /// value.lock_value();
    ///
    /// assert!(value.is_locked());
    /// assert!(value.set_value(2).is_err());
    /// assert_eq!(*value.value(), 1);
    /// ```
    pub fn lock_value(&self) {
        let _ = self.value();
    }

    /// Installs a new pending factory.
    ///
    /// Passing [`default_factory`](Self::default_factory) (or a clone of it)
    /// marks the value as default again.
    ///
    /// # Errors
    ///
    /// Returns [`LockedWriteError`] if the value is already locked.
    pub fn set_factory(&self, factory: Factory<T>) -> Result<(), LockedWriteError> {
        let mut backoff = Backoff::new();

        loop {
            if self.is_locked() {
                tracing::debug!(
                    target: "semimutable",
                    value_type = type_name::<T>(),
                    "rejected write to a locked semimutable"
                );
                return Err(LockedWriteError);
            }

            if self.soft_lock.try_acquire() {
                let is_default = factory.ptr_eq(&self.default_factory);
                // SAFETY: holding the soft lock gives exclusive access to pending.
                let previous = self
                    .pending
                    .with_mut(|pending| unsafe { (*pending).replace(factory) });
                self.has_default_value.store(is_default, Ordering::Release);
                self.soft_lock.release();

                // Dropped outside the critical section: captured state may run
                // arbitrary code on drop.
                drop(previous);
                return Ok(());
            }

            backoff.snooze();
        }
    }

    /// Installs `function` as the new pending factory.
    ///
    /// # Errors
    ///
    /// Returns [`LockedWriteError`] if the value is already locked.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use semimutable::Semimutable;
    ///
    /// let value = Semimutable::new(|| 1);
    /// value.set_with(|| 2).unwrap();
    /// assert!(!value.has_default_value());
    /// assert_eq!(*value.value(), 2);
    /// ```
    pub fn set_with<F>(&self, function: F) -> Result<(), LockedWriteError>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.set_factory(Factory::new(function))
    }

    /// Reinstalls the original default factory.
    ///
    /// # Errors
    ///
    /// Returns [`LockedWriteError`] if the value is already locked.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use semimutable::Semimutable;
    ///
    /// let value = Semimutable::with_value("default");
    /// value.set_value("custom").unwrap();
    /// value.reset_value().unwrap();
    ///
    /// assert!(value.has_default_value());
    /// assert_eq!(*value.value(), "default");
    /// ```
    pub fn reset_value(&self) -> Result<(), LockedWriteError> {
        self.set_factory(self.default_factory.clone())
    }

    /// Returns whether the value has been frozen.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Returns whether the pending (or, once locked, the frozen) factory is
    /// the original default factory.
    #[inline]
    pub fn has_default_value(&self) -> bool {
        self.has_default_value.load(Ordering::Acquire)
    }

    /// The factory this value was constructed with.
    #[inline]
    pub const fn default_factory(&self) -> &Factory<T> {
        &self.default_factory
    }

    /// Returns the frozen value if it has already been evaluated.
    ///
    /// Unlike [`value`](Self::value) this never freezes or evaluates.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.locked_memo().and_then(Memo::get)
    }

    /// Returns whether evaluating the frozen factory panicked.
    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.locked_memo().is_some_and(Memo::is_poisoned)
    }

    /// Consumes the semimutable and returns its value.
    ///
    /// An unlocked value is resolved from its pending factory, exactly as a
    /// freeze would.
    ///
    /// # Panics
    ///
    /// Panics if the value is poisoned or the factory panics.
    pub fn into_inner(self) -> T {
        // SAFETY: owning `self` gives exclusive access to both slots.
        if let Some(memo) = self.locked.with_mut(|locked| unsafe { (*locked).take() }) {
            return memo.into_value();
        }

        self.pending
            .with_mut(|pending| unsafe { (*pending).take() })
            .unwrap_or(self.default_factory)
            .call()
    }

    /// The locked slot, once the freeze has been published.
    fn locked_memo(&self) -> Option<&Memo<T>> {
        if self.frozen.load(Ordering::Acquire) {
            // SAFETY: `locked` was written before `frozen` was published with
            // Release and is not written again while shared.
            self.locked.with(|locked| unsafe { (*locked).as_ref() })
        } else {
            None
        }
    }

    /// Runs the read side of the freeze protocol and returns the locked slot.
    fn freeze(&self) -> &Memo<T> {
        let mut backoff = Backoff::new();

        loop {
            if let Some(memo) = self.locked_memo() {
                return memo;
            }

            if self.soft_lock.try_acquire() {
                // The soft lock is never released from here on: it now stands
                // for "frozen" to every writer.
                // SAFETY: holding the soft lock gives exclusive access to
                // pending, and `frozen` is still unpublished so no reader
                // looks at `locked`.
                let Some(factory) = self.pending.with_mut(|pending| unsafe { (*pending).take() })
                else {
                    unreachable!("pending factory missing while unlocked");
                };
                self.locked.with_mut(|locked| unsafe {
                    *locked = Some(Memo::new(factory));
                });
                self.frozen.store(true, Ordering::Release);

                tracing::trace!(
                    target: "semimutable",
                    value_type = type_name::<T>(),
                    has_default_value = self.has_default_value(),
                    "semimutable frozen"
                );
                continue;
            }

            backoff.snooze();
        }
    }

    /// Reverses the freeze: the locked factory becomes pending again.
    ///
    /// `&mut self` guarantees no reference returned by `value` survives.
    #[cfg(any(test, feature = "testing"))]
    pub(crate) fn unlock_for_testing(&mut self) {
        // SAFETY: `&mut self` gives exclusive access to both slots.
        if let Some(memo) = self.locked.with_mut(|locked| unsafe { (*locked).take() }) {
            self.pending.with_mut(|pending| unsafe {
                *pending = Some(memo.into_factory());
            });
            self.frozen.store(false, Ordering::Release);
            self.soft_lock.release();

            tracing::trace!(
                target: "semimutable",
                value_type = type_name::<T>(),
                "semimutable unlocked for testing"
            );
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Semimutable<T> {
    /// Creates an unlocked value defaulting to `value`.
    pub fn with_value(value: T) -> Self {
        Self::from_factory(Factory::constant(value))
    }

    /// Installs `value` as the new pending value.
    ///
    /// # Errors
    ///
    /// Returns [`LockedWriteError`] if the value is already locked.
    pub fn set_value(&self, value: T) -> Result<(), LockedWriteError> {
        self.set_factory(Factory::constant(value))
    }
}

impl<T: Default + 'static> Default for Semimutable<T> {
    /// Creates an unlocked value defaulting to `T::default()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use semimutable::Semimutable;
    ///
    /// let value: Semimutable<u32> = Semimutable::default();
    /// assert_eq!(*value.value(), 0);
    /// ```
    fn default() -> Self {
        Self::from_factory(Factory::default_value())
    }
}

impl<T: fmt::Debug> fmt::Debug for Semimutable<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = formatter.debug_struct("Semimutable");
        debug
            .field("locked", &self.is_locked())
            .field("has_default_value", &self.has_default_value());

        match self.get() {
            Some(value) => debug.field("value", value),
            None => debug.field("value", &format_args!("<unevaluated>")),
        };

        debug.finish()
    }
}
