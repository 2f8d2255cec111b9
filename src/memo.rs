#![allow(unsafe_code)]
//! Evaluate-once cell for the factory a semimutable was frozen with.
//!
//! # Safety
//!
//! The following invariants are maintained:
//! - `value` is only initialized when `state` is `STATE_READY`
//! - only the thread that moved `state` from `STATE_EMPTY` to
//!   `STATE_COMPUTING` via `compare_exchange` writes `value`
//! - `STATE_READY` is published with `Release` and observed with `Acquire`

use std::mem::MaybeUninit;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

use crate::backoff::Backoff;
use crate::factory::Factory;
use crate::sync::{AtomicU8, Ordering, UnsafeCell};

/// State: not yet evaluated
const STATE_EMPTY: u8 = 0;
/// State: evaluation in progress
const STATE_COMPUTING: u8 = 1;
/// State: evaluation complete
const STATE_READY: u8 = 2;
/// State: evaluation panicked
const STATE_POISONED: u8 = 3;

/// Holds a factory and the single value it is ever evaluated to.
///
/// Unlike a plain lazy cell the factory is kept after evaluation, so a
/// frozen semimutable can hand it back when it is unlocked for testing.
///
/// # Re-entry Warning
///
/// Forcing a memo from inside its own factory on the same thread spins
/// forever: the thread waits for an evaluation only it could finish.
pub(crate) struct Memo<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
    factory: Factory<T>,
}

// # Safety
//
// - T: Send: the evaluated value may be produced on one thread and dropped
//   on another
// - T: Sync: `force` hands out `&T` to every thread sharing the memo
// - `value` is written exactly once, by the thread that won the
//   STATE_EMPTY -> STATE_COMPUTING transition, before STATE_READY is
//   published with Release ordering
unsafe impl<T: Send + Sync> Send for Memo<T> {}
unsafe impl<T: Send + Sync> Sync for Memo<T> {}

impl<T> Memo<T> {
    pub(crate) fn new(factory: Factory<T>) -> Self {
        Self {
            state: AtomicU8::new(STATE_EMPTY),
            value: UnsafeCell::new(MaybeUninit::uninit()),
            factory,
        }
    }

    /// Evaluates the factory on first call and returns the cached value.
    ///
    /// Concurrent callers spin until the evaluating thread publishes the
    /// value, so the factory runs at most once.
    ///
    /// # Panics
    ///
    /// Propagates a panic from the factory, after which the memo is
    /// poisoned and every later call panics.
    pub(crate) fn force(&self) -> &T {
        let mut state = self.state.load(Ordering::Acquire);
        let mut backoff = Backoff::new();

        loop {
            match state {
                STATE_READY => {
                    // SAFETY: STATE_READY is stored with Release after the
                    // value is written; the Acquire load makes it visible.
                    return unsafe { self.ready_value() };
                }
                STATE_POISONED => {
                    panic!("semimutable value factory panicked during evaluation");
                }
                STATE_EMPTY => {
                    match self.state.compare_exchange_weak(
                        STATE_EMPTY,
                        STATE_COMPUTING,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => return self.evaluate(),
                        Err(current_state) => state = current_state,
                    }
                }
                STATE_COMPUTING => {
                    backoff.snooze();
                    state = self.state.load(Ordering::Acquire);
                }
                _ => unreachable!("invalid memo state"),
            }
        }
    }

    /// Must only be called after winning the transition to `STATE_COMPUTING`.
    fn evaluate(&self) -> &T {
        match catch_unwind(AssertUnwindSafe(|| self.factory.call())) {
            Ok(value) => {
                // SAFETY: only the thread in STATE_COMPUTING reaches here and
                // value is still uninitialized.
                self.value.with_mut(|slot| unsafe {
                    (*slot).write(value);
                });
                self.state.store(STATE_READY, Ordering::Release);

                // SAFETY: initialized just above.
                unsafe { self.ready_value() }
            }
            Err(payload) => {
                self.state.store(STATE_POISONED, Ordering::Release);
                resume_unwind(payload)
            }
        }
    }

    /// # Safety
    ///
    /// `state` must have been observed as `STATE_READY`.
    unsafe fn ready_value(&self) -> &T {
        // SAFETY: guaranteed by the caller; the value is never written again
        // while the memo is shared.
        self.value.with(|slot| unsafe { (*slot).assume_init_ref() })
    }

    /// The evaluated value, without triggering evaluation.
    #[inline]
    pub(crate) fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == STATE_READY {
            // SAFETY: STATE_READY means value is initialized.
            Some(unsafe { self.ready_value() })
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn is_poisoned(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_POISONED
    }

    #[cfg(test)]
    #[inline]
    pub(crate) const fn factory(&self) -> &Factory<T> {
        &self.factory
    }

    /// Gives the factory back, dropping any evaluated value.
    #[cfg(any(test, feature = "testing"))]
    pub(crate) fn into_factory(self) -> Factory<T> {
        self.factory.clone()
    }

    /// Takes the value out, evaluating the factory if nobody has yet.
    ///
    /// # Panics
    ///
    /// Panics if a previous evaluation panicked, or if the factory panics now.
    pub(crate) fn into_value(self) -> T {
        match self.state.load(Ordering::Acquire) {
            STATE_READY => {
                // The value is moved out below, so Drop must not see it as ready.
                self.state.store(STATE_EMPTY, Ordering::Relaxed);
                // SAFETY: the state was STATE_READY, so value is initialized,
                // and owning `self` gives exclusive access.
                self.value.with_mut(|slot| unsafe { (*slot).assume_init_read() })
            }
            STATE_POISONED => {
                panic!("semimutable value factory panicked during evaluation");
            }
            _ => self.factory.call(),
        }
    }
}

impl<T> Drop for Memo<T> {
    fn drop(&mut self) {
        if self.state.load(Ordering::Acquire) == STATE_READY {
            // SAFETY: STATE_READY means value is initialized, and &mut self
            // guarantees exclusive access.
            self.value.with_mut(|slot| unsafe {
                (*slot).assume_init_drop();
            });
        }
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::thread;

    fn counting_factory(counter: &Arc<AtomicUsize>) -> Factory<usize> {
        let counter = Arc::clone(counter);
        Factory::new(move || counter.fetch_add(1, AtomicOrdering::SeqCst) + 100)
    }

    #[rstest]
    fn test_memo_defers_evaluation() {
        let counter = Arc::new(AtomicUsize::new(0));
        let memo = Memo::new(counting_factory(&counter));
        assert!(memo.get().is_none());
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 0);
    }

    #[rstest]
    fn test_memo_force_evaluates_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let memo = Memo::new(counting_factory(&counter));

        assert_eq!(*memo.force(), 100);
        assert_eq!(*memo.force(), 100);
        assert_eq!(memo.get(), Some(&100));
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 1);
    }

    #[rstest]
    fn test_memo_force_returns_same_reference() {
        let memo = Memo::new(Factory::new(|| String::from("frozen")));
        let first: *const String = memo.force();
        let second: *const String = memo.force();
        assert_eq!(first, second);
    }

    #[rstest]
    fn test_memo_concurrent_force_evaluates_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let memo = Arc::new(Memo::new(counting_factory(&counter)));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let memo = Arc::clone(&memo);
                thread::spawn(move || *memo.force())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 100);
        }
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 1);
    }

    #[rstest]
    fn test_memo_poisoned_after_panic() {
        let memo: Memo<i32> = Memo::new(Factory::new(|| -> i32 { panic!("factory failed") }));

        let first = std::panic::catch_unwind(AssertUnwindSafe(|| *memo.force()));
        assert!(first.is_err());
        assert!(memo.is_poisoned());

        let second = std::panic::catch_unwind(AssertUnwindSafe(|| *memo.force()));
        assert!(second.is_err());
    }

    #[rstest]
    fn test_memo_into_value_after_force() {
        let counter = Arc::new(AtomicUsize::new(0));
        let memo = Memo::new(counting_factory(&counter));
        let _ = memo.force();
        assert_eq!(memo.into_value(), 100);
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 1);
    }

    #[rstest]
    fn test_memo_into_value_unevaluated() {
        let memo = Memo::new(Factory::new(|| 5));
        assert_eq!(memo.into_value(), 5);
    }

    #[rstest]
    fn test_memo_into_factory_keeps_identity() {
        let factory = Factory::new(|| 1);
        let memo = Memo::new(factory.clone());
        let _ = memo.force();
        assert!(memo.factory().ptr_eq(&factory));
        assert!(memo.into_factory().ptr_eq(&factory));
    }

    #[rstest]
    fn test_memo_drops_evaluated_value_once() {
        struct DropTracker {
            dropped: Arc<AtomicUsize>,
        }
        impl Drop for DropTracker {
            fn drop(&mut self) {
                self.dropped.fetch_add(1, AtomicOrdering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicUsize::new(0));
        let dropped_clone = Arc::clone(&dropped);
        let memo = Memo::new(Factory::new(move || DropTracker {
            dropped: Arc::clone(&dropped_clone),
        }));

        let _ = memo.force();
        assert_eq!(dropped.load(AtomicOrdering::SeqCst), 0);

        drop(memo);
        assert_eq!(dropped.load(AtomicOrdering::SeqCst), 1);
    }
}
