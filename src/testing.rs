//! Test-support escape hatch.
//!
//! Production code treats a frozen [`Semimutable`] as immutable forever.
//! Test harnesses sometimes need to reconfigure one between cases; this
//! module, compiled only with the `testing` feature, reverses the freeze.
//!
//! Every operation takes `&mut`, so no reference obtained from
//! [`Semimutable::value`] can still be alive when the value changes.
//!
//! # Examples
//!
//! ```rust
//! # #[cfg(feature = "testing")]
//! # {
//! use semimutable::Semimutable;
//! use semimutable::testing::TestSupport;
//!
//! let mut value = Semimutable::with_value(1);
//! assert_eq!(*value.value(), 1);
//!
//! value.unlock_value();
//! value.set_value(2).unwrap();
//! assert_eq!(*value.value(), 2);
//! # }
//! ```

use crate::semimutable::Semimutable;

/// Reverses the freeze of `value`.
///
/// The frozen factory becomes pending again, the locked slot is cleared and
/// writes succeed until the next read. The evaluated value is dropped, so
/// the factory runs again on the next read. Does nothing if `value` is not
/// locked.
pub fn unlock_value<T>(value: &mut Semimutable<T>) {
    value.unlock_for_testing();
}

/// Method-call syntax for the test-support operations.
pub trait TestSupport {
    /// Reverses a freeze so the value can be written again.
    fn unlock_value(&mut self);
}

impl<T> TestSupport for Semimutable<T> {
    fn unlock_value(&mut self) {
        self.unlock_for_testing();
    }
}

#[cfg(feature = "logger")]
impl TestSupport for crate::logger::LibraryLogger {
    fn unlock_value(&mut self) {
        self.selection_mut().unlock_for_testing();
    }
}
