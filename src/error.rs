//! Error types.
//!
//! A rejected write is a configuration-ordering bug in the caller: some
//! code tried to change a value after it had already been read. The errors
//! here report it synchronously and are never retried internally.

use thiserror::Error;

/// A write was attempted after the value had been locked.
///
/// Returned by every setter of [`Semimutable`](crate::Semimutable) once the
/// first read or [`lock_value`](crate::Semimutable::lock_value) has frozen it.
///
/// # Examples
///
/// ```rust
/// use semimutable::{LockedWriteError, Semimutable};
///
/// let value = Semimutable::with_value(42);
/// assert_eq!(*value.value(), 42);
/// assert_eq!(value.set_value(7), Err(LockedWriteError));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot set the value of a semimutable once it has been locked")]
pub struct LockedWriteError;

/// Errors reported by the [`Defaults`](crate::defaults::Defaults) registry.
#[cfg(feature = "defaults")]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefaultsError {
    /// The default for this type has already been read and is frozen.
    #[error("default for `{type_name}` is locked")]
    Locked {
        /// Name of the type whose default was written.
        type_name: &'static str,
        /// The underlying rejected write.
        #[source]
        source: LockedWriteError,
    },
    /// No default has been declared for this type.
    #[error("no default declared for `{type_name}`")]
    Undeclared {
        /// Name of the requested type.
        type_name: &'static str,
    },
    /// A default has already been declared for this type.
    #[error("default for `{type_name}` is already declared")]
    AlreadyDeclared {
        /// Name of the type declared twice.
        type_name: &'static str,
    },
}
