//! # semimutable
//!
//! Configure-then-freeze values for Rust.
//!
//! ## Overview
//!
//! Startup code often needs a setting that can be changed while the process
//! is being configured but must never change once anything has used it. This
//! crate provides that as a primitive:
//!
//! - **[`Semimutable<T>`]**: replaceable until first read, frozen forever
//!   after. Reads after the freeze are wait-free; writes after the freeze
//!   return [`LockedWriteError`].
//! - **[`SoftLock`]**: the non-blocking flag behind it. Acquisition either
//!   succeeds immediately or reports failure; nothing ever parks.
//! - **[`logger::LibraryLogger`]**: picks the `tracing` dispatcher a
//!   library logs through.
//! - **[`defaults::Defaults`]**: a registry of per-type defaults, one
//!   semimutable slot per type.
//!
//! ## Feature Flags
//!
//! - `logger`: [`logger::LibraryLogger`] (default)
//! - `defaults`: [`defaults::Defaults`] (default)
//! - `testing`: the [`testing`] escape hatch that reverses a freeze
//! - `loom`: swaps the atomics for loom's, for model checking only
//! - `full`: `logger`, `defaults` and `testing`
//!
//! ## Example
//!
//! ```rust
//! use semimutable::prelude::*;
//!
//! let retries = Semimutable::with_value(3_u32);
//! retries.set_value(5).unwrap();
//!
//! assert_eq!(*retries.value(), 5);
//! assert_eq!(retries.set_value(7), Err(LockedWriteError));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```rust
/// use semimutable::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::LockedWriteError;
    pub use crate::factory::Factory;
    pub use crate::semimutable::Semimutable;
    pub use crate::soft_lock::SoftLock;

    #[cfg(feature = "defaults")]
    pub use crate::defaults::Defaults;
    #[cfg(feature = "defaults")]
    pub use crate::error::DefaultsError;

    #[cfg(feature = "logger")]
    pub use crate::logger::LibraryLogger;
}

mod backoff;
mod error;
mod factory;
mod memo;
mod semimutable;
mod soft_lock;
mod sync;

#[cfg(feature = "defaults")]
pub mod defaults;

#[cfg(feature = "logger")]
pub mod logger;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(feature = "defaults")]
pub use crate::error::DefaultsError;
pub use crate::error::LockedWriteError;
pub use crate::factory::Factory;
pub use crate::semimutable::Semimutable;
pub use crate::soft_lock::SoftLock;
