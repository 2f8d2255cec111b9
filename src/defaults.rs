//! Per-type defaults that freeze on first use.
//!
//! [`Defaults`] maps each type to one [`Semimutable`] slot. Startup code
//! declares a default for a type and may override it; the first consumer to
//! read it freezes that type's slot, and later overrides fail with
//! [`DefaultsError::Locked`].
//!
//! The map itself sits behind a [`parking_lot::RwLock`], taken only to find
//! or insert a slot. Reading or writing the value inside a slot goes through
//! the slot's own lock-free freeze protocol.
//!
//! # Examples
//!
//! ```rust
//! use semimutable::defaults::Defaults;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct RetryPolicy {
//!     attempts: u32,
//! }
//!
//! let defaults = Defaults::new();
//! defaults.declare(|| RetryPolicy { attempts: 3 }).unwrap();
//! defaults.set_value(RetryPolicy { attempts: 5 }).unwrap();
//!
//! assert_eq!(defaults.get::<RetryPolicy>().unwrap().attempts, 5);
//! assert!(defaults.set_value(RetryPolicy { attempts: 1 }).is_err());
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::error::{DefaultsError, LockedWriteError};
use crate::semimutable::Semimutable;

type Slot = Arc<dyn Any + Send + Sync>;

/// A registry of per-type [`Semimutable`] defaults.
#[derive(Default)]
pub struct Defaults {
    slots: RwLock<HashMap<TypeId, Slot>>,
}

impl Defaults {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    ///
    /// Created once on first access and never replaced. Tests reset it
    /// between cases with [`clear`](Self::clear), or build an isolated
    /// registry with [`new`](Self::new).
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<Defaults> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Declares the default for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DefaultsError::AlreadyDeclared`] if `T` already has a slot.
    pub fn declare<T, F>(&self, default: F) -> Result<(), DefaultsError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        match self.slots.write().entry(TypeId::of::<T>()) {
            Entry::Occupied(_) => Err(DefaultsError::AlreadyDeclared {
                type_name: type_name::<T>(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Semimutable::new(default)));
                tracing::debug!(
                    target: "semimutable::defaults",
                    value_type = type_name::<T>(),
                    "default declared"
                );
                Ok(())
            }
        }
    }

    /// Declares `T::default()` as the default for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DefaultsError::AlreadyDeclared`] if `T` already has a slot.
    pub fn declare_default<T>(&self) -> Result<(), DefaultsError>
    where
        T: Default + Send + Sync + 'static,
    {
        self.declare(T::default)
    }

    /// The slot holding the default for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DefaultsError::Undeclared`] if no default was declared.
    pub fn slot<T>(&self) -> Result<Arc<Semimutable<T>>, DefaultsError>
    where
        T: Send + Sync + 'static,
    {
        let slot = self
            .slots
            .read()
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or_else(|| DefaultsError::Undeclared {
                type_name: type_name::<T>(),
            })?;

        // Slots are keyed by the TypeId of their own value type.
        Ok(slot
            .downcast::<Semimutable<T>>()
            .unwrap_or_else(|_| unreachable!("defaults slot stored under a foreign TypeId")))
    }

    /// Overrides the default for `T` with `function`.
    ///
    /// # Errors
    ///
    /// Returns [`DefaultsError::Undeclared`] if no default was declared and
    /// [`DefaultsError::Locked`] if it has already been read.
    pub fn set<T, F>(&self, function: F) -> Result<(), DefaultsError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let slot = self.slot::<T>()?;
        slot.set_with(function).map_err(locked::<T>)
    }

    /// Overrides the default for `T` with `value`.
    ///
    /// # Errors
    ///
    /// Returns [`DefaultsError::Undeclared`] if no default was declared and
    /// [`DefaultsError::Locked`] if it has already been read.
    pub fn set_value<T>(&self, value: T) -> Result<(), DefaultsError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let slot = self.slot::<T>()?;
        slot.set_value(value).map_err(locked::<T>)
    }

    /// Restores the declared default for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DefaultsError::Undeclared`] if no default was declared and
    /// [`DefaultsError::Locked`] if it has already been read.
    pub fn reset<T>(&self) -> Result<(), DefaultsError>
    where
        T: Send + Sync + 'static,
    {
        let slot = self.slot::<T>()?;
        slot.reset_value().map_err(locked::<T>)
    }

    /// Reads the default for `T`, freezing it.
    ///
    /// # Errors
    ///
    /// Returns [`DefaultsError::Undeclared`] if no default was declared.
    pub fn get<T>(&self) -> Result<T, DefaultsError>
    where
        T: Clone + Send + Sync + 'static,
    {
        Ok(self.slot::<T>()?.value().clone())
    }

    /// Returns whether a default is declared for `T`.
    pub fn is_declared<T: 'static>(&self) -> bool {
        self.slots.read().contains_key(&TypeId::of::<T>())
    }

    /// Returns whether the default for `T` has been frozen.
    ///
    /// Undeclared types report `false`.
    pub fn is_locked<T>(&self) -> bool
    where
        T: Send + Sync + 'static,
    {
        self.slot::<T>().is_ok_and(|slot| slot.is_locked())
    }

    /// Number of declared types.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Returns whether no type has been declared.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Drops every slot, so every type can be declared again.
    ///
    /// Slots already handed out by [`slot`](Self::slot) keep working, frozen
    /// or not, but are no longer reachable through the registry.
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *self.slots.write());
        tracing::debug!(
            target: "semimutable::defaults",
            slots = dropped.len(),
            "defaults cleared"
        );
    }
}

impl fmt::Debug for Defaults {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Defaults")
            .field("declared", &self.len())
            .finish()
    }
}

fn locked<T>(source: LockedWriteError) -> DefaultsError {
    DefaultsError::Locked {
        type_name: type_name::<T>(),
        source,
    }
}
