//! Logger selection for libraries.
//!
//! A library that logs through [`tracing`] should not install a global
//! subscriber on behalf of its host application. Instead it routes its
//! events through a [`LibraryLogger`]: the application picks the dispatcher
//! during startup, and the choice freezes the first time the library logs.
//!
//! # Examples
//!
//! ```rust
//! use semimutable::logger::LibraryLogger;
//!
//! let logger = LibraryLogger::new();
//! logger.set_dispatch(tracing::Dispatch::none()).unwrap();
//!
//! logger.in_scope(|| tracing::info!("routed through the selected dispatcher"));
//!
//! // The selection is frozen now.
//! assert!(logger.is_locked());
//! assert!(logger.reset().is_err());
//! ```

use std::sync::OnceLock;

use tracing::{Dispatch, Subscriber};

use crate::error::LockedWriteError;
use crate::semimutable::Semimutable;

/// A configure-then-freeze choice of [`Dispatch`].
///
/// Defaults to [`Dispatch::none`], so a library stays silent until the host
/// application opts in.
#[derive(Debug)]
pub struct LibraryLogger {
    selection: Semimutable<Dispatch>,
}

impl LibraryLogger {
    /// Creates a logger selection defaulting to the silent dispatcher.
    pub fn new() -> Self {
        Self {
            selection: Semimutable::new(Dispatch::none),
        }
    }

    /// The process-wide logger selection.
    ///
    /// Created once on first access and never reset: references returned by
    /// [`dispatch`](Self::dispatch) live for the rest of the process, so its
    /// frozen selection cannot be reversed, not even with the `testing`
    /// feature. Tests that need to reconfigure a logger
    /// construct their own instance with [`new`](Self::new).
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<LibraryLogger> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Selects `dispatch` for all later library events.
    ///
    /// # Errors
    ///
    /// Returns [`LockedWriteError`] if the library has already logged.
    pub fn set_dispatch(&self, dispatch: Dispatch) -> Result<(), LockedWriteError> {
        self.selection.set_value(dispatch)?;
        tracing::debug!(target: "semimutable::logger", "library logger dispatch replaced");
        Ok(())
    }

    /// Selects `subscriber` for all later library events.
    ///
    /// # Errors
    ///
    /// Returns [`LockedWriteError`] if the library has already logged.
    pub fn set_subscriber<S>(&self, subscriber: S) -> Result<(), LockedWriteError>
    where
        S: Subscriber + Send + Sync + 'static,
    {
        self.set_dispatch(Dispatch::new(subscriber))
    }

    /// Goes back to the silent default dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`LockedWriteError`] if the library has already logged.
    pub fn reset(&self) -> Result<(), LockedWriteError> {
        self.selection.reset_value()?;
        tracing::debug!(target: "semimutable::logger", "library logger reset to default");
        Ok(())
    }

    /// The selected dispatcher. Freezes the selection.
    pub fn dispatch(&self) -> &Dispatch {
        self.selection.value()
    }

    /// Runs `function` with the selected dispatcher as the thread's default.
    ///
    /// Freezes the selection.
    pub fn in_scope<R>(&self, function: impl FnOnce() -> R) -> R {
        tracing::dispatcher::with_default(self.dispatch(), function)
    }

    /// Returns whether the selection is frozen.
    pub fn is_locked(&self) -> bool {
        self.selection.is_locked()
    }

    /// Returns whether the silent default is (still) selected.
    pub fn is_default(&self) -> bool {
        self.selection.has_default_value()
    }

    #[cfg(any(test, feature = "testing"))]
    pub(crate) fn selection_mut(&mut self) -> &mut Semimutable<Dispatch> {
        &mut self.selection
    }
}

impl Default for LibraryLogger {
    fn default() -> Self {
        Self::new()
    }
}
