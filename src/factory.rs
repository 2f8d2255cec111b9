//! Shared, identity-comparable value factories.

use std::fmt;
use std::sync::Arc;

/// A cloneable handle to a function producing values of type `T`.
///
/// Clones share the same underlying closure, and [`ptr_eq`](Self::ptr_eq)
/// compares that identity. [`Semimutable`](crate::Semimutable) uses it to
/// tell whether the pending factory is still the original default one.
///
/// # Examples
///
/// ```rust
/// use semimutable::Factory;
///
/// let factory = Factory::new(|| 42);
/// let clone = factory.clone();
///
/// assert_eq!(factory.call(), 42);
/// assert!(factory.ptr_eq(&clone));
/// assert!(!factory.ptr_eq(&Factory::new(|| 42)));
/// ```
pub struct Factory<T> {
    function: Arc<dyn Fn() -> T + Send + Sync>,
}

impl<T> Factory<T> {
    /// Wraps a function as a factory.
    pub fn new<F>(function: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            function: Arc::new(function),
        }
    }

    /// Produces a value.
    #[inline]
    pub fn call(&self) -> T {
        (self.function)()
    }

    /// Returns whether both handles share the same underlying function.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        // Compare data addresses only; vtable pointers are not unique.
        std::ptr::addr_eq(Arc::as_ptr(&self.function), Arc::as_ptr(&other.function))
    }
}

impl<T: Clone + Send + Sync + 'static> Factory<T> {
    /// A factory that always returns a clone of `value`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use semimutable::Factory;
    ///
    /// let factory = Factory::constant(String::from("hello"));
    /// assert_eq!(factory.call(), "hello");
    /// ```
    pub fn constant(value: T) -> Self {
        Self::new(move || value.clone())
    }
}

impl<T: Default + 'static> Factory<T> {
    /// A factory returning `T::default()`.
    pub fn default_value() -> Self {
        Self::new(T::default)
    }
}

impl<T> Clone for Factory<T> {
    fn clone(&self) -> Self {
        Self {
            function: Arc::clone(&self.function),
        }
    }
}

impl<T> fmt::Debug for Factory<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("Factory")
            .field(&Arc::as_ptr(&self.function).cast::<()>())
            .finish()
    }
}

impl<T, F> From<F> for Factory<T>
where
    F: Fn() -> T + Send + Sync + 'static,
{
    fn from(function: F) -> Self {
        Self::new(function)
    }
}
