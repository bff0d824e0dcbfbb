//! Optional behaviours a pooled object can expose to its pool
//!
//! Every pooled type implements [`Poolable`]. The pool never requires more than that; it asks
//! the object at runtime whether it can reset itself or needs explicit disposal, and only does
//! so when the object is returned or discarded.

use async_trait::async_trait;

use crate::errors::DisposeError;

/// A type that can be stored in an [`ObjectPool`](crate::ObjectPool)
///
/// All capability queries default to `None`, so most types only need an empty impl:
///
/// ```
/// use orion_objectpool::Poolable;
///
/// #[derive(Default)]
/// struct Person {
///     name: String,
///     age: u32,
/// }
///
/// impl Poolable for Person {}
/// ```
pub trait Poolable: Send + 'static {
    /// The in-place reset behaviour consulted by the default return validator
    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        None
    }

    /// Synchronous cleanup run when the pool discards the object
    fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
        None
    }

    /// Asynchronous cleanup, preferred by the async pool operations
    fn as_async_disposable(&mut self) -> Option<&mut dyn AsyncDisposable> {
        None
    }
}

/// Restores an object to a reusable state
pub trait Resettable {
    /// Returns `false` if the object could not be reset and must not be reused.
    fn try_reset(&mut self) -> bool;
}

/// Releases resources held by an object the pool is about to drop
pub trait Disposable {
    fn dispose(&mut self) -> Result<(), DisposeError>;
}

/// Async counterpart of [`Disposable`]
#[async_trait]
pub trait AsyncDisposable: Send {
    async fn dispose_async(&mut self) -> Result<(), DisposeError>;
}

/// Runs the synchronous disposal hook, if the object has one.
pub(crate) fn dispose<T: Poolable>(mut obj: T) -> Result<(), DisposeError> {
    match obj.as_disposable() {
        Some(d) => d.dispose(),
        None => Ok(()),
    }
}

/// Prefers the async hook and falls back to the sync one.
pub(crate) async fn dispose_async<T: Poolable>(mut obj: T) -> Result<(), DisposeError> {
    if let Some(d) = obj.as_async_disposable() {
        return d.dispose_async().await;
    }
    dispose(obj)
}

impl Poolable for String {
    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        Some(self)
    }
}

impl Resettable for String {
    fn try_reset(&mut self) -> bool {
        self.clear();
        true
    }
}

impl<T: Send + 'static> Poolable for Vec<T> {
    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        Some(self)
    }
}

impl<T> Resettable for Vec<T> {
    fn try_reset(&mut self) -> bool {
        self.clear();
        true
    }
}
