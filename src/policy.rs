//! Pool policy: construction, return validation and sizing

use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::Arc;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio_util::sync::CancellationToken;

use crate::capability::Poolable;
use crate::errors::{PoolError, PoolResult};

/// Hard upper bound for [`PooledObjectPolicy::max_pool_size`]
pub const MAXIMUM_ALLOWED_POOL_SIZE: usize = 1_048_576;

/// Future returned by an asynchronous object factory
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type Factory<T> = Arc<dyn Fn() -> T + Send + Sync>;
type AsyncFactory<T> = Arc<dyn Fn(CancellationToken) -> BoxFuture<T> + Send + Sync>;
type ReturnValidator<T> = Arc<dyn Fn(&mut T) -> bool + Send + Sync>;

/// Immutable configuration for an [`ObjectPool`](crate::ObjectPool)
///
/// Supplying only one of the two factories derives the other: a sync factory is wrapped in an
/// already-completed future, an async factory is driven to completion on the calling thread.
///
/// # Examples
///
/// ```
/// use orion_objectpool::PooledObjectPolicy;
///
/// let policy = PooledObjectPolicy::<Vec<u8>>::new()
///     .with_factory(|| Vec::with_capacity(4096))
///     .with_initial_pool_size(2)
///     .with_max_pool_size(16);
///
/// assert_eq!(policy.initial_pool_size(), 2);
/// assert_eq!(policy.max_pool_size(), 16);
/// assert_eq!(policy.create().capacity(), 4096);
/// assert!(policy.validate().is_ok());
/// ```
pub struct PooledObjectPolicy<T> {
    factory: Factory<T>,
    async_factory: AsyncFactory<T>,
    explicit_factory: Option<Factory<T>>,
    explicit_async_factory: Option<AsyncFactory<T>>,
    return_validator: ReturnValidator<T>,
    cancellation: CancellationToken,
    initial_pool_size: usize,
    max_pool_size: usize,
}

impl<T: Poolable + Default> PooledObjectPolicy<T> {
    /// Policy that constructs objects with `T::default()`
    pub fn new() -> Self {
        Self::with_fallback_factory(Arc::new(T::default))
    }
}

impl<T: Poolable + Default> Default for PooledObjectPolicy<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Poolable> PooledObjectPolicy<T> {
    /// Policy for types without a `Default` impl
    pub fn from_factory<F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let factory: Factory<T> = Arc::new(factory);
        let mut policy = Self::with_fallback_factory(Arc::clone(&factory));
        policy.explicit_factory = Some(factory);
        policy
    }

    /// Policy whose objects are built asynchronously
    ///
    /// # Panics
    ///
    /// The derived synchronous factory panics if it has to build a Tokio runtime and cannot.
    pub fn from_async_factory<F, Fut>(factory: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let async_factory = boxed_async_factory(factory);
        let cancellation = CancellationToken::new();
        Self {
            factory: blocking_factory(Arc::clone(&async_factory), cancellation.clone()),
            async_factory: Arc::clone(&async_factory),
            explicit_factory: None,
            explicit_async_factory: Some(async_factory),
            return_validator: Arc::new(default_return_validator::<T>),
            cancellation,
            initial_pool_size: 0,
            max_pool_size: default_max_pool_size(),
        }
    }

    /// Set the synchronous factory
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.explicit_factory = Some(Arc::new(factory));
        self.derive_factories();
        self
    }

    /// Set the asynchronous factory
    ///
    /// # Panics
    ///
    /// Without an explicit synchronous factory, the derived one panics if it has to build a
    /// Tokio runtime and cannot.
    pub fn with_async_factory<F, Fut>(mut self, factory: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.explicit_async_factory = Some(boxed_async_factory(factory));
        self.derive_factories();
        self
    }

    /// Set the predicate deciding whether a returned object is kept
    pub fn with_return_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&mut T) -> bool + Send + Sync + 'static,
    {
        self.return_validator = Arc::new(validator);
        self
    }

    /// Set the token handed to the async factory when it backs the sync one
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self.derive_factories();
        self
    }

    /// Set the number of objects created up front
    pub fn with_initial_pool_size(mut self, size: usize) -> Self {
        self.initial_pool_size = size;
        self
    }

    /// Set the maximum number of idle objects the pool keeps
    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self
    }

    /// Check `initial_pool_size <= max_pool_size <= MAXIMUM_ALLOWED_POOL_SIZE`
    ///
    /// ```
    /// use orion_objectpool::{PoolError, PooledObjectPolicy};
    ///
    /// let policy = PooledObjectPolicy::<String>::new()
    ///     .with_initial_pool_size(8)
    ///     .with_max_pool_size(4);
    ///
    /// assert!(matches!(policy.validate(), Err(PoolError::InvalidConfiguration(_))));
    /// ```
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_pool_size > MAXIMUM_ALLOWED_POOL_SIZE {
            return Err(PoolError::InvalidConfiguration(format!(
                "maximum pool size {} exceeds the allowed maximum of {}",
                self.max_pool_size, MAXIMUM_ALLOWED_POOL_SIZE
            )));
        }
        if self.max_pool_size < self.initial_pool_size {
            return Err(PoolError::InvalidConfiguration(format!(
                "maximum pool size {} is less than initial pool size {}",
                self.max_pool_size, self.initial_pool_size
            )));
        }
        Ok(())
    }

    /// Build a new object with the sync factory
    pub fn create(&self) -> T {
        (self.factory)()
    }

    /// Build a new object with the async factory
    pub fn create_async(&self, cancellation: CancellationToken) -> BoxFuture<T> {
        (self.async_factory)(cancellation)
    }

    /// Run the return validator; `false` means the object is discarded
    pub fn validate_return(&self, obj: &mut T) -> bool {
        (self.return_validator)(obj)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn initial_pool_size(&self) -> usize {
        self.initial_pool_size
    }

    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    /// Neither factory counts as explicitly set, so supplying either one replaces both.
    fn with_fallback_factory(factory: Factory<T>) -> Self {
        Self {
            async_factory: ready_factory(Arc::clone(&factory)),
            factory,
            explicit_factory: None,
            explicit_async_factory: None,
            return_validator: Arc::new(default_return_validator::<T>),
            cancellation: CancellationToken::new(),
            initial_pool_size: 0,
            max_pool_size: default_max_pool_size(),
        }
    }

    fn derive_factories(&mut self) {
        match (&self.explicit_factory, &self.explicit_async_factory) {
            (Some(sync), Some(async_)) => {
                self.factory = Arc::clone(sync);
                self.async_factory = Arc::clone(async_);
            }
            (Some(sync), None) => {
                self.factory = Arc::clone(sync);
                self.async_factory = ready_factory(Arc::clone(sync));
            }
            (None, Some(async_)) => {
                self.factory = blocking_factory(Arc::clone(async_), self.cancellation.clone());
                self.async_factory = Arc::clone(async_);
            }
            (None, None) => {}
        }
    }
}

impl<T> Clone for PooledObjectPolicy<T> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            async_factory: Arc::clone(&self.async_factory),
            explicit_factory: self.explicit_factory.clone(),
            explicit_async_factory: self.explicit_async_factory.clone(),
            return_validator: Arc::clone(&self.return_validator),
            cancellation: self.cancellation.clone(),
            initial_pool_size: self.initial_pool_size,
            max_pool_size: self.max_pool_size,
        }
    }
}

impl<T> fmt::Debug for PooledObjectPolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledObjectPolicy")
            .field("initial_pool_size", &self.initial_pool_size)
            .field("max_pool_size", &self.max_pool_size)
            .field("explicit_factory", &self.explicit_factory.is_some())
            .field("explicit_async_factory", &self.explicit_async_factory.is_some())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

fn default_return_validator<T: Poolable>(obj: &mut T) -> bool {
    match obj.as_resettable() {
        Some(r) => r.try_reset(),
        None => true,
    }
}

fn default_max_pool_size() -> usize {
    let cpus = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
    (cpus * 2).min(MAXIMUM_ALLOWED_POOL_SIZE)
}

fn boxed_async_factory<T, F, Fut>(factory: F) -> AsyncFactory<T>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    Arc::new(move |token: CancellationToken| Box::pin(factory(token)) as BoxFuture<T>)
}

fn ready_factory<T: Send + 'static>(factory: Factory<T>) -> AsyncFactory<T> {
    Arc::new(move |_token: CancellationToken| {
        let obj = factory();
        Box::pin(std::future::ready(obj)) as BoxFuture<T>
    })
}

/// Drives the async factory to completion without requiring the caller to be async.
fn blocking_factory<T: Send + 'static>(
    async_factory: AsyncFactory<T>,
    cancellation: CancellationToken,
) -> Factory<T> {
    Arc::new(move || {
        let fut = async_factory(cancellation.clone());
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(fut))
            }
            // A current-thread runtime cannot be blocked from inside, so park on a helper thread.
            Ok(_) => std::thread::scope(|s| {
                s.spawn(|| block_on_fresh_runtime(fut))
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
            }),
            Err(_) => block_on_fresh_runtime(fut),
        }
    })
}

fn block_on_fresh_runtime<T>(fut: BoxFuture<T>) -> T {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime for blocking factory")
        .block_on(fut)
}
