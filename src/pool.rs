//! Core object pool implementation

use crate::capability::{self, Poolable};
use crate::errors::{PoolError, PoolResult};
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::policy::PooledObjectPolicy;

use crossbeam::queue::{ArrayQueue, SegQueue};
use std::any::type_name;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Idle objects: one fast slot in front of an unbounded queue
///
/// Shared by `Arc` so that a replacement pool can take over the objects of the pool it replaces.
pub(crate) struct Storage<T> {
    fast_slot: ArrayQueue<T>,
    items: SegQueue<T>,
    /// Approximate queue length, used only for the capacity check on return.
    item_count: AtomicUsize,
}

impl<T> Storage<T> {
    pub(crate) fn new() -> Self {
        Self {
            fast_slot: ArrayQueue::new(1),
            items: SegQueue::new(),
            item_count: AtomicUsize::new(0),
        }
    }

    fn len(&self) -> usize {
        self.items.len() + self.fast_slot.len()
    }

    fn is_empty(&self) -> bool {
        self.fast_slot.is_empty() && self.items.is_empty()
    }

    fn take(&self) -> Option<T> {
        self.fast_slot.pop().or_else(|| self.take_queued())
    }

    fn take_queued(&self) -> Option<T> {
        let obj = self.items.pop()?;
        self.item_count.fetch_sub(1, Ordering::AcqRel);
        Some(obj)
    }

    /// Hands the object back when the pool is at capacity.
    ///
    /// The increment and the enqueue are separate steps, so racing returns can briefly push the
    /// queue one item past the limit.
    fn put(&self, obj: T, max_pool_size: usize) -> Result<(), T> {
        if max_pool_size == 0 {
            return Err(obj);
        }

        let obj = match self.fast_slot.push(obj) {
            Ok(()) => return Ok(()),
            Err(obj) => obj,
        };

        if self.item_count.fetch_add(1, Ordering::AcqRel) + 1 < max_pool_size {
            self.items.push(obj);
            return Ok(());
        }

        self.item_count.fetch_sub(1, Ordering::AcqRel);
        Err(obj)
    }
}

enum Placement<T> {
    Retained,
    Rejected(T),
    Full(T),
}

/// Thread-safe pool of reusable objects
///
/// Renting takes the fast slot, then the queue, and only then builds a new object with the
/// policy's factory, so `rent` never waits. Returned objects pass the policy's return validator
/// and are kept while the pool is below its maximum size; everything else is disposed.
///
/// # Examples
///
/// ```
/// use orion_objectpool::{ObjectPool, PooledObjectPolicy};
///
/// let pool = ObjectPool::new(
///     PooledObjectPolicy::<Vec<u8>>::new()
///         .with_initial_pool_size(2)
///         .with_max_pool_size(2),
/// )
/// .unwrap();
/// assert_eq!(pool.count(), 2);
///
/// let buffer = pool.rent().unwrap();
/// assert_eq!(pool.count(), 1);
///
/// assert!(pool.return_object(buffer).unwrap());
/// assert!(!pool.return_object(Vec::new()).unwrap());
/// assert_eq!(pool.count(), 2);
/// ```
pub struct ObjectPool<T: Poolable> {
    policy: Arc<PooledObjectPolicy<T>>,
    storage: Arc<Storage<T>>,
    disposed: AtomicBool,
    metrics: MetricsTracker,
}

impl<T: Poolable> ObjectPool<T> {
    /// Create a pool, pre-populating `initial_pool_size` objects
    pub fn new(policy: PooledObjectPolicy<T>) -> PoolResult<Self> {
        Self::with_storage(Arc::new(policy), Arc::new(Storage::new()))
    }

    /// Create a pool over existing storage, trimming it to `max_pool_size` and topping it up
    /// to `initial_pool_size`.
    pub(crate) fn with_storage(
        policy: Arc<PooledObjectPolicy<T>>,
        storage: Arc<Storage<T>>,
    ) -> PoolResult<Self> {
        policy.validate()?;
        let pool = Self::from_parts(policy, storage);
        pool.trim()?;
        pool.populate()?;

        debug!(
            pooled_type = type_name::<T>(),
            initial_pool_size = pool.policy.initial_pool_size(),
            max_pool_size = pool.policy.max_pool_size(),
            count = pool.count(),
            "created object pool"
        );
        Ok(pool)
    }

    fn from_parts(policy: Arc<PooledObjectPolicy<T>>, storage: Arc<Storage<T>>) -> Self {
        Self {
            policy,
            storage,
            disposed: AtomicBool::new(false),
            metrics: MetricsTracker::new(),
        }
    }

    /// Disposes idle objects beyond `max_pool_size`, queued ones first.
    fn trim(&self) -> PoolResult<()> {
        let max_pool_size = self.policy.max_pool_size();
        let mut trimmed = 0usize;
        let mut result = Ok(());
        while self.count() > max_pool_size {
            let Some(obj) = self
                .storage
                .take_queued()
                .or_else(|| self.storage.fast_slot.pop())
            else {
                break;
            };
            trimmed += 1;
            result = result.and(self.discard(obj));
        }
        if trimmed > 0 {
            debug!(
                pooled_type = type_name::<T>(),
                trimmed, max_pool_size, "trimmed adopted objects over capacity"
            );
        }
        result
    }

    fn populate(&self) -> PoolResult<()> {
        let target = self.policy.initial_pool_size();
        for _ in self.count()..target {
            let obj = self.policy.create();
            self.metrics.total_created.fetch_add(1, Ordering::Relaxed);
            match self.place(obj) {
                Placement::Retained => {}
                Placement::Rejected(obj) | Placement::Full(obj) => self.discard(obj)?,
            }
        }
        Ok(())
    }

    pub fn policy(&self) -> &PooledObjectPolicy<T> {
        &self.policy
    }

    pub(crate) fn storage(&self) -> Arc<Storage<T>> {
        Arc::clone(&self.storage)
    }

    /// Number of idle objects, fast slot included
    pub fn count(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Get an idle object, or build one if there is none
    pub fn rent(&self) -> PoolResult<T> {
        let obj = match self.try_take()? {
            Some(obj) => obj,
            None => {
                self.metrics.total_created.fetch_add(1, Ordering::Relaxed);
                self.policy.create()
            }
        };
        self.metrics.total_rented.fetch_add(1, Ordering::Relaxed);
        Ok(obj)
    }

    /// Like [`rent`](Self::rent), but builds missing objects with the async factory
    ///
    /// Cancelling `cancellation` abandons the factory call and fails with
    /// [`PoolError::Cancelled`]; the pool is left untouched.
    pub async fn rent_async(&self, cancellation: &CancellationToken) -> PoolResult<T> {
        if let Some(obj) = self.try_take()? {
            self.metrics.total_rented.fetch_add(1, Ordering::Relaxed);
            return Ok(obj);
        }
        if cancellation.is_cancelled() {
            return Err(PoolError::Cancelled);
        }

        let create = self.policy.create_async(cancellation.clone());
        let obj = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(PoolError::Cancelled),
            obj = create => obj,
        };
        self.metrics.total_created.fetch_add(1, Ordering::Relaxed);
        self.metrics.total_rented.fetch_add(1, Ordering::Relaxed);
        Ok(obj)
    }

    fn try_take(&self) -> PoolResult<Option<T>> {
        self.ensure_not_disposed()?;
        Ok(self.storage.take())
    }

    /// Give an object back; `Ok(false)` means it was disposed instead of kept
    pub fn return_object(&self, obj: T) -> PoolResult<bool> {
        self.return_option(Some(obj))
    }

    /// Like [`return_object`](Self::return_object), failing with [`PoolError::NullObject`] on `None`
    pub fn return_option(&self, obj: Option<T>) -> PoolResult<bool> {
        match self.accept(obj)? {
            Placement::Retained => Ok(true),
            Placement::Rejected(obj) | Placement::Full(obj) => {
                self.discard(obj)?;
                Ok(false)
            }
        }
    }

    /// Async counterpart of [`return_object`](Self::return_object)
    pub async fn return_object_async(&self, obj: T) -> PoolResult<bool> {
        self.return_option_async(Some(obj)).await
    }

    /// Async counterpart of [`return_option`](Self::return_option)
    pub async fn return_option_async(&self, obj: Option<T>) -> PoolResult<bool> {
        match self.accept(obj)? {
            Placement::Retained => Ok(true),
            Placement::Rejected(obj) | Placement::Full(obj) => {
                self.discard_async(obj).await?;
                Ok(false)
            }
        }
    }

    fn accept(&self, obj: Option<T>) -> PoolResult<Placement<T>> {
        self.ensure_not_disposed()?;
        let obj = obj.ok_or(PoolError::NullObject)?;
        self.metrics.total_returned.fetch_add(1, Ordering::Relaxed);
        Ok(self.place(obj))
    }

    fn place(&self, mut obj: T) -> Placement<T> {
        if !self.policy.validate_return(&mut obj) {
            self.metrics.validation_failures.fetch_add(1, Ordering::Relaxed);
            trace!(pooled_type = type_name::<T>(), "return validator rejected object");
            return Placement::Rejected(obj);
        }

        match self.storage.put(obj, self.policy.max_pool_size()) {
            Ok(()) => {
                self.metrics.total_retained.fetch_add(1, Ordering::Relaxed);
                Placement::Retained
            }
            Err(obj) => {
                self.metrics.capacity_discards.fetch_add(1, Ordering::Relaxed);
                trace!(
                    pooled_type = type_name::<T>(),
                    max_pool_size = self.policy.max_pool_size(),
                    "pool at capacity, discarding object"
                );
                Placement::Full(obj)
            }
        }
    }

    fn discard(&self, obj: T) -> PoolResult<()> {
        self.metrics.total_disposed.fetch_add(1, Ordering::Relaxed);
        capability::dispose(obj)?;
        Ok(())
    }

    async fn discard_async(&self, obj: T) -> PoolResult<()> {
        self.metrics.total_disposed.fetch_add(1, Ordering::Relaxed);
        capability::dispose_async(obj).await?;
        Ok(())
    }

    /// Dispose every idle object; the pool stays usable
    pub fn clear(&self) -> PoolResult<()> {
        self.ensure_not_disposed()?;
        self.drain()
    }

    /// Async counterpart of [`clear`](Self::clear), preferring async disposal
    pub async fn clear_async(&self) -> PoolResult<()> {
        self.ensure_not_disposed()?;
        self.drain_async().await
    }

    /// Disposes every idle object even when some disposals fail; the first failure is returned.
    fn drain(&self) -> PoolResult<()> {
        let mut cleared = 0usize;
        let mut result = Ok(());
        while let Some(obj) = self.storage.take_queued() {
            cleared += 1;
            result = result.and(self.discard(obj));
        }
        if let Some(obj) = self.storage.fast_slot.pop() {
            cleared += 1;
            result = result.and(self.discard(obj));
        }
        debug!(pooled_type = type_name::<T>(), cleared, "cleared object pool");
        result
    }

    async fn drain_async(&self) -> PoolResult<()> {
        let mut cleared = 0usize;
        let mut result = Ok(());
        while let Some(obj) = self.storage.take_queued() {
            cleared += 1;
            let outcome = self.discard_async(obj).await;
            result = result.and(outcome);
        }
        if let Some(obj) = self.storage.fast_slot.pop() {
            cleared += 1;
            let outcome = self.discard_async(obj).await;
            result = result.and(outcome);
        }
        debug!(pooled_type = type_name::<T>(), cleared, "cleared object pool");
        result
    }

    /// Clear the pool and refuse all further use; calling it again does nothing
    ///
    /// Every idle object is disposed even if some disposals fail. The pool counts as disposed
    /// either way, and the first failure is returned.
    pub fn dispose(&self) -> PoolResult<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(pooled_type = type_name::<T>(), "disposing object pool");
        self.drain()
    }

    /// Async counterpart of [`dispose`](Self::dispose)
    pub async fn dispose_async(&self) -> PoolResult<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(pooled_type = type_name::<T>(), "disposing object pool");
        self.drain_async().await
    }

    /// Snapshot of the pool's counters
    pub fn metrics(&self) -> PoolMetrics {
        self.metrics.get_metrics(self.count(), self.policy.max_pool_size())
    }

    fn ensure_not_disposed(&self) -> PoolResult<()> {
        if self.is_disposed() {
            return Err(PoolError::ObjectDisposed);
        }
        Ok(())
    }
}

impl<T: Poolable> ObjectPool<T> {
    /// Rent an object that goes back to this pool when dropped
    pub fn rent_guard(self: &Arc<Self>) -> PoolResult<PooledObject<T>> {
        let obj = self.rent()?;
        Ok(PooledObject::new(obj, Arc::clone(self)))
    }

    /// Async counterpart of [`rent_guard`](Self::rent_guard)
    pub async fn rent_guard_async(
        self: &Arc<Self>,
        cancellation: &CancellationToken,
    ) -> PoolResult<PooledObject<T>> {
        let obj = self.rent_async(cancellation).await?;
        Ok(PooledObject::new(obj, Arc::clone(self)))
    }
}

impl<T: Poolable + Default> ObjectPool<T> {
    /// Pool with [`PooledObjectPolicy::new`]
    pub fn with_default_policy() -> Self {
        Self::from_parts(Arc::new(PooledObjectPolicy::new()), Arc::new(Storage::new()))
    }
}

impl<T: Poolable + Default> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::with_default_policy()
    }
}

impl<T: Poolable> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("policy", &self.policy)
            .field("count", &self.count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A rented object that returns to its pool when dropped
pub struct PooledObject<T: Poolable> {
    value: Option<T>,
    pool: Arc<ObjectPool<T>>,
}

impl<T: Poolable> PooledObject<T> {
    fn new(value: T, pool: Arc<ObjectPool<T>>) -> Self {
        Self {
            value: Some(value),
            pool,
        }
    }

    /// Take the object out without returning it to the pool
    pub fn detach(mut self) -> T {
        self.value.take().expect("Value already taken")
    }
}

impl<T: Poolable> Deref for PooledObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("Value already taken")
    }
}

impl<T: Poolable> DerefMut for PooledObject<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("Value already taken")
    }
}

impl<T: Poolable> Drop for PooledObject<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take()
            && let Err(err) = self.pool.return_object(value)
        {
            trace!(pooled_type = type_name::<T>(), %err, "dropped guard could not return object");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{AsyncDisposable, Disposable, Resettable};
    use crate::errors::DisposeError;
    use async_trait::async_trait;

    #[derive(Default)]
    struct Person {
        name: String,
        age: u32,
    }

    impl Poolable for Person {}

    struct Tracked {
        disposed: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Poolable for Tracked {
        fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
            Some(self)
        }
    }

    impl Disposable for Tracked {
        fn dispose(&mut self) -> Result<(), DisposeError> {
            self.disposed.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("socket already closed".into());
            }
            Ok(())
        }
    }

    fn tracked_pool(max: usize) -> (ObjectPool<Tracked>, Arc<AtomicUsize>) {
        let disposed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&disposed);
        let policy = PooledObjectPolicy::from_factory(move || Tracked {
            disposed: Arc::clone(&counter),
            fail: false,
        })
        .with_max_pool_size(max);
        (ObjectPool::new(policy).unwrap(), disposed)
    }

    #[test]
    fn test_rent_return_rent_reuses_object() {
        let pool = ObjectPool::<Person>::default();

        let mut person = pool.rent().unwrap();
        person.name.push_str("Ada");
        person.age = 36;
        let addr = &*person.name as *const str;

        assert!(pool.return_object(person).unwrap());
        let again = pool.rent().unwrap();

        assert_eq!(again.name, "Ada");
        assert_eq!(again.age, 36);
        assert_eq!(&*again.name as *const str, addr);
    }

    #[test]
    fn test_rent_on_empty_pool_uses_factory() {
        let pool = ObjectPool::new(PooledObjectPolicy::from_factory(|| String::from("fresh"))).unwrap();
        assert!(pool.is_empty());
        assert_eq!(pool.rent().unwrap(), "fresh");
        assert_eq!(pool.metrics().total_created, 1);
    }

    #[test]
    fn test_initial_and_max_size_example() {
        let policy = PooledObjectPolicy::<Person>::new()
            .with_initial_pool_size(2)
            .with_max_pool_size(2);
        let pool = ObjectPool::new(policy).unwrap();
        assert_eq!(pool.count(), 2);

        let _rented = pool.rent().unwrap();
        assert_eq!(pool.count(), 1);

        assert!(pool.return_object(Person::default()).unwrap());
        assert_eq!(pool.count(), 2);

        assert!(!pool.return_object(Person::default()).unwrap());
        assert_eq!(pool.count(), 2);
    }

    #[test]
    fn test_count_is_capped_at_max_size() {
        for max in [1usize, 2, 5] {
            let (pool, disposed) = tracked_pool(max);
            for n in 1..=8usize {
                let fresh = Tracked {
                    disposed: Arc::clone(&disposed),
                    fail: false,
                };
                let retained = pool.return_object(fresh).unwrap();
                assert_eq!(retained, n <= max);
                assert_eq!(pool.count(), n.min(max));
            }
            assert_eq!(disposed.load(Ordering::SeqCst), 8 - max);
        }
    }

    #[test]
    fn test_zero_max_size_retains_nothing() {
        let (pool, disposed) = tracked_pool(0);
        let obj = pool.rent().unwrap();
        assert!(!pool.return_object(obj).unwrap());
        assert_eq!(pool.count(), 0);
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_configuration() {
        let policy = PooledObjectPolicy::<Person>::new()
            .with_initial_pool_size(4)
            .with_max_pool_size(3);
        assert!(matches!(ObjectPool::new(policy), Err(PoolError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_validator_rejection_disposes() {
        struct Conn {
            healthy: bool,
            closed: Arc<AtomicUsize>,
        }

        impl Poolable for Conn {
            fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
                Some(self)
            }
        }

        impl Disposable for Conn {
            fn dispose(&mut self) -> Result<(), DisposeError> {
                self.closed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let closed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closed);
        let policy = PooledObjectPolicy::from_factory(move || Conn {
            healthy: true,
            closed: Arc::clone(&counter),
        })
        .with_return_validator(|c: &mut Conn| c.healthy);
        let pool = ObjectPool::new(policy).unwrap();

        let mut conn = pool.rent().unwrap();
        conn.healthy = false;
        assert!(!pool.return_object(conn).unwrap());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.count(), 0);
        assert_eq!(pool.metrics().validation_failures, 1);
    }

    #[test]
    fn test_default_validator_resets_objects() {
        let pool = ObjectPool::<Vec<u32>>::default();
        let mut v = pool.rent().unwrap();
        v.extend([1, 2, 3]);
        assert!(pool.return_object(v).unwrap());
        assert!(pool.rent().unwrap().is_empty());
    }

    #[test]
    fn test_failed_reset_is_not_retained() {
        #[derive(Default)]
        struct Stubborn;

        impl Poolable for Stubborn {
            fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
                Some(self)
            }
        }

        impl Resettable for Stubborn {
            fn try_reset(&mut self) -> bool {
                false
            }
        }

        let pool = ObjectPool::<Stubborn>::default();
        assert!(!pool.return_object(Stubborn).unwrap());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_null_object() {
        let pool = ObjectPool::<Person>::default();
        assert!(matches!(pool.return_option(None), Err(PoolError::NullObject)));
        assert!(pool.return_option(Some(Person::default())).unwrap());
    }

    #[test]
    fn test_clear_disposes_everything() {
        let (pool, disposed) = tracked_pool(4);
        let objs: Vec<_> = (0..3).map(|_| pool.rent().unwrap()).collect();
        for obj in objs {
            assert!(pool.return_object(obj).unwrap());
        }
        assert_eq!(pool.count(), 3);

        pool.clear().unwrap();
        assert_eq!(pool.count(), 0);
        assert!(pool.is_empty());
        assert_eq!(disposed.load(Ordering::SeqCst), 3);

        // still usable
        let obj = pool.rent().unwrap();
        assert!(pool.return_object(obj).unwrap());
        assert_eq!(pool.count(), 1);
    }

    #[test]
    fn test_dispose_failure_propagates() {
        let pool = ObjectPool::new(PooledObjectPolicy::from_factory(|| Tracked {
            disposed: Arc::new(AtomicUsize::new(0)),
            fail: true,
        }))
        .unwrap();
        let obj = pool.rent().unwrap();
        pool.return_object(obj).unwrap();

        assert!(matches!(pool.clear(), Err(PoolError::DisposeFailed(_))));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_dispose_is_terminal_and_idempotent() {
        let (pool, disposed) = tracked_pool(4);
        let obj = pool.rent().unwrap();
        pool.return_object(obj).unwrap();

        pool.dispose().unwrap();
        assert!(pool.is_disposed());
        assert_eq!(disposed.load(Ordering::SeqCst), 1);

        assert!(matches!(pool.rent(), Err(PoolError::ObjectDisposed)));
        assert!(matches!(pool.clear(), Err(PoolError::ObjectDisposed)));
        let stray = Tracked {
            disposed: Arc::clone(&disposed),
            fail: false,
        };
        assert!(matches!(pool.return_object(stray), Err(PoolError::ObjectDisposed)));
        assert!(matches!(pool.return_option(None), Err(PoolError::ObjectDisposed)));

        pool.dispose().unwrap();
        assert!(pool.is_disposed());
    }

    #[test]
    fn test_dispose_runs_every_hook_when_one_fails() {
        let (pool, disposed) = tracked_pool(8);
        // fast slot, then a queue whose middle object fails to dispose
        for fail in [false, false, true, false] {
            let obj = Tracked {
                disposed: Arc::clone(&disposed),
                fail,
            };
            assert!(pool.return_object(obj).unwrap());
        }
        assert_eq!(pool.count(), 4);

        assert!(matches!(pool.dispose(), Err(PoolError::DisposeFailed(_))));
        assert_eq!(disposed.load(Ordering::SeqCst), 4);
        assert_eq!(pool.count(), 0);
        assert!(pool.is_disposed());
        assert_eq!(pool.metrics().total_disposed, 4);

        pool.dispose().unwrap();
        assert_eq!(disposed.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_guard_returns_on_drop() {
        let pool = Arc::new(ObjectPool::<Person>::default());
        {
            let mut guard = pool.rent_guard().unwrap();
            guard.age = 7;
            assert_eq!(pool.count(), 0);
        }
        assert_eq!(pool.count(), 1);

        let detached = pool.rent_guard().unwrap().detach();
        assert_eq!(detached.age, 7);
        assert_eq!(pool.count(), 0);
    }

    #[test]
    fn test_guard_on_disposed_pool_drops_quietly() {
        let pool = Arc::new(ObjectPool::<Person>::default());
        let guard = pool.rent_guard().unwrap();
        pool.dispose().unwrap();
        drop(guard);
        assert_eq!(pool.count(), 0);
    }

    #[test]
    fn test_metrics_counters() {
        let pool = ObjectPool::new(PooledObjectPolicy::<Person>::new().with_max_pool_size(1)).unwrap();
        let a = pool.rent().unwrap();
        let b = pool.rent().unwrap();
        pool.return_object(a).unwrap();
        pool.return_object(b).unwrap();

        let m = pool.metrics();
        assert_eq!(m.total_rented, 2);
        assert_eq!(m.total_created, 2);
        assert_eq!(m.total_returned, 2);
        assert_eq!(m.total_retained, 1);
        assert_eq!(m.capacity_discards, 1);
        assert_eq!(m.total_disposed, 1);
        assert_eq!(m.pooled_objects, 1);
        assert_eq!(m.max_pool_size, 1);
    }

    #[tokio::test]
    async fn test_async_rent_and_return() {
        let pool = ObjectPool::new(
            PooledObjectPolicy::from_async_factory(|_token| async { String::from("built") }),
        )
        .unwrap();
        let token = CancellationToken::new();

        let s = pool.rent_async(&token).await.unwrap();
        assert_eq!(s, "built");
        assert!(pool.return_object_async(s).await.unwrap());

        // reset by the default validator
        assert_eq!(pool.rent_async(&token).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_async_rent_cancelled() {
        let pool = ObjectPool::new(PooledObjectPolicy::<Person>::new().with_async_factory(
            |token: CancellationToken| async move {
                token.cancelled().await;
                Person::default()
            },
        ))
        .unwrap();

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            canceller.cancel();
        });

        assert!(matches!(pool.rent_async(&token).await, Err(PoolError::Cancelled)));
        assert!(pool.is_empty());
        assert_eq!(pool.metrics().total_created, 0);
    }

    #[tokio::test]
    async fn test_async_rent_prefers_pooled_object_even_when_cancelled() {
        let pool = ObjectPool::<Person>::default();
        pool.return_object(Person { name: "kept".into(), age: 1 }).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(pool.rent_async(&token).await.unwrap().name, "kept");
        assert!(matches!(pool.rent_async(&token).await, Err(PoolError::Cancelled)));
    }

    struct Dual {
        sync_runs: Arc<AtomicUsize>,
        async_runs: Arc<AtomicUsize>,
        keep: bool,
    }

    impl Poolable for Dual {
        fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
            Some(self)
        }

        fn as_async_disposable(&mut self) -> Option<&mut dyn AsyncDisposable> {
            Some(self)
        }
    }

    impl Disposable for Dual {
        fn dispose(&mut self) -> Result<(), DisposeError> {
            self.sync_runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl AsyncDisposable for Dual {
        async fn dispose_async(&mut self) -> Result<(), DisposeError> {
            tokio::task::yield_now().await;
            self.async_runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_async_return_prefers_async_disposal() {
        let sync_runs = Arc::new(AtomicUsize::new(0));
        let async_runs = Arc::new(AtomicUsize::new(0));
        let dual = |keep: bool| Dual {
            sync_runs: Arc::clone(&sync_runs),
            async_runs: Arc::clone(&async_runs),
            keep,
        };
        let policy = PooledObjectPolicy::from_factory({
            let dual_sync = Arc::clone(&sync_runs);
            let dual_async = Arc::clone(&async_runs);
            move || Dual {
                sync_runs: Arc::clone(&dual_sync),
                async_runs: Arc::clone(&dual_async),
                keep: true,
            }
        })
        .with_return_validator(|d: &mut Dual| d.keep)
        .with_max_pool_size(1);
        let pool = ObjectPool::new(policy).unwrap();

        // rejected by the validator
        assert!(!pool.return_object_async(dual(false)).await.unwrap());
        assert_eq!(async_runs.load(Ordering::SeqCst), 1);

        // over capacity once the fast slot is taken
        assert!(pool.return_object_async(dual(true)).await.unwrap());
        assert!(!pool.return_object_async(dual(true)).await.unwrap());
        assert_eq!(async_runs.load(Ordering::SeqCst), 2);

        assert_eq!(sync_runs.load(Ordering::SeqCst), 0);
        assert_eq!(pool.count(), 1);
        let m = pool.metrics();
        assert_eq!(m.validation_failures, 1);
        assert_eq!(m.capacity_discards, 1);
    }

    #[tokio::test]
    async fn test_async_null_object() {
        let pool = ObjectPool::<Person>::default();
        assert!(matches!(
            pool.return_option_async(None).await,
            Err(PoolError::NullObject)
        ));
        assert_eq!(pool.metrics().total_returned, 0);
        assert!(pool.return_option_async(Some(Person::default())).await.unwrap());
    }

    #[tokio::test]
    async fn test_async_dispose_runs_every_hook_when_one_fails() {
        let (pool, disposed) = tracked_pool(8);
        for fail in [false, false, true, false] {
            let obj = Tracked {
                disposed: Arc::clone(&disposed),
                fail,
            };
            assert!(pool.return_object_async(obj).await.unwrap());
        }

        assert!(matches!(pool.dispose_async().await, Err(PoolError::DisposeFailed(_))));
        assert_eq!(disposed.load(Ordering::SeqCst), 4);
        assert!(pool.is_empty());
        assert!(pool.is_disposed());
    }

    #[tokio::test]
    async fn test_async_dispose() {
        let (pool, disposed) = tracked_pool(4);
        let objs: Vec<_> = (0..2).map(|_| pool.rent().unwrap()).collect();
        for obj in objs {
            pool.return_object_async(obj).await.unwrap();
        }

        pool.clear_async().await.unwrap();
        assert_eq!(disposed.load(Ordering::SeqCst), 2);

        pool.dispose_async().await.unwrap();
        pool.dispose_async().await.unwrap();
        assert!(matches!(pool.clear_async().await, Err(PoolError::ObjectDisposed)));
        assert!(matches!(
            pool.rent_async(&CancellationToken::new()).await,
            Err(PoolError::ObjectDisposed)
        ));
    }
}
