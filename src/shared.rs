//! Process-wide shared pool per pooled type

use std::any::{Any, TypeId, type_name};
use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::capability::Poolable;
use crate::errors::PoolResult;
use crate::policy::PooledObjectPolicy;
use crate::pool::ObjectPool;

/// Shared pools keyed by pooled type; values are `Arc<SharedSlot<T>>`.
static REGISTRY: LazyLock<DashMap<TypeId, Arc<dyn Any + Send + Sync>>> = LazyLock::new(DashMap::new);

struct SharedSlot<T: Poolable> {
    current: ArcSwap<ObjectPool<T>>,
    /// Serializes policy reassignment; readers never take it.
    swap_lock: Mutex<()>,
}

impl<T: Poolable + Default> SharedSlot<T> {
    fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(ObjectPool::with_default_policy()),
            swap_lock: Mutex::new(()),
        }
    }
}

fn slot<T: Poolable + Default>() -> Arc<SharedSlot<T>> {
    let key = TypeId::of::<T>();
    let existing = REGISTRY.get(&key).map(|entry| Arc::clone(entry.value()));
    let entry = existing.unwrap_or_else(|| {
        let inserted = REGISTRY
            .entry(key)
            .or_insert_with(|| Arc::new(SharedSlot::<T>::new()) as Arc<dyn Any + Send + Sync>);
        Arc::clone(inserted.value())
    });
    match entry.downcast::<SharedSlot<T>>() {
        Ok(slot) => slot,
        Err(_) => unreachable!("shared pool registry entry has the wrong type"),
    }
}

impl<T: Poolable + Default> ObjectPool<T> {
    /// The process-wide pool for `T`, created with the default policy on first use
    ///
    /// # Examples
    ///
    /// ```
    /// use orion_objectpool::{ObjectPool, Poolable};
    ///
    /// #[derive(Default)]
    /// struct Frame(Vec<u8>);
    ///
    /// impl Poolable for Frame {}
    ///
    /// let frame = ObjectPool::<Frame>::shared().rent().unwrap();
    /// assert!(ObjectPool::<Frame>::shared().return_object(frame).unwrap());
    /// assert_eq!(ObjectPool::<Frame>::shared().count(), 1);
    /// ```
    pub fn shared() -> Arc<ObjectPool<T>> {
        slot::<T>().current.load_full()
    }

    /// Replace the shared pool for `T` with one using `policy`
    ///
    /// The new pool takes over the idle objects of the current one, disposes any beyond the new
    /// `max_pool_size` and is topped up to the new `initial_pool_size`. Callers still holding the
    /// previous pool keep using its policy.
    ///
    /// Old and new pools share their idle objects: clearing or disposing a previous handle
    /// drains the current shared pool as well.
    pub fn assign_shared_policy(policy: PooledObjectPolicy<T>) -> PoolResult<Arc<ObjectPool<T>>> {
        let slot = slot::<T>();
        let _guard = slot.swap_lock.lock();

        let storage = slot.current.load().storage();
        let pool = Arc::new(ObjectPool::with_storage(Arc::new(policy), storage)?);
        slot.current.store(Arc::clone(&pool));

        debug!(
            pooled_type = type_name::<T>(),
            max_pool_size = pool.policy().max_pool_size(),
            count = pool.count(),
            "assigned shared pool policy"
        );
        Ok(pool)
    }
}
