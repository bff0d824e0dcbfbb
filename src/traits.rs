//! Object-safe pool interface

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::capability::Poolable;
use crate::errors::PoolResult;
use crate::policy::PooledObjectPolicy;
use crate::pool::ObjectPool;

/// Operations shared by every pool of `T`, usable as `Arc<dyn Pool<T>>`
///
/// # Examples
///
/// ```
/// use orion_objectpool::{ObjectPool, Pool};
/// use std::sync::Arc;
///
/// let pool: Arc<dyn Pool<String>> = Arc::new(ObjectPool::<String>::default());
/// let s = pool.rent().unwrap();
/// assert!(pool.return_object(s).unwrap());
/// assert_eq!(pool.count(), 1);
/// ```
#[async_trait]
pub trait Pool<T: Poolable>: Send + Sync {
    fn policy(&self) -> &PooledObjectPolicy<T>;

    fn count(&self) -> usize;

    fn is_empty(&self) -> bool;

    fn is_disposed(&self) -> bool;

    fn rent(&self) -> PoolResult<T>;

    async fn rent_async(&self, cancellation: &CancellationToken) -> PoolResult<T>;

    fn return_object(&self, obj: T) -> PoolResult<bool>;

    async fn return_object_async(&self, obj: T) -> PoolResult<bool>;

    fn clear(&self) -> PoolResult<()>;

    async fn clear_async(&self) -> PoolResult<()>;

    fn dispose(&self) -> PoolResult<()>;

    async fn dispose_async(&self) -> PoolResult<()>;
}

#[async_trait]
impl<T: Poolable> Pool<T> for ObjectPool<T> {
    fn policy(&self) -> &PooledObjectPolicy<T> {
        ObjectPool::policy(self)
    }

    fn count(&self) -> usize {
        ObjectPool::count(self)
    }

    fn is_empty(&self) -> bool {
        ObjectPool::is_empty(self)
    }

    fn is_disposed(&self) -> bool {
        ObjectPool::is_disposed(self)
    }

    fn rent(&self) -> PoolResult<T> {
        ObjectPool::rent(self)
    }

    async fn rent_async(&self, cancellation: &CancellationToken) -> PoolResult<T> {
        ObjectPool::rent_async(self, cancellation).await
    }

    fn return_object(&self, obj: T) -> PoolResult<bool> {
        ObjectPool::return_object(self, obj)
    }

    async fn return_object_async(&self, obj: T) -> PoolResult<bool> {
        ObjectPool::return_object_async(self, obj).await
    }

    fn clear(&self) -> PoolResult<()> {
        ObjectPool::clear(self)
    }

    async fn clear_async(&self) -> PoolResult<()> {
        ObjectPool::clear_async(self).await
    }

    fn dispose(&self) -> PoolResult<()> {
        ObjectPool::dispose(self)
    }

    async fn dispose_async(&self) -> PoolResult<()> {
        ObjectPool::dispose_async(self).await
    }
}
