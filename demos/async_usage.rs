//! Async usage examples

use orion_objectpool::{
    AsyncDisposable, CancellationToken, DisposeError, ObjectPool, PoolError, Poolable,
    PooledObjectPolicy, async_trait,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

struct Session {
    id: usize,
}

impl Poolable for Session {
    fn as_async_disposable(&mut self) -> Option<&mut dyn AsyncDisposable> {
        Some(self)
    }
}

#[async_trait]
impl AsyncDisposable for Session {
    async fn dispose_async(&mut self) -> Result<(), DisposeError> {
        sleep(Duration::from_millis(5)).await;
        println!("   Session {} closed", self.id);
        Ok(())
    }
}

fn session_pool() -> Arc<ObjectPool<Session>> {
    let next_id = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let policy = PooledObjectPolicy::from_async_factory(move |_token| {
        let next_id = Arc::clone(&next_id);
        async move {
            sleep(Duration::from_millis(10)).await;
            Session {
                id: next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            }
        }
    })
    .with_max_pool_size(4);

    match ObjectPool::new(policy) {
        Ok(pool) => Arc::new(pool),
        Err(e) => panic!("invalid policy: {}", e),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Orion.ObjectPooling - Async Examples ===\n");

    async_rent().await;
    cancellation().await;
    concurrent_access().await;
}

async fn async_rent() {
    println!("1. Async Rent:");
    let pool = session_pool();
    let token = CancellationToken::new();

    let session = pool.rent_async(&token).await.unwrap();
    println!("   Built session {}", session.id);
    pool.return_object_async(session).await.unwrap();

    let again = pool.rent_async(&token).await.unwrap();
    println!("   Reused session {}", again.id);
    pool.return_object_async(again).await.unwrap();

    pool.dispose_async().await.unwrap();
    println!();
}

async fn cancellation() {
    println!("2. Cancellation:");
    let pool = session_pool();
    let token = CancellationToken::new();
    token.cancel();

    match pool.rent_async(&token).await {
        Err(PoolError::Cancelled) => println!("   Rent cancelled, pool count {}", pool.count()),
        Err(e) => println!("   Error: {}", e),
        Ok(s) => println!("   Got session {}", s.id),
    }
    println!();
}

async fn concurrent_access() {
    println!("3. Concurrent Access:");
    let pool = session_pool();

    let mut handles = vec![];
    for i in 0..8 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            let session = pool.rent_guard_async(&CancellationToken::new()).await.unwrap();
            println!("   Task {} got session {}", i, session.id);
            sleep(Duration::from_millis(20)).await;
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Final pooled: {}", pool.count());
    pool.clear_async().await.unwrap();
}
