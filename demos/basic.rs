//! Basic usage examples

use orion_objectpool::{
    DisposeError, Disposable, ObjectPool, PoolResult, Poolable, PooledObjectPolicy, Resettable,
};
use std::sync::Arc;

#[derive(Default, Debug)]
struct Person {
    name: String,
    age: u32,
}

impl Poolable for Person {
    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        Some(self)
    }
}

impl Resettable for Person {
    fn try_reset(&mut self) -> bool {
        self.name.clear();
        self.age = 0;
        true
    }
}

struct Connection {
    id: u32,
}

impl Poolable for Connection {
    fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
        Some(self)
    }
}

impl Disposable for Connection {
    fn dispose(&mut self) -> Result<(), DisposeError> {
        println!("   Closing connection {}", self.id);
        Ok(())
    }
}

fn main() -> PoolResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Orion.ObjectPooling - Basic Examples ===\n");

    rent_and_return()?;
    bounded_pool()?;
    guards()?;
    shared_pool()?;

    Ok(())
}

fn rent_and_return() -> PoolResult<()> {
    println!("1. Rent and Return:");
    let pool = ObjectPool::<Person>::default();

    let mut person = pool.rent()?;
    person.name.push_str("Ada");
    person.age = 36;
    println!("   Rented: {:?}", person);

    pool.return_object(person)?;
    println!("   Pooled objects: {}", pool.count());
    println!("   Rented again (reset): {:?}", pool.rent()?);
    println!();
    Ok(())
}

fn bounded_pool() -> PoolResult<()> {
    println!("2. Bounded Pool with Disposal:");
    let next_id = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let ids = Arc::clone(&next_id);
    let pool = ObjectPool::new(
        PooledObjectPolicy::from_factory(move || Connection {
            id: ids.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
        })
        .with_max_pool_size(2),
    )?;

    let conns: Vec<_> = (0..3).map(|_| pool.rent()).collect::<PoolResult<_>>()?;
    for conn in conns {
        let id = conn.id;
        let retained = pool.return_object(conn)?;
        println!("   Returned connection {} (retained: {})", id, retained);
    }

    pool.dispose()?;
    println!("   Disposed: {}", pool.is_disposed());
    println!();
    Ok(())
}

fn guards() -> PoolResult<()> {
    println!("3. Guards:");
    let pool = Arc::new(ObjectPool::<Person>::default());
    {
        let mut person = pool.rent_guard()?;
        person.name.push_str("Grace");
        println!("   In use: {:?}, pooled: {}", *person, pool.count());
    }
    println!("   After drop, pooled: {}", pool.count());
    println!();
    Ok(())
}

fn shared_pool() -> PoolResult<()> {
    println!("4. Shared Pool:");
    let shared = ObjectPool::<Person>::shared();
    shared.return_object(Person::default())?;
    println!("   Shared pool count: {}", shared.count());

    let resized = ObjectPool::<Person>::assign_shared_policy(
        PooledObjectPolicy::new()
            .with_initial_pool_size(4)
            .with_max_pool_size(8),
    )?;
    println!("   After new policy: count {}, max {}", resized.count(), resized.policy().max_pool_size());
    Ok(())
}
