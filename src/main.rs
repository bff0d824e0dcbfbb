// Orion.ObjectPooling - Rust Port
// Thread-safe object reuse pool with async support

// This is just a binary wrapper - the actual library is in lib.rs
// Run demos with: cargo run --example basic

use orion_objectpool::{ObjectPool, PoolResult, PooledObjectPolicy};

fn main() -> PoolResult<()> {
    println!("=== Orion.ObjectPooling ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    // Quick demo
    println!("Quick Demo:");
    let pool = ObjectPool::new(
        PooledObjectPolicy::<Vec<u8>>::new()
            .with_factory(|| Vec::with_capacity(1024))
            .with_initial_pool_size(2)
            .with_max_pool_size(4),
    )?;
    println!("  Pre-populated: {}", pool.count());

    let mut buffer = pool.rent()?;
    buffer.extend_from_slice(b"hello");
    println!("  Rented buffer, {} left in pool", pool.count());

    let retained = pool.return_object(buffer)?;
    println!("  Returned buffer (retained: {}), {} in pool", retained, pool.count());

    Ok(())
}
