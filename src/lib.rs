//! # Orion.ObjectPooling (Rust Port)
//!
//! Thread-safe object reuse pool for Rust: rent objects, give them back, and skip the cost of
//! building short-lived objects over and over.
//!
//! ## Features
//!
//! - Lock-free rent/return: a single fast slot in front of a concurrent queue
//! - Sync and async factories, each derived from the other when only one is given
//! - Return validation, with reset-on-return for types that support it
//! - Soft maximum pool size; surplus and rejected objects are disposed
//! - Optional sync/async disposal hooks on pooled types
//! - Process-wide shared pool per type, hot-swappable with a new policy
//! - RAII guards that return objects on drop
//! - Counters with Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use orion_objectpool::{ObjectPool, Poolable};
//!
//! #[derive(Default)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! impl Poolable for Person {}
//!
//! let pool = ObjectPool::<Person>::default();
//! let mut person = pool.rent().unwrap();
//! person.name.push_str("Grace");
//! pool.return_object(person).unwrap();
//!
//! assert_eq!(pool.rent().unwrap().name, "Grace");
//! ```

mod capability;
mod errors;
mod metrics;
mod policy;
mod pool;
mod shared;
mod traits;

pub use capability::{AsyncDisposable, Disposable, Poolable, Resettable};
pub use errors::{DisposeError, PoolError, PoolResult};
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use policy::{BoxFuture, MAXIMUM_ALLOWED_POOL_SIZE, PooledObjectPolicy};
pub use pool::{ObjectPool, PooledObject};
pub use traits::Pool;

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
