//! Error types for the object pool

use std::error::Error;
use std::sync::Arc;

use thiserror::Error;

/// Error produced by a pooled object's disposal hook
pub type DisposeError = Box<dyn Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Cannot access a disposed object pool")]
    ObjectDisposed,

    #[error("Cannot return an absent object to the pool")]
    NullObject,

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Failed to dispose pooled object: {0}")]
    DisposeFailed(Arc<dyn Error + Send + Sync + 'static>),

    #[cfg(feature = "metrics")]
    #[error("Failed to encode metrics: {0}")]
    Metrics(String),
}

impl From<DisposeError> for PoolError {
    fn from(err: DisposeError) -> Self {
        PoolError::DisposeFailed(Arc::from(err))
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
