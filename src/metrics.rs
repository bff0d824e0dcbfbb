//! Metrics collection and export for object pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Snapshot of a pool's counters
///
/// # Examples
///
/// ```
/// use orion_objectpool::ObjectPool;
///
/// let pool = ObjectPool::<String>::default();
/// let s = pool.rent().unwrap();
/// pool.return_object(s).unwrap();
///
/// let metrics = pool.metrics();
/// assert_eq!(metrics.total_rented, 1);
/// assert_eq!(metrics.total_retained, 1);
/// assert_eq!(metrics.pooled_objects, 1);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Successful rent calls
    pub total_rented: usize,

    /// Objects built by the policy's factories
    pub total_created: usize,

    /// Objects handed back to the pool
    pub total_returned: usize,

    /// Returned objects the pool kept
    pub total_retained: usize,

    /// Returned objects refused by the return validator
    pub validation_failures: usize,

    /// Returned objects dropped because the pool was full
    pub capacity_discards: usize,

    /// Objects the pool disposed (rejected, over capacity or cleared)
    pub total_disposed: usize,

    /// Idle objects currently held
    pub pooled_objects: usize,

    /// Configured maximum pool size
    pub max_pool_size: usize,

    /// Fill ratio (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_rented".to_string(), self.total_rented.to_string());
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("total_retained".to_string(), self.total_retained.to_string());
        metrics.insert("validation_failures".to_string(), self.validation_failures.to_string());
        metrics.insert("capacity_discards".to_string(), self.capacity_discards.to_string());
        metrics.insert("total_disposed".to_string(), self.total_disposed.to_string());
        metrics.insert("pooled_objects".to_string(), self.pooled_objects.to_string());
        metrics.insert("max_pool_size".to_string(), self.max_pool_size.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use orion_objectpool::{MetricsExporter, ObjectPool};
    /// use std::collections::HashMap;
    ///
    /// let pool = ObjectPool::<String>::default();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = MetricsExporter::export_prometheus(&pool.metrics(), "my_pool", Some(&tags)).unwrap();
    /// assert!(output.contains("objectpool_objects_pooled"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> crate::PoolResult<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let encode_err = |e: prometheus::Error| crate::PoolError::Metrics(e.to_string());

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            labels.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());

        let registry = Registry::new();
        let counters = [
            ("objectpool_objects_rented_total", "Total objects rented", metrics.total_rented),
            ("objectpool_objects_created_total", "Total objects created by the factory", metrics.total_created),
            ("objectpool_objects_returned_total", "Total objects returned", metrics.total_returned),
            ("objectpool_objects_retained_total", "Total returned objects kept", metrics.total_retained),
            ("objectpool_validation_failures_total", "Validation failures", metrics.validation_failures),
            ("objectpool_capacity_discards_total", "Objects dropped at capacity", metrics.capacity_discards),
            ("objectpool_objects_disposed_total", "Total objects disposed", metrics.total_disposed),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help)).map_err(encode_err)?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter)).map_err(encode_err)?;
        }

        let pooled = IntGauge::with_opts(opts("objectpool_objects_pooled", "Current idle objects"))
            .map_err(encode_err)?;
        pooled.set(metrics.pooled_objects as i64);
        registry.register(Box::new(pooled)).map_err(encode_err)?;

        let utilization = Gauge::with_opts(opts("objectpool_utilization", "Pool fill ratio"))
            .map_err(encode_err)?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization)).map_err(encode_err)?;

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(encode_err)?;
        String::from_utf8(buffer).map_err(|e| crate::PoolError::Metrics(e.to_string()))
    }
}

/// Internal metrics tracker
pub(crate) struct MetricsTracker {
    pub total_rented: AtomicUsize,
    pub total_created: AtomicUsize,
    pub total_returned: AtomicUsize,
    pub total_retained: AtomicUsize,
    pub validation_failures: AtomicUsize,
    pub capacity_discards: AtomicUsize,
    pub total_disposed: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            total_rented: AtomicUsize::new(0),
            total_created: AtomicUsize::new(0),
            total_returned: AtomicUsize::new(0),
            total_retained: AtomicUsize::new(0),
            validation_failures: AtomicUsize::new(0),
            capacity_discards: AtomicUsize::new(0),
            total_disposed: AtomicUsize::new(0),
        }
    }

    pub fn get_metrics(&self, pooled: usize, max_pool_size: usize) -> PoolMetrics {
        let utilization = if max_pool_size > 0 {
            (pooled as f64 / max_pool_size as f64).min(1.0)
        } else {
            0.0
        };

        PoolMetrics {
            total_rented: self.total_rented.load(Ordering::Relaxed),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            total_retained: self.total_retained.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            capacity_discards: self.capacity_discards.load(Ordering::Relaxed),
            total_disposed: self.total_disposed.load(Ordering::Relaxed),
            pooled_objects: pooled,
            max_pool_size,
            utilization,
        }
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}
