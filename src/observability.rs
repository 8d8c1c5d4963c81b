//! Metrics hooks for cache operations.
//!
//! Implement [`CacheMetrics`] to feed your monitoring system:
//!
//! ```ignore
//! use service_kit::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, _key: &str, _duration: Duration) {
//!         // counter!("cache_hits").inc();
//!     }
//!     fn record_compute(&self, _key: &str, _duration: Duration) {
//!         // histogram!("cache_compute_seconds").record(duration);
//!     }
//! }
//!
//! let cache = Cache::new(backend).with_metrics(Arc::new(PrometheusMetrics));
//! ```
//!
//! Methods not overridden log through the `log` crate. [`NoOpMetrics`], the
//! default, records nothing.
//!
//! Lifecycle hooks:
//! - `record_hit()` / `record_miss()` - read outcome with round-trip duration
//! - `record_compute()` - how long a `remember` compute callback ran
//! - `record_set()` - cache write with duration
//! - `record_error()` - any failed operation

use std::time::Duration;

/// Trait for cache metrics collection.
///
/// Keys passed to hooks are the caller's keys, without namespace prefix.
pub trait CacheMetrics: Send + Sync {
    /// Record a cache hit.
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    /// Record a cache miss.
    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    /// Record a compute callback run after a miss.
    fn record_compute(&self, key: &str, duration: Duration) {
        debug!("Cache COMPUTE: {} took {:?}", key, duration);
    }

    /// Record a cache set operation.
    fn record_set(&self, key: &str, duration: Duration) {
        debug!("Cache SET: {} took {:?}", key, duration);
    }

    /// Record an error.
    fn record_error(&self, key: &str, error: &str) {
        warn!("Cache ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_compute(&self, _key: &str, _duration: Duration) {}
    fn record_set(&self, _key: &str, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// Metrics implementation that logs every event at debug level.
#[derive(Clone, Default)]
pub struct LogMetrics;

impl CacheMetrics for LogMetrics {}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_metrics() {
        let metrics = NoOpMetrics;
        metrics.record_hit("key", Duration::from_secs(1));
        metrics.record_miss("key", Duration::from_secs(2));
        metrics.record_error("key", "boom");
    }

    #[test]
    fn test_log_metrics_uses_default_hooks() {
        let metrics: Box<dyn CacheMetrics> = Box::new(LogMetrics);
        metrics.record_compute("key", Duration::from_millis(5));
        metrics.record_set("key", Duration::from_millis(1));
    }

    #[test]
    fn test_recording_metrics_collects_events() {
        let metrics = testing::RecordingMetrics::default();
        metrics.record_miss("k", Duration::ZERO);
        metrics.record_compute("k", Duration::ZERO);
        metrics.record_set("k", Duration::ZERO);
        assert_eq!(metrics.events(), vec!["miss:k", "compute:k", "set:k"]);
    }
}
