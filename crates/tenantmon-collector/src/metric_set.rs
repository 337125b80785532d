//! The instruments one tenant's blocks metadata fetcher updates.

use std::sync::Arc;
use std::time::Duration;
use tenantmon_monitor::{Counter, Gauge, Histogram, MetricsRegistry, Result};

pub const SYNCS: &str = "blocks_meta_syncs_total";
pub const SYNC_FAILURES: &str = "blocks_meta_sync_failures_total";
pub const SYNC_DURATION: &str = "blocks_meta_sync_duration_seconds";
pub const CONSISTENCY_DELAY: &str = "consistency_delay_seconds";

pub struct BlocksMetaMetrics {
    pub syncs: Arc<Counter>,
    pub sync_failures: Arc<Counter>,
    pub sync_duration: Arc<Histogram>,
    pub sync_consistency_delay: Arc<Gauge>,
}

impl BlocksMetaMetrics {
    pub fn new(registry: &MetricsRegistry, duration_buckets: &[f64]) -> Result<Self> {
        Ok(Self {
            syncs: registry.counter(SYNCS, "Total blocks metadata synchronization attempts")?,
            sync_failures: registry.counter(SYNC_FAILURES, "Total blocks metadata synchronization failures")?,
            sync_duration: registry.histogram(
                SYNC_DURATION,
                "Duration of the blocks metadata synchronization in seconds",
                duration_buckets,
            )?,
            sync_consistency_delay: registry
                .gauge(CONSISTENCY_DELAY, "Configured consistency delay in seconds.")?,
        })
    }

    /// A fresh tenant registry with the metric set registered in it.
    pub fn registered(duration_buckets: &[f64]) -> Result<(Arc<MetricsRegistry>, Self)> {
        let registry = Arc::new(MetricsRegistry::new());
        let metrics = Self::new(&registry, duration_buckets)?;
        Ok((registry, metrics))
    }

    /// Record one synchronization attempt.
    pub fn observe_sync(&self, elapsed: Duration, failed: bool) {
        self.syncs.increment();
        if failed {
            self.sync_failures.increment();
        }
        self.sync_duration.observe(elapsed.as_secs_f64());
    }

    pub fn set_consistency_delay(&self, delay: Duration) {
        self.sync_consistency_delay.set(delay.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantmon_monitor::MetricValue;

    #[test]
    fn test_observe_sync() {
        let (registry, m) = BlocksMetaMetrics::registered(&[1.0, 10.0]).unwrap();
        m.observe_sync(Duration::from_millis(500), false);
        m.observe_sync(Duration::from_secs(3), true);
        m.set_consistency_delay(Duration::from_secs(300));

        assert_eq!(m.syncs.get(), 2.0);
        assert_eq!(m.sync_failures.get(), 1.0);
        let snap = m.sync_duration.snapshot();
        assert_eq!(snap.cumulative, vec![1, 2]);
        assert_eq!(snap.sum, 3.5);

        let families = registry.gather();
        let delay = families.iter().find(|f| f.name == CONSISTENCY_DELAY).unwrap();
        assert_eq!(delay.unlabelled(), Some(&MetricValue::Gauge(300.0)));
    }

    #[test]
    fn test_shared_registry_reuses_instruments() {
        let registry = MetricsRegistry::new();
        let a = BlocksMetaMetrics::new(&registry, &[1.0]).unwrap();
        let b = BlocksMetaMetrics::new(&registry, &[1.0]).unwrap();
        a.syncs.increment();
        assert_eq!(b.syncs.get(), 1.0);
        assert!(BlocksMetaMetrics::new(&registry, &[2.0]).is_err());
    }
}
