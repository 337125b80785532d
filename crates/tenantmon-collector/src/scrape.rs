//! Periodic scrape of a collector into an exporter.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tenantmon_monitor::Collector;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::exporter::Exporter;

#[derive(Debug, Default)]
pub struct ScrapeStats {
    scrapes: AtomicU64,
    failures: AtomicU64,
    last_success: Mutex<Option<DateTime<Utc>>>,
}

impl ScrapeStats {
    pub fn scrapes(&self) -> u64 {
        self.scrapes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.lock()
    }
}

/// Gather `source` once and hand the result to `exporter`.
///
/// Export failures are logged and counted; they never end the loop.
pub async fn scrape_once(source: &dyn Collector, exporter: &dyn Exporter, stats: &ScrapeStats) -> bool {
    let families = source.collect();
    stats.scrapes.fetch_add(1, Ordering::Relaxed);
    match exporter.export(&families).await {
        Ok(()) => {
            *stats.last_success.lock() = Some(Utc::now());
            tracing::trace!(families = families.len(), "Scrape exported");
            true
        }
        Err(e) => {
            stats.failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "Failed to export scrape");
            false
        }
    }
}

pub struct ScrapeLoop {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
    stats: Arc<ScrapeStats>,
    interval: Duration,
}

impl ScrapeLoop {
    /// Start scraping every `interval`, beginning immediately.
    pub fn spawn(source: Arc<dyn Collector>, exporter: Arc<dyn Exporter>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let stats = Arc::new(ScrapeStats::default());
        let task_stats = stats.clone();

        let handle = tokio::spawn(async move {
            tracing::info!(interval_ms = interval.as_millis() as u64, "Scrape loop started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scrape_once(source.as_ref(), exporter.as_ref(), &task_stats).await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            tracing::info!(scrapes = task_stats.scrapes(), "Scrape loop stopped");
        });

        Self {
            shutdown_tx,
            handle,
            stats,
            interval,
        }
    }

    pub fn stats(&self) -> Arc<ScrapeStats> {
        self.stats.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportError;
    use crate::exporter::InMemoryExporter;
    use async_trait::async_trait;
    use tenantmon_monitor::{MetricFamily, MetricsRegistry};

    struct Failing;

    #[async_trait]
    impl Exporter for Failing {
        async fn export(&self, _families: &[MetricFamily]) -> Result<(), ExportError> {
            Err(ExportError::Closed)
        }
    }

    fn registry() -> Arc<MetricsRegistry> {
        let registry = Arc::new(MetricsRegistry::new());
        registry.counter("syncs_total", "syncs").unwrap().add(3.0).unwrap();
        registry
    }

    #[tokio::test]
    async fn test_scrape_once() {
        let exporter = InMemoryExporter::new();
        let stats = ScrapeStats::default();
        assert!(scrape_once(registry().as_ref(), &exporter, &stats).await);
        assert_eq!(stats.scrapes(), 1);
        assert!(stats.last_success().is_some());
        assert_eq!(exporter.latest()[0].name, "syncs_total");
    }

    #[tokio::test]
    async fn test_failed_export_is_counted() {
        let stats = ScrapeStats::default();
        assert!(!scrape_once(registry().as_ref(), &Failing, &stats).await);
        assert_eq!(stats.failures(), 1);
        assert!(stats.last_success().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_scrapes_until_shutdown() {
        let exporter = Arc::new(InMemoryExporter::new());
        let scrape = ScrapeLoop::spawn(registry(), exporter.clone(), Duration::from_millis(10));
        assert_eq!(scrape.interval(), Duration::from_millis(10));
        let stats = scrape.stats();

        // Ticks at 0, 10, 20 and 30ms.
        tokio::time::sleep(Duration::from_millis(35)).await;
        assert_eq!(stats.scrapes(), 4);
        scrape.shutdown().await;
        assert_eq!(exporter.export_count(), 4);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(stats.scrapes(), 4);
    }
}
