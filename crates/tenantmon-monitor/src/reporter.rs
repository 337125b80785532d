use crate::family::{MetricFamily, MetricValue};

pub trait Reporter: Send + Sync {
    fn report(&self, families: &[MetricFamily]);
}

/// Logs one `tracing` event per sample.
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, families: &[MetricFamily]) {
        for family in families {
            for sample in &family.samples {
                match &sample.value {
                    MetricValue::Counter(v) | MetricValue::Gauge(v) => tracing::info!(
                        name = %family.name,
                        kind = %family.kind,
                        labels = ?sample.labels,
                        value = *v,
                        "metric"
                    ),
                    MetricValue::Histogram(h) => tracing::info!(
                        name = %family.name,
                        kind = %family.kind,
                        unit = ?family.unit,
                        labels = ?sample.labels,
                        count = h.count,
                        sum = h.sum,
                        buckets = ?h.cumulative,
                        "metric"
                    ),
                }
            }
        }
    }
}
