use serde::{Deserialize, Serialize};
use tenantmon_monitor::metrics::validate_buckets;
use tenantmon_monitor::{Labels, MetricKind};

use crate::error::SchemaError;
use crate::metric_set;

/// How scalar samples from different tenants combine.
///
/// Histograms always merge bucket-wise regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Sum,
    Max,
    Min,
}

impl Aggregation {
    pub fn combine(&self, a: f64, b: f64) -> f64 {
        match self {
            Aggregation::Sum => a + b,
            Aggregation::Max => a.max(b),
            Aggregation::Min => a.min(b),
        }
    }
}

/// One aggregated output family and where its inputs come from.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSpec {
    /// Family name inside each tenant source.
    pub source_name: String,
    /// Family name emitted by the aggregator.
    pub output_name: String,
    pub help: String,
    pub kind: MetricKind,
    pub unit: Option<String>,
    pub aggregation: Aggregation,
    /// Canonical bucket bounds; histograms only.
    pub buckets: Vec<f64>,
    /// Labels preserved in the output; all others are summed away.
    pub group_by: Vec<String>,
    /// Emit one sample per tenant under this label instead of a cross-tenant total.
    pub per_tenant_label: Option<String>,
}

impl MetricSpec {
    fn new(source: &str, output: &str, help: &str, kind: MetricKind, aggregation: Aggregation) -> Self {
        Self {
            source_name: source.to_string(),
            output_name: output.to_string(),
            help: help.to_string(),
            kind,
            unit: None,
            aggregation,
            buckets: Vec::new(),
            group_by: Vec::new(),
            per_tenant_label: None,
        }
    }

    pub fn counter(source: &str, output: &str, help: &str) -> Self {
        Self::new(source, output, help, MetricKind::Counter, Aggregation::Sum)
    }

    pub fn gauge(source: &str, output: &str, help: &str, aggregation: Aggregation) -> Self {
        Self::new(source, output, help, MetricKind::Gauge, aggregation)
    }

    pub fn histogram(source: &str, output: &str, help: &str, buckets: &[f64]) -> Self {
        let mut spec = Self::new(source, output, help, MetricKind::Histogram, Aggregation::Sum);
        spec.buckets = buckets.to_vec();
        spec
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn grouped_by(mut self, labels: &[&str]) -> Self {
        self.group_by = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn per_tenant(mut self, label: &str) -> Self {
        self.per_tenant_label = Some(label.to_string());
        self
    }

    /// Whether the output is a single unlabelled sample that exists even
    /// when no tenant reports anything.
    pub fn is_total(&self) -> bool {
        self.group_by.is_empty() && self.per_tenant_label.is_none()
    }

    /// Output labels for a tenant sample carrying `labels`.
    pub fn group_key(&self, tenant: &str, labels: &Labels) -> Labels {
        let mut key: Labels = self
            .group_by
            .iter()
            .map(|name| (name.clone(), labels.get(name).cloned().unwrap_or_default()))
            .collect();
        if let Some(label) = &self.per_tenant_label {
            key.insert(label.clone(), tenant.to_string());
        }
        key
    }
}

/// The ordered set of families an aggregator emits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationSchema {
    specs: Vec<MetricSpec>,
}

impl AggregationSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, spec: MetricSpec) -> Result<Self, SchemaError> {
        self.push(spec)?;
        Ok(self)
    }

    pub fn push(&mut self, spec: MetricSpec) -> Result<(), SchemaError> {
        if self.specs.iter().any(|s| s.output_name == spec.output_name) {
            return Err(SchemaError::DuplicateMetric(spec.output_name));
        }
        if spec.kind == MetricKind::Histogram {
            validate_buckets(&spec.output_name, &spec.buckets)?;
        }
        self.specs.push(spec);
        Ok(())
    }

    pub fn specs(&self) -> &[MetricSpec] {
        &self.specs
    }

    /// Schema for the blocks metadata fetcher metrics.
    pub fn blocks_meta(
        namespace: &str,
        duration_buckets: &[f64],
        consistency_delay: Aggregation,
    ) -> Result<Self, SchemaError> {
        Self::new()
            .with(
                MetricSpec::histogram(
                    metric_set::SYNC_DURATION,
                    &prefixed(namespace, "blocks_meta_sync_duration_seconds"),
                    "Duration of the blocks metadata synchronization in seconds",
                    duration_buckets,
                )
                .with_unit("seconds"),
            )?
            .with(MetricSpec::counter(
                metric_set::SYNC_FAILURES,
                &prefixed(namespace, "blocks_meta_sync_failures_total"),
                "Total blocks metadata synchronization failures",
            ))?
            .with(MetricSpec::counter(
                metric_set::SYNCS,
                &prefixed(namespace, "blocks_meta_syncs_total"),
                "Total blocks metadata synchronization attempts",
            ))?
            .with(
                MetricSpec::gauge(
                    metric_set::CONSISTENCY_DELAY,
                    &prefixed(namespace, "blocks_meta_sync_consistency_delay_seconds"),
                    "Configured consistency delay in seconds.",
                    consistency_delay,
                )
                .with_unit("seconds"),
            )
    }
}

pub fn prefixed(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", namespace, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine() {
        assert_eq!(Aggregation::Sum.combine(300.0, 300.0), 600.0);
        assert_eq!(Aggregation::Max.combine(300.0, 100.0), 300.0);
        assert_eq!(Aggregation::Min.combine(300.0, 100.0), 100.0);
    }

    #[test]
    fn test_blocks_meta_order_and_names() {
        let schema = AggregationSchema::blocks_meta("cortex_querier", &[1.0], Aggregation::Max).unwrap();
        let names: Vec<_> = schema.specs().iter().map(|s| s.output_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "cortex_querier_blocks_meta_sync_duration_seconds",
                "cortex_querier_blocks_meta_sync_failures_total",
                "cortex_querier_blocks_meta_syncs_total",
                "cortex_querier_blocks_meta_sync_consistency_delay_seconds",
            ]
        );
        assert_eq!(schema.specs()[3].source_name, "consistency_delay_seconds");
    }

    #[test]
    fn test_rejects_duplicates_and_bad_buckets() {
        let err = AggregationSchema::new()
            .with(MetricSpec::counter("a", "out", "h"))
            .unwrap()
            .with(MetricSpec::counter("b", "out", "h"))
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateMetric("out".into()));

        let err = AggregationSchema::blocks_meta("", &[10.0, 1.0], Aggregation::Sum).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidBuckets(_)));
    }

    #[test]
    fn test_group_key() {
        let spec = MetricSpec::counter("f", "f", "h").grouped_by(&["reason"]).per_tenant("user");
        let mut labels = Labels::new();
        labels.insert("reason".into(), "timeout".into());
        labels.insert("dropped".into(), "x".into());
        let key = spec.group_key("user1", &labels);
        assert_eq!(key.len(), 2);
        assert_eq!(key["reason"], "timeout");
        assert_eq!(key["user"], "user1");
        assert!(!spec.is_total());
    }

    #[test]
    fn test_prefixed() {
        assert_eq!(prefixed("", "x"), "x");
        assert_eq!(prefixed("ns", "x"), "ns_x");
    }
}
