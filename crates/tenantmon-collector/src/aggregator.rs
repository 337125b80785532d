//! Cross-tenant aggregation.
//!
//! Each pass snapshots the tenant table once, gathers every tenant source in
//! the snapshot, checks the tenant's families against the schema and folds
//! the valid ones into per-family accumulators. A tenant whose data does not
//! match the schema is left out of the pass and counted as skipped; the pass
//! itself always produces output.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tenantmon_monitor::{
    Collector, Counter, HistogramSnapshot, Labels, MetricFamily, MetricKind, MetricValue, Sample,
};

use crate::error::SkipReason;
use crate::schema::{Aggregation, AggregationSchema, MetricSpec};
use crate::table::TenantRegistryTable;

/// Outcome of one aggregation pass besides the families themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionReport {
    /// Tenants present in the pass snapshot.
    pub tenants_seen: usize,
    /// Tenants left out of the pass and why.
    pub skipped: Vec<(String, SkipReason)>,
}

impl CollectionReport {
    pub fn contributing(&self) -> usize {
        self.tenants_seen - self.skipped.len()
    }
}

enum Partial {
    Scalar(f64),
    Histogram(HistogramSnapshot),
}

struct Group {
    value: Partial,
    contributions: usize,
}

impl Group {
    fn merge(&mut self, part: Partial, aggregation: Aggregation) {
        if self.contributions == 0 {
            self.value = part;
        } else {
            match (&mut self.value, part) {
                (Partial::Scalar(acc), Partial::Scalar(v)) => *acc = aggregation.combine(*acc, v),
                (Partial::Histogram(acc), Partial::Histogram(h)) => acc.merge(&h),
                // Kinds are checked per tenant before anything is merged.
                _ => return,
            }
        }
        self.contributions += 1;
    }
}

struct Accumulator<'a> {
    spec: &'a MetricSpec,
    groups: BTreeMap<Labels, Group>,
}

impl<'a> Accumulator<'a> {
    fn new(spec: &'a MetricSpec) -> Self {
        let mut groups = BTreeMap::new();
        if spec.is_total() {
            let zero = match spec.kind {
                MetricKind::Histogram => Partial::Histogram(HistogramSnapshot::empty(&spec.buckets)),
                _ => Partial::Scalar(0.0),
            };
            groups.insert(
                Labels::new(),
                Group {
                    value: zero,
                    contributions: 0,
                },
            );
        }
        Self { spec, groups }
    }

    fn add(&mut self, key: Labels, part: Partial) {
        match self.groups.entry(key) {
            Entry::Vacant(e) => {
                e.insert(Group {
                    value: part,
                    contributions: 1,
                });
            }
            Entry::Occupied(e) => e.into_mut().merge(part, self.spec.aggregation),
        }
    }

    fn finish(self) -> Option<MetricFamily> {
        let kind = self.spec.kind;
        let samples: Vec<Sample> = self
            .groups
            .into_iter()
            .map(|(labels, group)| Sample {
                labels,
                value: match group.value {
                    Partial::Scalar(v) if kind == MetricKind::Counter => MetricValue::Counter(v),
                    Partial::Scalar(v) => MetricValue::Gauge(v),
                    Partial::Histogram(h) => MetricValue::Histogram(h),
                },
            })
            .collect();
        if samples.is_empty() {
            return None;
        }
        Some(MetricFamily {
            name: self.spec.output_name.clone(),
            help: self.spec.help.clone(),
            kind,
            unit: self.spec.unit.clone(),
            samples,
        })
    }
}

/// Merges the same-shaped metrics of every registered tenant into one view.
///
/// Register it into the exported registry; each `collect` is an independent
/// pass with its own accumulators, so concurrent passes are safe.
pub struct AggregatingCollector {
    table: Arc<TenantRegistryTable>,
    schema: AggregationSchema,
    skipped_tenants: Counter,
    anomaly_metric: Option<String>,
}

impl AggregatingCollector {
    pub fn new(schema: AggregationSchema) -> Self {
        Self::with_table(Arc::new(TenantRegistryTable::new()), schema)
    }

    pub fn with_table(table: Arc<TenantRegistryTable>, schema: AggregationSchema) -> Self {
        Self {
            table,
            schema,
            skipped_tenants: Counter::new("skipped_tenants_total"),
            anomaly_metric: None,
        }
    }

    /// Also emit the lifetime count of skipped tenant contributions as a
    /// counter family named `name`.
    pub fn with_anomaly_metric(mut self, name: impl Into<String>) -> Self {
        self.anomaly_metric = Some(name.into());
        self
    }

    pub fn table(&self) -> &Arc<TenantRegistryTable> {
        &self.table
    }

    pub fn schema(&self) -> &AggregationSchema {
        &self.schema
    }

    pub fn add_tenant(&self, tenant: impl Into<String>, source: Arc<dyn Collector>) {
        self.table.add(tenant, source);
    }

    pub fn remove_tenant(&self, tenant: &str) {
        self.table.remove(tenant);
    }

    /// Total tenant contributions skipped over the collector's lifetime.
    pub fn skipped_tenants_total(&self) -> u64 {
        self.skipped_tenants.get() as u64
    }

    pub fn collect_with_report(&self) -> (Vec<MetricFamily>, CollectionReport) {
        let snapshot = self.table.snapshot();
        let mut accumulators: Vec<Accumulator<'_>> =
            self.schema.specs().iter().map(Accumulator::new).collect();
        let mut report = CollectionReport {
            tenants_seen: snapshot.len(),
            skipped: Vec::new(),
        };

        for (tenant, source) in snapshot.iter() {
            let families = source.collect();
            match self.tenant_contribution(tenant, &families) {
                Ok(parts) => {
                    for (acc, samples) in accumulators.iter_mut().zip(parts) {
                        for (key, part) in samples {
                            acc.add(key, part);
                        }
                    }
                }
                Err(reason) => {
                    tracing::warn!(tenant = %tenant, reason = %reason, "Skipping tenant metrics");
                    self.skipped_tenants.increment();
                    report.skipped.push((tenant.to_string(), reason));
                }
            }
        }

        let mut out: Vec<MetricFamily> = accumulators.into_iter().filter_map(Accumulator::finish).collect();
        if let Some(name) = &self.anomaly_metric {
            out.push(
                MetricFamily::new(
                    name.clone(),
                    "Tenant metric contributions skipped because they did not match the aggregation schema.",
                    MetricKind::Counter,
                )
                .with_sample(Sample::new(MetricValue::Counter(self.skipped_tenants.get()))),
            );
        }

        tracing::debug!(
            tenants = report.tenants_seen,
            skipped = report.skipped.len(),
            families = out.len(),
            "Aggregation pass complete"
        );
        (out, report)
    }

    /// Validate one tenant's families and split them per schema entry.
    fn tenant_contribution(
        &self,
        tenant: &str,
        families: &[MetricFamily],
    ) -> Result<Vec<Vec<(Labels, Partial)>>, SkipReason> {
        let by_name: HashMap<&str, &MetricFamily> =
            families.iter().map(|f| (f.name.as_str(), f)).collect();

        let mut parts = Vec::with_capacity(self.schema.specs().len());
        for spec in self.schema.specs() {
            let mut samples = Vec::new();
            if let Some(family) = by_name.get(spec.source_name.as_str()) {
                if family.kind != spec.kind {
                    return Err(SkipReason::KindMismatch {
                        metric: spec.source_name.clone(),
                        expected: spec.kind,
                        actual: family.kind,
                    });
                }
                for sample in &family.samples {
                    let actual = sample.value.kind();
                    if actual != spec.kind {
                        return Err(SkipReason::KindMismatch {
                            metric: spec.source_name.clone(),
                            expected: spec.kind,
                            actual,
                        });
                    }
                    let part = match &sample.value {
                        MetricValue::Counter(v) | MetricValue::Gauge(v) => Partial::Scalar(*v),
                        MetricValue::Histogram(h) => {
                            if !h.same_layout(&spec.buckets) {
                                return Err(SkipReason::BucketMismatch {
                                    metric: spec.source_name.clone(),
                                    expected: spec.buckets.clone(),
                                    actual: h.bounds.clone(),
                                });
                            }
                            Partial::Histogram(h.clone())
                        }
                    };
                    samples.push((spec.group_key(tenant, &sample.labels), part));
                }
            }
            parts.push(samples);
        }
        Ok(parts)
    }
}

impl Collector for AggregatingCollector {
    fn collect(&self) -> Vec<MetricFamily> {
        self.collect_with_report().0
    }
}
