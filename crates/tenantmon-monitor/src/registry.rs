use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{MonitorError, Result};
use crate::family::{Labels, MetricFamily, MetricKind, MetricValue, Sample};
use crate::metrics::{validate_buckets, Counter, Gauge, Histogram};

/// Anything that can produce metric families on demand.
///
/// Tenant registries implement this and so does the cross-tenant aggregator;
/// a registry can in turn have collectors registered into it.
pub trait Collector: Send + Sync {
    fn collect(&self) -> Vec<MetricFamily>;
}

enum Children {
    Counters(BTreeMap<Labels, Arc<Counter>>),
    Gauges(BTreeMap<Labels, Arc<Gauge>>),
    Histograms(BTreeMap<Labels, Arc<Histogram>>),
}

struct Family {
    help: String,
    kind: MetricKind,
    buckets: Vec<f64>,
    children: Mutex<Children>,
}

impl Family {
    fn new(help: &str, kind: MetricKind, buckets: &[f64]) -> Self {
        let children = match kind {
            MetricKind::Counter => Children::Counters(BTreeMap::new()),
            MetricKind::Gauge => Children::Gauges(BTreeMap::new()),
            MetricKind::Histogram => Children::Histograms(BTreeMap::new()),
        };
        Self {
            help: help.to_string(),
            kind,
            buckets: buckets.to_vec(),
            children: Mutex::new(children),
        }
    }

    fn samples(&self) -> Vec<Sample> {
        match &*self.children.lock() {
            Children::Counters(m) => m
                .iter()
                .map(|(labels, c)| Sample {
                    labels: labels.clone(),
                    value: MetricValue::Counter(c.get()),
                })
                .collect(),
            Children::Gauges(m) => m
                .iter()
                .map(|(labels, g)| Sample {
                    labels: labels.clone(),
                    value: MetricValue::Gauge(g.get()),
                })
                .collect(),
            Children::Histograms(m) => m
                .iter()
                .map(|(labels, h)| Sample {
                    labels: labels.clone(),
                    value: MetricValue::Histogram(h.snapshot()),
                })
                .collect(),
        }
    }
}

/// A set of named instruments plus any registered collectors.
///
/// Instrument handles are `Arc`s: once obtained, updates never touch the
/// registry's maps. Requesting an existing name with the same kind (and, for
/// histograms, the same buckets) returns the existing instrument.
pub struct MetricsRegistry {
    families: DashMap<String, Arc<Family>>,
    collectors: RwLock<Vec<Arc<dyn Collector>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            families: DashMap::new(),
            collectors: RwLock::new(Vec::new()),
        }
    }

    pub fn counter(&self, name: &str, help: &str) -> Result<Arc<Counter>> {
        self.counter_with_labels(name, help, Labels::new())
    }

    pub fn counter_with_labels(&self, name: &str, help: &str, labels: Labels) -> Result<Arc<Counter>> {
        let family = self.family(name, help, MetricKind::Counter, &[])?;
        let mut children = family.children.lock();
        match &mut *children {
            Children::Counters(m) => Ok(m
                .entry(labels)
                .or_insert_with(|| Arc::new(Counter::new(name)))
                .clone()),
            _ => Err(kind_conflict(name, family.kind, MetricKind::Counter)),
        }
    }

    pub fn gauge(&self, name: &str, help: &str) -> Result<Arc<Gauge>> {
        self.gauge_with_labels(name, help, Labels::new())
    }

    pub fn gauge_with_labels(&self, name: &str, help: &str, labels: Labels) -> Result<Arc<Gauge>> {
        let family = self.family(name, help, MetricKind::Gauge, &[])?;
        let mut children = family.children.lock();
        match &mut *children {
            Children::Gauges(m) => Ok(m
                .entry(labels)
                .or_insert_with(|| Arc::new(Gauge::new(name)))
                .clone()),
            _ => Err(kind_conflict(name, family.kind, MetricKind::Gauge)),
        }
    }

    pub fn histogram(&self, name: &str, help: &str, buckets: &[f64]) -> Result<Arc<Histogram>> {
        self.histogram_with_labels(name, help, buckets, Labels::new())
    }

    pub fn histogram_with_labels(
        &self,
        name: &str,
        help: &str,
        buckets: &[f64],
        labels: Labels,
    ) -> Result<Arc<Histogram>> {
        validate_buckets(name, buckets)?;
        let family = self.family(name, help, MetricKind::Histogram, buckets)?;
        let mut children = family.children.lock();
        match &mut *children {
            Children::Histograms(m) => {
                if let Some(h) = m.get(&labels) {
                    return Ok(h.clone());
                }
                let h = Arc::new(Histogram::new(name, buckets)?);
                m.insert(labels, h.clone());
                Ok(h)
            }
            _ => Err(kind_conflict(name, family.kind, MetricKind::Histogram)),
        }
    }

    /// Register a collector whose families are appended on `gather`.
    pub fn register(&self, collector: Arc<dyn Collector>) {
        self.collectors.write().push(collector);
    }

    /// Own instruments sorted by name, followed by registered collectors'
    /// families in registration order. Families without samples are omitted.
    pub fn gather(&self) -> Vec<MetricFamily> {
        let mut own: Vec<(String, Arc<Family>)> = self
            .families
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        own.sort_by(|a, b| a.0.cmp(&b.0));

        let mut families: Vec<MetricFamily> = own
            .into_iter()
            .map(|(name, family)| MetricFamily {
                name,
                help: family.help.clone(),
                kind: family.kind,
                unit: None,
                samples: family.samples(),
            })
            .collect();

        let collectors = self.collectors.read().clone();
        for collector in collectors {
            families.extend(collector.collect());
        }

        families.retain(|f| !f.samples.is_empty());
        families
    }

    fn family(&self, name: &str, help: &str, kind: MetricKind, buckets: &[f64]) -> Result<Arc<Family>> {
        let family = self
            .families
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Family::new(help, kind, buckets)))
            .value()
            .clone();
        if family.kind != kind {
            return Err(kind_conflict(name, family.kind, kind));
        }
        if kind == MetricKind::Histogram && family.buckets != buckets {
            return Err(MonitorError::BucketConflict {
                name: name.to_string(),
                existing: family.buckets.clone(),
            });
        }
        Ok(family)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for MetricsRegistry {
    fn collect(&self) -> Vec<MetricFamily> {
        self.gather()
    }
}

fn kind_conflict(name: &str, existing: MetricKind, requested: MetricKind) -> MonitorError {
    MonitorError::KindConflict {
        name: name.to_string(),
        existing,
        requested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_returns_same_instrument() {
        let reg = MetricsRegistry::new();
        let a = reg.counter("syncs_total", "help").unwrap();
        let b = reg.counter("syncs_total", "help").unwrap();
        a.increment();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.get(), 1.0);
    }

    #[test]
    fn test_kind_conflict() {
        let reg = MetricsRegistry::new();
        reg.counter("x", "help").unwrap();
        let err = reg.gauge("x", "help").unwrap_err();
        assert!(matches!(
            err,
            MonitorError::KindConflict {
                existing: MetricKind::Counter,
                requested: MetricKind::Gauge,
                ..
            }
        ));
    }

    #[test]
    fn test_bucket_conflict() {
        let reg = MetricsRegistry::new();
        reg.histogram("h", "help", &[1.0, 2.0]).unwrap();
        assert!(reg.histogram("h", "help", &[1.0, 2.0]).is_ok());
        let err = reg.histogram("h", "help", &[1.0, 3.0]).unwrap_err();
        assert!(matches!(err, MonitorError::BucketConflict { .. }));
    }

    #[test]
    fn test_gather_sorted_by_name() {
        let reg = MetricsRegistry::new();
        reg.gauge("b_gauge", "b").unwrap().set(2.0);
        reg.counter("a_total", "a").unwrap().add(1.0).unwrap();
        reg.histogram("c_seconds", "c", &[1.0]).unwrap().observe(0.5);

        let families = reg.gather();
        let names: Vec<_> = families.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a_total", "b_gauge", "c_seconds"]);
        assert_eq!(families[0].unlabelled(), Some(&MetricValue::Counter(1.0)));
        assert_eq!(families[1].help, "b");
    }

    #[test]
    fn test_labelled_children() {
        let reg = MetricsRegistry::new();
        let mut labels = Labels::new();
        labels.insert("reason".into(), "timeout".into());
        reg.counter_with_labels("failures_total", "f", labels.clone())
            .unwrap()
            .add(2.0)
            .unwrap();
        reg.counter("failures_total", "f").unwrap().increment();

        let families = reg.gather();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].samples.len(), 2);
        assert!(families[0].samples[0].labels.is_empty());
        assert_eq!(families[0].samples[1].labels, labels);
    }

    struct Fixed;

    impl Collector for Fixed {
        fn collect(&self) -> Vec<MetricFamily> {
            vec![MetricFamily::new("zz_fixed", "fixed", MetricKind::Gauge)
                .with_sample(Sample::new(MetricValue::Gauge(7.0)))]
        }
    }

    #[test]
    fn test_registered_collectors_follow_own_metrics() {
        let reg = MetricsRegistry::new();
        reg.register(Arc::new(Fixed));
        reg.counter("a_total", "a").unwrap();
        let names: Vec<_> = reg.gather().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["a_total", "zz_fixed"]);
    }
}
