use tenantmon_monitor::{MetricKind, MonitorError};
use thiserror::Error;

/// Why a tenant's contribution was left out of an aggregation pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("metric {metric}: expected {expected}, tenant reported {actual}")]
    KindMismatch {
        metric: String,
        expected: MetricKind,
        actual: MetricKind,
    },

    #[error("metric {metric}: bucket bounds {actual:?} differ from {expected:?}")]
    BucketMismatch {
        metric: String,
        expected: Vec<f64>,
        actual: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("metric {0} declared twice")]
    DuplicateMetric(String),

    #[error(transparent)]
    InvalidBuckets(#[from] MonitorError),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] prometheus::Error),

    #[error("exporter closed")]
    Closed,
}
