use thiserror::Error;

use crate::family::MetricKind;

/// Errors raised while registering or updating instruments.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MonitorError {
    /// A counter was asked to move backwards.
    #[error("counter {name}: negative increment {amount}")]
    NegativeIncrement { name: String, amount: f64 },

    /// A counter increment was NaN or infinite.
    #[error("{name}: non-finite value {value}")]
    NonFiniteValue { name: String, value: f64 },

    /// Histogram bucket boundaries were empty, non-finite or not strictly increasing.
    #[error("histogram {name}: invalid buckets: {reason}")]
    InvalidBuckets { name: String, reason: String },

    /// The name is already registered as a different kind of instrument.
    #[error("metric {name} already registered as {existing}, requested {requested}")]
    KindConflict {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },

    /// The histogram is already registered with a different bucket layout.
    #[error("histogram {name} already registered with buckets {existing:?}")]
    BucketConflict { name: String, existing: Vec<f64> },
}

pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_negative_increment() {
        let err = MonitorError::NegativeIncrement {
            name: "syncs_total".into(),
            amount: -1.5,
        };
        assert_eq!(err.to_string(), "counter syncs_total: negative increment -1.5");
    }

    #[test]
    fn test_display_kind_conflict() {
        let err = MonitorError::KindConflict {
            name: "x".into(),
            existing: MetricKind::Counter,
            requested: MetricKind::Gauge,
        };
        let s = err.to_string();
        assert!(s.contains("already registered as counter"));
        assert!(s.contains("requested gauge"));
    }
}
