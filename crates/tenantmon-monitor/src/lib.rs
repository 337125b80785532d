//! Instruments and registries for per-tenant metrics.
//!
//! Every tenant owns a [`MetricsRegistry`] whose instruments are updated with
//! plain atomic operations. Registries, and anything else that can enumerate
//! metric families on demand, implement [`Collector`]. The [`text`] module
//! renders gathered families in the plain-text exposition format through
//! `prometheus::TextEncoder`.

pub mod error;
pub mod family;
pub mod metrics;
pub mod registry;
pub mod reporter;
pub mod snapshot;
pub mod text;

pub use error::{MonitorError, Result};
pub use family::{Labels, MetricFamily, MetricKind, MetricValue, Sample};
pub use metrics::{Counter, Gauge, Histogram};
pub use registry::{Collector, MetricsRegistry};
pub use reporter::{LogReporter, Reporter};
pub use snapshot::HistogramSnapshot;
