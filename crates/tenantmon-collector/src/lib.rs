//! Multi-tenant metrics aggregation.
//!
//! Tenants register their own [`tenantmon_monitor::MetricsRegistry`] in a
//! [`TenantRegistryTable`]. An [`AggregatingCollector`], registered into the
//! exported registry, merges same-named families across all tenants present
//! at the start of each collection pass according to an
//! [`AggregationSchema`]. A [`ScrapeLoop`] periodically hands the exported
//! registry to an [`Exporter`].

pub mod aggregator;
pub mod config;
pub mod error;
pub mod exporter;
pub mod metric_set;
pub mod schema;
pub mod scrape;
pub mod table;

pub use aggregator::{AggregatingCollector, CollectionReport};
pub use config::{CollectorConfig, ReporterType};
pub use error::{ExportError, SchemaError, SkipReason};
pub use exporter::{build_exporter, Exporter, InMemoryExporter, LogExporter, TextFileExporter};
pub use metric_set::BlocksMetaMetrics;
pub use schema::{Aggregation, AggregationSchema, MetricSpec};
pub use scrape::{ScrapeLoop, ScrapeStats};
pub use table::{TenantRegistryTable, TenantSnapshot};
