use serde::{Deserialize, Serialize};
use std::time::Duration;
use tenantmon_config::{Config, ConfigError};
use tenantmon_logging::LogConfig;
use tenantmon_monitor::metrics::validate_buckets;

use crate::error::SchemaError;
use crate::schema::{prefixed, Aggregation, AggregationSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReporterType {
    #[default]
    Log,
    File,
    Memory,
}

/// Configuration for the aggregating collector process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Prefix joined with `_` to every emitted metric name.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_buckets")]
    pub sync_duration_buckets: Vec<f64>,

    /// How per-tenant consistency delays combine.
    #[serde(default = "default_delay_aggregation")]
    pub consistency_delay_aggregation: Aggregation,

    /// Seconds between scrapes. Hot-updatable.
    #[serde(default = "default_scrape_interval")]
    pub scrape_interval_secs: u64,

    /// Emit the skipped-tenants counter alongside the aggregated families.
    #[serde(default)]
    pub emit_anomaly_metric: bool,

    #[serde(default)]
    pub reporter_type: ReporterType,

    /// Target file when `reporter_type` is `file`.
    #[serde(default = "default_export_path")]
    pub export_path: String,

    #[serde(default)]
    pub log: LogConfig,
}

fn default_namespace() -> String {
    "cortex_querier".to_string()
}

fn default_buckets() -> Vec<f64> {
    vec![0.01, 1.0, 10.0, 100.0, 1000.0]
}

fn default_delay_aggregation() -> Aggregation {
    Aggregation::Max
}

fn default_scrape_interval() -> u64 {
    15
}

fn default_export_path() -> String {
    "./metrics/tenantmon.prom".to_string()
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            sync_duration_buckets: default_buckets(),
            consistency_delay_aggregation: default_delay_aggregation(),
            scrape_interval_secs: default_scrape_interval(),
            emit_anomaly_metric: false,
            reporter_type: ReporterType::default(),
            export_path: default_export_path(),
            log: LogConfig::default(),
        }
    }
}

impl CollectorConfig {
    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_secs)
    }

    pub fn schema(&self) -> Result<AggregationSchema, SchemaError> {
        AggregationSchema::blocks_meta(
            &self.namespace,
            &self.sync_duration_buckets,
            self.consistency_delay_aggregation,
        )
    }

    pub fn anomaly_metric_name(&self) -> Option<String> {
        self.emit_anomaly_metric
            .then(|| prefixed(&self.namespace, "blocks_meta_aggregation_skipped_tenants_total"))
    }
}

impl Config for CollectorConfig {
    fn from_toml(value: &toml::Value) -> Result<Self, ConfigError> {
        Ok(value.clone().try_into()?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_buckets("sync_duration_buckets", &self.sync_duration_buckets)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.scrape_interval_secs == 0 {
            return Err(ConfigError::Invalid("scrape_interval_secs must be > 0".into()));
        }
        if self.reporter_type == ReporterType::File && self.export_path.is_empty() {
            return Err(ConfigError::Invalid("export_path required for file reporter".into()));
        }
        Ok(())
    }

    fn hot_update(&mut self, other: &Self) {
        self.scrape_interval_secs = other.scrape_interval_secs;
    }
}
