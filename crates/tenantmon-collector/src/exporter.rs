//! Exporter backends for aggregated metric families.
//!
//! - `LogExporter`: hands every scrape to the monitor's `LogReporter`.
//! - `TextFileExporter`: writes the text exposition format to a file,
//!   replacing it atomically so readers never see a partial scrape.
//! - `InMemoryExporter`: keeps the latest families for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tenantmon_monitor::{text, LogReporter, MetricFamily, Reporter};

use crate::config::{CollectorConfig, ReporterType};
use crate::error::ExportError;

#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, families: &[MetricFamily]) -> Result<(), ExportError>;
}

pub struct LogExporter;

#[async_trait]
impl Exporter for LogExporter {
    async fn export(&self, families: &[MetricFamily]) -> Result<(), ExportError> {
        LogReporter.report(families);
        Ok(())
    }
}

pub struct TextFileExporter {
    path: PathBuf,
}

impl TextFileExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Exporter for TextFileExporter {
    async fn export(&self, families: &[MetricFamily]) -> Result<(), ExportError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let body = text::encode(families)?;
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(body.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryExporter {
    latest: Mutex<Vec<MetricFamily>>,
    exports: AtomicU64,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Families from the most recent export.
    pub fn latest(&self) -> Vec<MetricFamily> {
        self.latest.lock().clone()
    }

    pub fn export_count(&self) -> u64 {
        self.exports.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Exporter for InMemoryExporter {
    async fn export(&self, families: &[MetricFamily]) -> Result<(), ExportError> {
        *self.latest.lock() = families.to_vec();
        self.exports.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// The exporter selected by `config.reporter_type`.
pub fn build_exporter(config: &CollectorConfig) -> Arc<dyn Exporter> {
    match config.reporter_type {
        ReporterType::Log => Arc::new(LogExporter),
        ReporterType::File => Arc::new(TextFileExporter::new(&config.export_path)),
        ReporterType::Memory => Arc::new(InMemoryExporter::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantmon_monitor::{MetricKind, MetricValue, Sample};

    fn families() -> Vec<MetricFamily> {
        vec![MetricFamily::new("syncs_total", "Total syncs", MetricKind::Counter)
            .with_sample(Sample::new(MetricValue::Counter(15.0)))]
    }

    #[tokio::test]
    async fn test_log_exporter() {
        assert!(LogExporter.export(&families()).await.is_ok());
    }

    #[tokio::test]
    async fn test_text_file_exporter_replaces_content() {
        let dir = std::env::temp_dir().join("tenantmon-test-text-exporter");
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("metrics.prom");
        let exporter = TextFileExporter::new(&path);

        exporter.export(&families()).await.unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("syncs_total 15\n"));

        let updated = vec![MetricFamily::new("syncs_total", "Total syncs", MetricKind::Counter)
            .with_sample(Sample::new(MetricValue::Counter(16.0)))];
        exporter.export(&updated).await.unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("syncs_total 16\n"));
        assert!(!content.contains("syncs_total 15\n"));
        assert!(!path.with_extension("tmp").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_in_memory_exporter() {
        let exporter = InMemoryExporter::new();
        exporter.export(&families()).await.unwrap();
        exporter.export(&families()).await.unwrap();
        assert_eq!(exporter.export_count(), 2);
        assert_eq!(exporter.latest(), families());
    }
}
