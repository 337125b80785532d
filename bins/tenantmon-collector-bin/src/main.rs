use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tenantmon_collector::{build_exporter, AggregatingCollector, BlocksMetaMetrics, CollectorConfig, ScrapeLoop};
use tenantmon_config::ConfigManager;
use tenantmon_monitor::MetricsRegistry;
use tokio::signal::unix::{signal, SignalKind};

/// Multi-tenant metrics aggregation collector
#[derive(Parser, Debug)]
#[command(name = "tenantmon-collector", version, about)]
struct Args {
    /// Path to configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Dump default configuration and exit
    #[arg(long)]
    dump_default_config: bool,

    /// Register this many synthetic tenants that report sync activity
    #[arg(long, default_value_t = 0)]
    demo_tenants: usize,
}

enum Signal {
    Reload,
    Shutdown,
}

async fn wait_for_signal() -> anyhow::Result<Signal> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let received = tokio::select! {
        r = tokio::signal::ctrl_c() => { r?; tracing::info!("Received CTRL+C"); Signal::Shutdown }
        _ = sigterm.recv() => { tracing::info!("Received SIGTERM"); Signal::Shutdown }
        _ = sighup.recv() => { tracing::info!("Received SIGHUP"); Signal::Reload }
    };
    Ok(received)
}

fn spawn_demo_tenants(aggregator: &AggregatingCollector, config: &CollectorConfig, count: usize) -> anyhow::Result<()> {
    for i in 0..count {
        let (registry, metrics) = BlocksMetaMetrics::registered(&config.sync_duration_buckets)?;
        metrics.set_consistency_delay(Duration::from_secs(300));
        aggregator.add_tenant(format!("demo-{}", i), registry);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1 + i as u64));
            let mut attempt = 0u64;
            loop {
                ticker.tick().await;
                attempt += 1;
                let elapsed = Duration::from_millis(50 * (1 + attempt % 20));
                metrics.observe_sync(elapsed, attempt % 7 == 0);
            }
        });
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.dump_default_config {
        print!("{}", toml::to_string_pretty(&CollectorConfig::default())?);
        return Ok(());
    }

    let manager = match &args.config {
        Some(path) => ConfigManager::<CollectorConfig>::load(path)?,
        None => ConfigManager::new(CollectorConfig::default()),
    };
    let config = manager.snapshot();
    let _log_guard = tenantmon_logging::init_logging(&config.log)?;

    tracing::info!(
        config = ?args.config,
        namespace = %config.namespace,
        reporter = ?config.reporter_type,
        "Starting tenant metrics collector"
    );

    let mut aggregator = AggregatingCollector::new(config.schema()?);
    if let Some(name) = config.anomaly_metric_name() {
        aggregator = aggregator.with_anomaly_metric(name);
    }
    let aggregator = Arc::new(aggregator);

    let registry = Arc::new(MetricsRegistry::new());
    registry.register(aggregator.clone());

    spawn_demo_tenants(&aggregator, &config, args.demo_tenants)?;

    let exporter = build_exporter(&config);
    let mut scrape = ScrapeLoop::spawn(registry.clone(), exporter.clone(), config.scrape_interval());

    loop {
        match wait_for_signal().await? {
            Signal::Shutdown => break,
            Signal::Reload => {
                if let Err(e) = manager.reload() {
                    tracing::error!(error = %e, "Config reload failed, keeping current config");
                    continue;
                }
                let interval = manager.get().scrape_interval();
                if interval != scrape.interval() {
                    scrape.shutdown().await;
                    scrape = ScrapeLoop::spawn(registry.clone(), exporter.clone(), interval);
                }
            }
        }
    }

    scrape.shutdown().await;
    tracing::info!(
        tenants = aggregator.table().len(),
        skipped = aggregator.skipped_tenants_total(),
        "Tenant metrics collector shutting down"
    );

    Ok(())
}
