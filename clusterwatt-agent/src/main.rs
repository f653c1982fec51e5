//! ClusterWatt agent - periodic cluster + PDU telemetry
//!
//! Loads `.env` and the config file, then polls the metrics backend and the
//! PDU on a fixed interval until Ctrl-C (or `MAX_CYCLES`).

use anyhow::{Context, Result};
use clusterwatt::config::TelemetryConfig;
use clusterwatt::metrics::QueryClient;
use clusterwatt::reporter::{ConsoleSink, JsonLinesSink, MqttSink, Reporter};
use clusterwatt::snmp::SnmpReader;
use clusterwatt::{Aggregator, Scheduler};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn build_reporter(config: &TelemetryConfig) -> Reporter {
    let mut reporter = Reporter::new();

    if config.report.console {
        reporter = reporter.with_sink(ConsoleSink::stdout());
    }
    if let Some(path) = &config.report.jsonl_path {
        info!("Appending snapshots to {}", path.display());
        reporter = reporter.with_sink(JsonLinesSink::new(path));
    }
    if let Some(mqtt) = &config.report.mqtt {
        reporter = reporter.with_sink(MqttSink::connect(mqtt));
    }
    if config.report.integrate_energy {
        reporter = reporter.with_energy_integration();
    }

    reporter
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("clusterwatt=info,clusterwatt_agent=info")),
        )
        .init();

    info!("⚡ ClusterWatt agent v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = TelemetryConfig::load().await.context("Failed to load configuration")?;
    let interval = config.schedule.interval()?;

    let metrics = QueryClient::new(&config.metrics).context("Failed to build metrics client")?;
    info!("Metrics backend: {}", metrics.url());
    let snmp = SnmpReader::from_config(&config.snmp);
    let aggregator = Aggregator::new(&config, metrics, snmp).context("Invalid PDU settings")?;

    let reporter = build_reporter(&config);
    info!("Report sinks: {:?}", reporter.sink_names());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!("Cannot listen for Ctrl-C: {}", e);
                // keep the sender alive so the scheduler is not told to stop
                std::future::pending::<()>().await;
            }
        }
    });

    let mut scheduler = Scheduler::new(aggregator, reporter, interval).with_max_cycles(config.schedule.max_cycles);
    let stats = scheduler.run(shutdown_rx).await;

    info!(
        "Stopped after {} cycle(s): {} emitted, {} failed",
        stats.cycles, stats.emitted, stats.failed
    );
    Ok(())
}
