//! Snapshot reporting
//!
//! A `Reporter` fans each snapshot out to its sinks:
//! - console: key-aligned text on stdout
//! - JSON lines: one serialized snapshot per line, appended to a file
//! - MQTT: JSON snapshot published on a topic
//!
//! A failing sink is logged and skipped; it never fails the cycle.

mod mqtt;
mod sinks;

pub use mqtt::MqttSink;
pub use sinks::{ConsoleSink, JsonLinesSink};

use crate::energy::EnergyIntegrator;
use crate::snapshot::ClusterSnapshot;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use tracing::error;

const NODE_COLUMNS: [&str; 6] = ["node", "active", "cpu_util_%", "cpu_reserved", "mem_util_%", "mem_reserved_gib"];
const KEY_WIDTH: usize = 16;

/// What sinks receive each cycle.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Report<'a> {
    #[serde(flatten)]
    pub snapshot: &'a ClusterSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrated_energy_wh: Option<f64>,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot;
        writeln!(f, "== cluster snapshot {} ==", snapshot.timestamp().format("%Y/%m/%d %H:%M:%S UTC"))?;

        let name_width = snapshot
            .nodes()
            .keys()
            .map(|name| name.len())
            .chain(std::iter::once(NODE_COLUMNS[0].len()))
            .max()
            .unwrap_or(0);

        write!(f, "{:<name_width$}", NODE_COLUMNS[0])?;
        for column in &NODE_COLUMNS[1..] {
            write!(f, "  {column}")?;
        }
        writeln!(f)?;

        for (name, stats) in snapshot.nodes() {
            let active = if stats.active { "yes" } else { "no" };
            write!(f, "{:<name_width$}  {:<w$}", name, active, w = NODE_COLUMNS[1].len())?;
            let figures = [
                stats.cpu_utilization_pct,
                stats.cpu_reserved_cores,
                stats.mem_utilization_pct,
                stats.mem_reserved_gib,
            ];
            for (column, value) in NODE_COLUMNS[2..].iter().zip(figures) {
                write!(f, "  {:>w$.2}", value, w = column.len())?;
            }
            writeln!(f)?;
        }

        let pdu = snapshot.pdu();
        writeln!(f, "{:<KEY_WIDTH$}{:>12.2}", "power_watts", pdu.power_watts)?;
        writeln!(f, "{:<KEY_WIDTH$}{:>12.2}", "energy_wh", pdu.energy_wh)?;
        if let Some(total) = self.integrated_energy_wh {
            writeln!(f, "{:<KEY_WIDTH$}{:>12.2}", "integrated_wh", total)?;
        }
        if !snapshot.unknown_nodes().is_empty() {
            writeln!(f, "{:<KEY_WIDTH$}{}", "unknown_nodes", snapshot.unknown_nodes().join(", "))?;
        }
        Ok(())
    }
}

/// Output collaborator for reports.
#[async_trait]
pub trait ReportSink: Send {
    fn name(&self) -> &'static str;
    async fn emit(&mut self, report: &Report<'_>) -> Result<()>;
}

#[derive(Default)]
pub struct Reporter {
    sinks: Vec<Box<dyn ReportSink>>,
    integrator: Option<EnergyIntegrator>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with_energy_integration(mut self) -> Self {
        self.integrator = Some(EnergyIntegrator::new());
        self
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub async fn report(&mut self, snapshot: &ClusterSnapshot) {
        let integrated_energy_wh = self.integrator.as_mut().map(|i| i.record(snapshot.pdu()));
        let report = Report { snapshot, integrated_energy_wh };

        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.emit(&report).await {
                error!("Failed to emit snapshot to {} sink: {:#}", sink.name(), e);
            }
        }
    }
}
