//! One aggregation cycle
//!
//! inventory -> cpu/mem utilization + reservation -> PDU power/energy -> merge.
//! Any failing sub-step aborts the cycle; nothing partial is kept.

use crate::config::{ConfigError, PduTarget, QueryConfig, TelemetryConfig};
use crate::error::CycleError;
use crate::metrics::{LabelValues, MetricsSource};
use crate::snapshot::{bytes_to_gib, ratio_to_pct, ClusterSnapshot, NodeSnapshot, NodeStats, PduReading};
use crate::snmp::SnmpRead;
use chrono::Utc;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryName {
    Inventory,
    CpuUtilization,
    CpuReserved,
    MemUtilization,
    MemReserved,
}

impl QueryName {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryName::Inventory => "inventory",
            QueryName::CpuUtilization => "cpu_utilization",
            QueryName::CpuReserved => "cpu_reserved",
            QueryName::MemUtilization => "mem_utilization",
            QueryName::MemReserved => "mem_reserved",
        }
    }
}

impl fmt::Display for QueryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduMetric {
    Power,
    Energy,
}

impl fmt::Display for PduMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PduMetric::Power => "power",
            PduMetric::Energy => "energy",
        })
    }
}

/// Query results a merge works from. Borrowed, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct NodeInputs<'a> {
    pub cpu_utilization: &'a LabelValues,
    pub cpu_reserved: &'a LabelValues,
    pub mem_utilization: &'a LabelValues,
    pub mem_reserved: &'a LabelValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedNodes {
    pub nodes: NodeSnapshot,
    /// Labels seen in any input but absent from the inventory, sorted.
    pub unknown: Vec<String>,
}

/// Build a fresh node snapshot from the inventory and the query results.
///
/// Nodes present in the CPU utilization result are active and pick up the
/// other figures by label (missing ones stay 0). Every other inventory node
/// is inactive with all figures at 0. Labels outside the inventory are
/// reported in `unknown` and never merged.
pub fn merge_nodes(inventory: &BTreeSet<String>, inputs: NodeInputs<'_>) -> MergedNodes {
    let nodes = inventory
        .iter()
        .map(|name| {
            let stats = match inputs.cpu_utilization.get(name) {
                Some(cpu) => NodeStats {
                    cpu_utilization_pct: ratio_to_pct(*cpu),
                    cpu_reserved_cores: inputs.cpu_reserved.get(name).copied().unwrap_or(0.0),
                    mem_utilization_pct: inputs.mem_utilization.get(name).map_or(0.0, |m| ratio_to_pct(*m)),
                    mem_reserved_gib: inputs.mem_reserved.get(name).map_or(0.0, |b| bytes_to_gib(*b)),
                    active: true,
                },
                None => NodeStats::default(),
            };
            (name.clone(), stats)
        })
        .collect();

    let unknown: BTreeSet<&String> = [
        inputs.cpu_utilization,
        inputs.cpu_reserved,
        inputs.mem_utilization,
        inputs.mem_reserved,
    ]
    .into_iter()
    .flat_map(|values| values.keys())
    .filter(|name| !inventory.contains(*name))
    .collect();

    MergedNodes {
        nodes,
        unknown: unknown.into_iter().cloned().collect(),
    }
}

struct CycleInputs {
    inventory: LabelValues,
    cpu_utilization: LabelValues,
    cpu_reserved: LabelValues,
    mem_utilization: LabelValues,
    mem_reserved: LabelValues,
    raw_power: i64,
    raw_energy: i64,
}

pub struct Aggregator<M, S> {
    metrics: M,
    snmp: S,
    queries: QueryConfig,
    pdu: PduTarget,
    concurrent: bool,
}

impl<M: MetricsSource, S: SnmpRead> Aggregator<M, S> {
    pub fn new(config: &TelemetryConfig, metrics: M, snmp: S) -> Result<Self, ConfigError> {
        Ok(Self {
            metrics,
            snmp,
            queries: config.metrics.queries.clone(),
            pdu: config.snmp.pdu_target()?,
            concurrent: config.schedule.concurrent_queries,
        })
    }

    pub fn pdu_address(&self) -> &str {
        &self.pdu.address
    }

    /// Run one full cycle and build its snapshot.
    pub async fn collect(&self) -> Result<ClusterSnapshot, CycleError> {
        let inputs = if self.concurrent {
            self.gather_concurrent().await?
        } else {
            self.gather_sequential().await?
        };
        let pdu_timestamp = Utc::now();

        let inventory: BTreeSet<String> = inputs.inventory.keys().cloned().collect();
        if inventory.is_empty() {
            warn!("Inventory query `{}` returned no nodes", self.queries.inventory);
        }

        let merged = merge_nodes(
            &inventory,
            NodeInputs {
                cpu_utilization: &inputs.cpu_utilization,
                cpu_reserved: &inputs.cpu_reserved,
                mem_utilization: &inputs.mem_utilization,
                mem_reserved: &inputs.mem_reserved,
            },
        );
        if !merged.unknown.is_empty() {
            warn!(
                "Query results mention nodes outside the inventory, not merged: {}",
                merged.unknown.join(", ")
            );
        }

        let pdu = PduReading::from_raw(
            inputs.raw_power,
            inputs.raw_energy,
            self.pdu.power_multiplier,
            self.pdu.energy_divisor,
            pdu_timestamp,
        );

        Ok(ClusterSnapshot::new(Utc::now(), merged.nodes, pdu, merged.unknown))
    }

    async fn gather_sequential(&self) -> Result<CycleInputs, CycleError> {
        Ok(CycleInputs {
            inventory: self.run_query(QueryName::Inventory).await?,
            cpu_utilization: self.run_query(QueryName::CpuUtilization).await?,
            cpu_reserved: self.run_query(QueryName::CpuReserved).await?,
            mem_utilization: self.run_query(QueryName::MemUtilization).await?,
            mem_reserved: self.run_query(QueryName::MemReserved).await?,
            raw_power: self.read_pdu(PduMetric::Power).await?,
            raw_energy: self.read_pdu(PduMetric::Energy).await?,
        })
    }

    async fn gather_concurrent(&self) -> Result<CycleInputs, CycleError> {
        let (inventory, cpu_utilization, cpu_reserved, mem_utilization, mem_reserved, raw_power, raw_energy) =
            futures::try_join!(
                self.run_query(QueryName::Inventory),
                self.run_query(QueryName::CpuUtilization),
                self.run_query(QueryName::CpuReserved),
                self.run_query(QueryName::MemUtilization),
                self.run_query(QueryName::MemReserved),
                self.read_pdu(PduMetric::Power),
                self.read_pdu(PduMetric::Energy),
            )?;

        Ok(CycleInputs {
            inventory,
            cpu_utilization,
            cpu_reserved,
            mem_utilization,
            mem_reserved,
            raw_power,
            raw_energy,
        })
    }

    fn expression(&self, name: QueryName) -> &str {
        match name {
            QueryName::Inventory => &self.queries.inventory,
            QueryName::CpuUtilization => &self.queries.cpu_utilization,
            QueryName::CpuReserved => &self.queries.cpu_reserved,
            QueryName::MemUtilization => &self.queries.mem_utilization,
            QueryName::MemReserved => &self.queries.mem_reserved,
        }
    }

    async fn run_query(&self, name: QueryName) -> Result<LabelValues, CycleError> {
        let values = self
            .metrics
            .query(self.expression(name))
            .await
            .map_err(|source| CycleError::Query { query: name, source })?;
        debug!("Query `{}` returned {} series", name, values.len());
        Ok(values)
    }

    async fn read_pdu(&self, metric: PduMetric) -> Result<i64, CycleError> {
        let oid = match metric {
            PduMetric::Power => &self.pdu.power_oid,
            PduMetric::Energy => &self.pdu.energy_oid,
        };
        let raw = self
            .snmp
            .read(&self.pdu.address, &self.pdu.community, oid)
            .await
            .map_err(|source| CycleError::Snmp { metric, source })?;
        debug!("PDU {} raw reading {}", metric, raw);
        Ok(raw)
    }
}
