//! Snapshot data model
//!
//! Everything here is built fresh each cycle and dropped once reported.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-node figures for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NodeStats {
    pub cpu_utilization_pct: f64,
    pub cpu_reserved_cores: f64,
    pub mem_utilization_pct: f64,
    pub mem_reserved_gib: f64,
    pub active: bool,
}

/// Node name -> stats, ordered by name.
pub type NodeSnapshot = BTreeMap<String, NodeStats>;

/// Scaled PDU reading plus the raw integers it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PduReading {
    pub power_watts: f64,
    pub energy_wh: f64,
    pub raw_power: i64,
    pub raw_energy: i64,
    pub timestamp: DateTime<Utc>,
}

impl PduReading {
    pub fn from_raw(
        raw_power: i64,
        raw_energy: i64,
        power_multiplier: f64,
        energy_divisor: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            power_watts: raw_power as f64 * power_multiplier,
            energy_wh: raw_energy as f64 / energy_divisor,
            raw_power,
            raw_energy,
            timestamp,
        }
    }
}

/// One complete aggregation cycle. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSnapshot {
    timestamp: DateTime<Utc>,
    nodes: NodeSnapshot,
    pdu: PduReading,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unknown_nodes: Vec<String>,
}

impl ClusterSnapshot {
    pub fn new(
        timestamp: DateTime<Utc>,
        nodes: NodeSnapshot,
        pdu: PduReading,
        unknown_nodes: Vec<String>,
    ) -> Self {
        Self { timestamp, nodes, pdu, unknown_nodes }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn nodes(&self) -> &NodeSnapshot {
        &self.nodes
    }

    pub fn pdu(&self) -> &PduReading {
        &self.pdu
    }

    /// Labels returned by a utilization or reservation query that the
    /// inventory does not know about.
    pub fn unknown_nodes(&self) -> &[String] {
        &self.unknown_nodes
    }

    pub fn active_count(&self) -> usize {
        self.nodes.values().filter(|n| n.active).count()
    }
}

/// Round to 2 decimals, halves away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Ratio (0..1) to a percentage rounded to 2 decimals.
pub fn ratio_to_pct(ratio: f64) -> f64 {
    round2(ratio * 100.0)
}

/// Bytes to GiB as reported by the cluster (decimal, 1e9).
pub fn bytes_to_gib(bytes: f64) -> f64 {
    bytes / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(ratio_to_pct(0.123456), 12.35);
        assert_eq!(ratio_to_pct(0.5), 50.0);
        assert_eq!(ratio_to_pct(0.0), 0.0);
        assert_eq!(round2(1.005_1), 1.01);
        assert_eq!(round2(2.344), 2.34);
    }

    #[test]
    fn test_pdu_unit_conversion() {
        let reading = PduReading::from_raw(153, 2000, 10.0, 10.0, Utc::now());
        assert_eq!(reading.power_watts, 1530.0);
        assert_eq!(reading.energy_wh, 200.0);
        assert_eq!(reading.raw_power, 153);
        assert_eq!(reading.raw_energy, 2000);
    }

    #[test]
    fn test_bytes_to_gib() {
        assert_eq!(bytes_to_gib(3_200_000_000.0), 3.2);
        assert_eq!(bytes_to_gib(0.0), 0.0);
    }

    #[test]
    fn test_snapshot_serialization_omits_empty_unknowns() {
        let mut nodes = NodeSnapshot::new();
        nodes.insert("n1".into(), NodeStats { active: true, cpu_utilization_pct: 12.35, ..NodeStats::default() });
        let pdu = PduReading::from_raw(1, 1, 10.0, 10.0, Utc::now());
        let snapshot = ClusterSnapshot::new(Utc::now(), nodes, pdu, Vec::new());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["nodes"]["n1"]["cpu_utilization_pct"], 12.35);
        assert_eq!(json["nodes"]["n1"]["active"], true);
        assert!(json.get("unknown_nodes").is_none());
        assert_eq!(snapshot.active_count(), 1);
    }
}
