//! ClusterWatt - cluster utilization + PDU power telemetry
//!
//! Every cycle the agent:
//! - queries the metrics backend for node inventory, CPU/memory utilization
//!   and CPU/memory reservations
//! - reads power and energy from the PDU over SNMP
//! - merges everything into one immutable `ClusterSnapshot`
//! - hands the snapshot to the configured sinks

pub mod aggregator;
pub mod config;
pub mod energy;
pub mod error;
pub mod metrics;
pub mod reporter;
pub mod scheduler;
pub mod snapshot;
pub mod snmp;

pub use aggregator::Aggregator;
pub use config::TelemetryConfig;
pub use error::{CycleError, ErrorClass};
pub use scheduler::{RunStats, Scheduler};
pub use snapshot::ClusterSnapshot;
