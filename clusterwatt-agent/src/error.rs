use crate::aggregator::{PduMetric, QueryName};
use crate::metrics::QueryError;
use crate::snmp::SnmpError;
use std::fmt;

/// Coarse failure class used when logging an aborted cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network unreachable, timeout.
    Transport,
    /// Error status or undecodable answer from the agent or backend.
    Protocol,
    /// Unexpected or missing JSON fields.
    DataShape,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorClass::Transport => "transport",
            ErrorClass::Protocol => "protocol",
            ErrorClass::DataShape => "data-shape",
        })
    }
}

/// Why a cycle produced no snapshot.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("query `{query}` failed: {source}")]
    Query { query: QueryName, source: QueryError },
    #[error("SNMP {metric} read failed: {source}")]
    Snmp { metric: PduMetric, source: SnmpError },
}

impl CycleError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CycleError::Query { source, .. } => match source {
                QueryError::Transport(_) => ErrorClass::Transport,
                QueryError::Http { .. } | QueryError::Backend { .. } => ErrorClass::Protocol,
                QueryError::MalformedResponse(_) => ErrorClass::DataShape,
            },
            CycleError::Snmp { source, .. } => match source {
                SnmpError::Indication { .. } => ErrorClass::Transport,
                SnmpError::Status { .. } | SnmpError::Malformed { .. } => ErrorClass::Protocol,
            },
        }
    }
}
