/*!
Canned metrics backend payloads

Builds instant-query envelopes the same shape a Prometheus-compatible
backend returns, so tests can describe a cluster in a few lines.
*/

use serde_json::{json, Value};

/// APC rPDU2 phase load (tenths of amps on real units, any integer here).
pub const POWER_OID: &str = "1.3.6.1.4.1.318.1.1.12.1.16.0";
/// APC rPDU2 cumulative energy counter.
pub const ENERGY_OID: &str = "1.3.6.1.4.1.318.1.1.26.4.3.1.9.1";

/// Builder for a `resultType: vector` success envelope.
#[derive(Debug, Clone)]
pub struct VectorBuilder {
    label: String,
    rows: Vec<Value>,
}

impl VectorBuilder {
    pub fn new<S: Into<String>>(label: S) -> Self {
        Self { label: label.into(), rows: Vec::new() }
    }

    /// One row labelled `label=node` carrying `value`.
    pub fn sample(mut self, node: &str, value: f64) -> Self {
        let mut metric = serde_json::Map::new();
        metric.insert(self.label.clone(), Value::String(node.to_string()));
        self.rows.push(json!({
            "metric": metric,
            "value": [timestamp(), format_sample(value)],
        }));
        self
    }

    /// One row without the node label.
    pub fn unlabeled(mut self, value: f64) -> Self {
        self.rows.push(json!({
            "metric": { "__name__": "up" },
            "value": [timestamp(), format_sample(value)],
        }));
        self
    }

    pub fn build(self) -> Value {
        json!({
            "status": "success",
            "data": { "resultType": "vector", "result": self.rows },
        })
    }
}

/// Success envelope with no series.
pub fn empty_vector() -> Value {
    json!({
        "status": "success",
        "data": { "resultType": "vector", "result": [] },
    })
}

/// Error envelope as returned for a rejected expression.
pub fn error_envelope(error_type: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "errorType": error_type,
        "error": message,
    })
}

fn timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

// Prometheus spells infinities `+Inf` / `-Inf`
fn format_sample(value: f64) -> String {
    if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_shape() {
        let body = VectorBuilder::new("node").sample("worker-01", 0.5).unlabeled(1.0).build();
        let rows = body["data"]["result"].as_array().unwrap();

        assert_eq!(body["status"], "success");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["metric"]["node"], "worker-01");
        assert_eq!(rows[0]["value"][1], "0.5");
        assert!(rows[1]["metric"].get("node").is_none());
    }

    #[test]
    fn test_error_envelope_shape() {
        let body = error_envelope("bad_data", "parse error");
        assert_eq!(body["status"], "error");
        assert_eq!(body["errorType"], "bad_data");
    }
}
