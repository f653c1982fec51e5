//! Configuration management
//!
//! Handles:
//! - metrics backend endpoint and query expressions
//! - PDU SNMP target, community and object identifiers
//! - polling cadence
//! - report sinks (console, JSON-lines file, MQTT)
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, then environment variables (`.env` is loaded by `main`).

use crate::snmp::{Oid, Version};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub metrics: MetricsConfig,
    pub snmp: SnmpConfig,
    pub schedule: ScheduleConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Full query endpoint, e.g. `http://prometheus:9090/api/v1/query`.
    pub url: String,
    /// Label carrying the node name in query results.
    pub label: String,
    pub timeout_secs: u64,
    pub queries: QueryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub inventory: String,
    pub cpu_utilization: String,
    pub cpu_reserved: String,
    pub mem_utilization: String,
    pub mem_reserved: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnmpConfig {
    pub target: String,
    pub port: u16,
    pub community: String,
    pub version: Version,
    pub power_oid: String,
    pub energy_oid: String,
    pub timeout_ms: u64,
    pub retries: u32,
    /// Raw power reading × this factor = watts.
    pub power_multiplier: f64,
    /// Raw energy reading ÷ this factor = reported energy.
    pub energy_divisor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// humantime duration, e.g. `1s`, `30s`, `1m`.
    pub interval: String,
    pub concurrent_queries: bool,
    pub max_cycles: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub console: bool,
    pub integrate_energy: bool,
    pub jsonl_path: Option<PathBuf>,
    pub mqtt: Option<MqttSinkConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSinkConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
}

/// Validated PDU addressing, ready for the aggregator.
#[derive(Debug, Clone)]
pub struct PduTarget {
    pub address: String,
    pub community: String,
    pub power_oid: Oid,
    pub energy_oid: Oid,
    pub power_multiplier: f64,
    pub energy_divisor: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            label: "node".to_string(),
            timeout_secs: 10,
            queries: QueryConfig::default(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            inventory: "kube_node_info".to_string(),
            cpu_utilization: r#"1 - avg by (node) (rate(node_cpu_seconds_total{mode="idle"}[5m]))"#
                .to_string(),
            cpu_reserved: r#"sum by (node) (kube_pod_container_resource_requests{resource="cpu"})"#
                .to_string(),
            mem_utilization: "1 - sum by (node) (node_memory_MemAvailable_bytes) / sum by (node) (node_memory_MemTotal_bytes)"
                .to_string(),
            mem_reserved: r#"sum by (node) (kube_pod_container_resource_requests{resource="memory"})"#
                .to_string(),
        }
    }
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            port: 161,
            community: String::new(),
            version: Version::V1,
            power_oid: String::new(),
            energy_oid: String::new(),
            timeout_ms: 1000,
            retries: 5,
            power_multiplier: 10.0,
            energy_divisor: 10.0,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: "60s".to_string(),
            concurrent_queries: false,
            max_cycles: None,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            console: true,
            integrate_energy: true,
            jsonl_path: None,
            mqtt: None,
        }
    }
}

impl Default for MqttSinkConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            topic: "clusterwatt/snapshot@v1".to_string(),
        }
    }
}

impl MetricsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SnmpConfig {
    pub fn pdu_target(&self) -> Result<PduTarget, ConfigError> {
        if self.target.trim().is_empty() {
            return Err(ConfigError::Missing("SNMP_TARGET"));
        }
        if self.community.is_empty() {
            return Err(ConfigError::Missing("SNMP_COMMUNITY"));
        }
        if !(self.power_multiplier.is_finite() && self.energy_divisor.is_finite() && self.energy_divisor != 0.0) {
            return Err(ConfigError::Invalid {
                key: "snmp.power_multiplier/energy_divisor",
                reason: "scale factors must be finite and the divisor non-zero".into(),
            });
        }

        Ok(PduTarget {
            address: self.target.trim().to_string(),
            community: self.community.clone(),
            power_oid: parse_oid("SNMP_POWER_OID", &self.power_oid)?,
            energy_oid: parse_oid("SNMP_ENERGY_OID", &self.energy_oid)?,
            power_multiplier: self.power_multiplier,
            energy_divisor: self.energy_divisor,
        })
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        let interval = humantime::parse_duration(self.interval.trim()).map_err(|e| ConfigError::Invalid {
            key: "POLL_INTERVAL",
            reason: e.to_string(),
        })?;
        if interval.is_zero() {
            return Err(ConfigError::Invalid { key: "POLL_INTERVAL", reason: "must be non-zero".into() });
        }
        Ok(interval)
    }
}

fn parse_oid(key: &'static str, raw: &str) -> Result<Oid, ConfigError> {
    if raw.trim().is_empty() {
        return Err(ConfigError::Missing(key));
    }
    raw.parse().map_err(|e: crate::snmp::codec::CodecError| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn parse_env<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid { key, reason: e.to_string() })
}

impl TelemetryConfig {
    /// Load config: file (if any), environment overrides, then validation.
    pub async fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os("CLUSTERWATT_CONFIG") {
            Some(explicit) => Self::from_file(Path::new(&explicit)).await?,
            None => match Self::config_file_path() {
                Some(path) if path.exists() => Self::from_file(&path).await?,
                _ => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// OS-specific default location: `<config_dir>/clusterwatt/config.toml`.
    pub fn config_file_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("clusterwatt");
        path.push("config.toml");
        Some(path)
    }

    /// Overlay environment variables. Legacy names from the original
    /// scripts are honoured when the new name is unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()));

        if let Some(url) = first(&["METRICS_URL", "PROMETHEUS_URL"]) {
            self.metrics.url = url;
        }
        if let Some(label) = first(&["METRICS_NODE_LABEL"]) {
            self.metrics.label = label;
        }
        if let Some(community) = first(&["SNMP_COMMUNITY", "COMMUNITY"]) {
            self.snmp.community = community;
        }
        if let Some(target) = first(&["SNMP_TARGET", "PDU_IP"]) {
            self.snmp.target = target;
        }
        if let Some(oid) = first(&["SNMP_POWER_OID", "POWER_OID"]) {
            self.snmp.power_oid = oid;
        }
        if let Some(oid) = first(&["SNMP_ENERGY_OID", "ENERGY_OID"]) {
            self.snmp.energy_oid = oid;
        }
        if let Some(port) = first(&["SNMP_PORT"]) {
            self.snmp.port = parse_env("SNMP_PORT", &port)?;
        }
        if let Some(version) = first(&["SNMP_VERSION"]) {
            self.snmp.version = parse_env("SNMP_VERSION", &version)?;
        }
        if let Some(interval) = first(&["POLL_INTERVAL"]) {
            self.schedule.interval = interval;
        }
        if let Some(max) = first(&["MAX_CYCLES"]) {
            self.schedule.max_cycles = Some(parse_env("MAX_CYCLES", &max)?);
        }
        if let Some(path) = first(&["REPORT_JSONL"]) {
            self.report.jsonl_path = Some(PathBuf::from(path));
        }
        if let Some(host) = first(&["MQTT_HOST"]) {
            self.report.mqtt.get_or_insert_with(MqttSinkConfig::default).host = host;
        }
        if let Some(mqtt) = self.report.mqtt.as_mut() {
            if let Some(port) = first(&["MQTT_PORT"]) {
                mqtt.port = parse_env("MQTT_PORT", &port)?;
            }
            if let Some(topic) = first(&["MQTT_TOPIC"]) {
                mqtt.topic = topic;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metrics.url.trim().is_empty() {
            return Err(ConfigError::Missing("METRICS_URL"));
        }
        if self.metrics.label.trim().is_empty() {
            return Err(ConfigError::Invalid { key: "metrics.label", reason: "must not be empty".into() });
        }
        self.snmp.pdu_target()?;
        self.schedule.interval()?;
        Ok(())
    }
}
