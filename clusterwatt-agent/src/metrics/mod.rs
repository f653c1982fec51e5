//! Metrics backend query client
//!
//! Issues `GET <url>?query=<expr>` against a Prometheus-compatible HTTP API
//! and reshapes the result vector into `label value -> f64`:
//! - rows without the configured label are skipped
//! - range results (`values`) contribute their last sample
//! - non-finite samples (`NaN`, `+Inf`) are skipped

use crate::config::MetricsConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Query result keyed by label value (node name).
pub type LabelValues = HashMap<String, f64>;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("metrics backend unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("metrics backend answered HTTP {status}")]
    Http { status: u16 },
    #[error("metrics backend rejected the query ({error_type}): {message}")]
    Backend { error_type: String, message: String },
    #[error("malformed metrics response: {0}")]
    MalformedResponse(String),
}

/// Label-keyed instant query, the seam the aggregator reads the cluster through.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn query(&self, expression: &str) -> Result<LabelValues, QueryError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: Option<String>,
    data: Option<ResultData>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultData {
    result: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(default)]
    metric: HashMap<String, String>,
    value: Option<Sample>,
    values: Option<Vec<Sample>>,
}

/// `[unix_ts, "value"]`
#[derive(Debug, Deserialize)]
struct Sample(#[allow(dead_code)] f64, String);

#[derive(Debug, Clone)]
pub struct QueryClient {
    http: reqwest::Client,
    url: String,
    label: String,
}

impl QueryClient {
    pub fn new(config: &MetricsConfig) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("clusterwatt/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(QueryError::Transport)?;

        Ok(Self {
            http,
            url: config.url.clone(),
            label: config.label.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MetricsSource for QueryClient {
    async fn query(&self, expression: &str) -> Result<LabelValues, QueryError> {
        debug!("Querying {} for `{}`", self.url, expression);

        let response = self
            .http
            .get(&self.url)
            .query(&[("query", expression)])
            .send()
            .await
            .map_err(QueryError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(QueryError::Transport)?;

        match parse_response(&body, &self.label) {
            Err(QueryError::MalformedResponse(_)) if !status.is_success() => {
                Err(QueryError::Http { status: status.as_u16() })
            }
            other => other,
        }
    }
}

/// Reshape a query response body into label values.
pub fn parse_response(body: &str, label: &str) -> Result<LabelValues, QueryError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| QueryError::MalformedResponse(format!("invalid JSON envelope: {e}")))?;

    if envelope.status.as_deref() == Some("error") {
        return Err(QueryError::Backend {
            error_type: envelope.error_type.unwrap_or_else(|| "unknown".into()),
            message: envelope.error.unwrap_or_default(),
        });
    }

    let data = envelope
        .data
        .ok_or_else(|| QueryError::MalformedResponse("missing `data` object".into()))?;

    let mut values = LabelValues::with_capacity(data.result.len());
    for row in data.result {
        let Some(name) = row.metric.get(label) else {
            debug!("Skipping result row without `{}` label: {:?}", label, row.metric);
            continue;
        };

        let sample = match (row.value, row.values) {
            (Some(sample), _) => sample,
            (None, Some(mut series)) => match series.pop() {
                Some(sample) => sample,
                None => continue,
            },
            (None, None) => {
                return Err(QueryError::MalformedResponse(format!("row for `{name}` carries no value")))
            }
        };

        let parsed: f64 = sample.1.trim().parse().map_err(|_| {
            QueryError::MalformedResponse(format!("value {:?} for `{}` is not a number", sample.1, name))
        })?;
        if !parsed.is_finite() {
            debug!("Skipping non-finite sample {} for `{}`", sample.1, name);
            continue;
        }

        if values.insert(name.clone(), parsed).is_some() {
            warn!("Duplicate `{}` label value `{}` in query result, keeping the later row", label, name);
        }
    }

    Ok(values)
}
