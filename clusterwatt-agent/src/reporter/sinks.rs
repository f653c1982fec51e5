use super::{Report, ReportSink};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// Key-aligned text, stdout by default.
pub struct ConsoleSink<W = std::io::Stdout> {
    out: W,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self { out: std::io::stdout() }
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[async_trait]
impl<W: Write + Send> ReportSink for ConsoleSink<W> {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn emit(&mut self, report: &Report<'_>) -> Result<()> {
        write!(self.out, "{report}").context("Failed to write report")?;
        self.out.flush().context("Failed to flush report")?;
        Ok(())
    }
}

/// Appends one JSON document per snapshot.
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ReportSink for JsonLinesSink {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    async fn emit(&mut self, report: &Report<'_>) -> Result<()> {
        let mut line = serde_json::to_vec(report).context("Failed to serialize snapshot")?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
