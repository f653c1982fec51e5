//! Fixed-interval driver for the aggregator
//!
//! The first cycle fires immediately, later ones on the interval. A cycle
//! that overruns makes the next one late (no catch-up burst). Stops on the
//! shutdown signal or after `max_cycles`.

use crate::aggregator::Aggregator;
use crate::metrics::MetricsSource;
use crate::reporter::Reporter;
use crate::snmp::SnmpRead;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub cycles: u64,
    pub emitted: u64,
    pub failed: u64,
}

pub struct Scheduler<M, S> {
    aggregator: Aggregator<M, S>,
    reporter: Reporter,
    interval: Duration,
    max_cycles: Option<u64>,
}

impl<M: MetricsSource, S: SnmpRead> Scheduler<M, S> {
    pub fn new(aggregator: Aggregator<M, S>, reporter: Reporter, interval: Duration) -> Self {
        Self { aggregator, reporter, interval, max_cycles: None }
    }

    pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Run until `shutdown` flips to `true` or the cycle budget is spent.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> RunStats {
        info!("Polling every {:?} (PDU {})", self.interval, self.aggregator.pdu_address());

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = RunStats::default();
        let mut detached = false;

        loop {
            if *shutdown.borrow() {
                info!("Shutdown requested, stopping scheduler");
                break;
            }
            if self.max_cycles.is_some_and(|max| stats.cycles >= max) {
                info!("Reached {} cycle(s), stopping scheduler", stats.cycles);
                break;
            }

            tokio::select! {
                _ = ticker.tick() => self.run_cycle(&mut stats).await,
                changed = shutdown.changed(), if !detached => {
                    if changed.is_err() {
                        warn!("Shutdown handle dropped, running until the cycle budget is spent");
                        detached = true;
                    }
                }
            }
        }

        stats
    }

    async fn run_cycle(&mut self, stats: &mut RunStats) {
        stats.cycles += 1;
        let started = Instant::now();

        match self.aggregator.collect().await {
            Ok(snapshot) => {
                stats.emitted += 1;
                info!(
                    "Cycle {} complete in {:?}: {} node(s), {} active, {:.1} W",
                    stats.cycles,
                    started.elapsed(),
                    snapshot.nodes().len(),
                    snapshot.active_count(),
                    snapshot.pdu().power_watts
                );
                self.reporter.report(&snapshot).await;
            }
            Err(e) => {
                stats.failed += 1;
                error!("Cycle {} aborted ({} error): {}", stats.cycles, e.class(), e);
            }
        }
    }
}
