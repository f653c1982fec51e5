//! Power-to-energy integration across cycles
//!
//! Accumulates watt-hours from successive power readings: the power of the
//! previous reading is held over the time elapsed until the next one.

use crate::snapshot::PduReading;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct EnergyIntegrator {
    total_wh: f64,
    last: Option<(DateTime<Utc>, f64)>,
}

impl EnergyIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a reading and return the running total in Wh.
    pub fn record(&mut self, reading: &PduReading) -> f64 {
        if let Some((at, watts)) = self.last {
            let elapsed_ms = (reading.timestamp - at).num_milliseconds().max(0);
            self.total_wh += watts * elapsed_ms as f64 / 3_600_000.0;
        }
        self.last = Some((reading.timestamp, reading.power_watts));
        self.total_wh
    }

    pub fn total_wh(&self) -> f64 {
        self.total_wh
    }
}
