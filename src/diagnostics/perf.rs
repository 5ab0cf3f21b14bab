//! Per-stage performance aggregation across frames.
//!
//! The detector registers one entry per stage at construction and feeds a
//! duration sample per frame. Entries aggregate count, total, min and max
//! plus the sum of squares needed for the standard deviation; summaries are
//! reported in microseconds.

use serde::Serialize;
use std::time::Duration;

/// Handle to a registered timer entry.
#[derive(Clone, Copy, Debug)]
pub struct PerfToken(usize);

/// Aggregated samples of one timer.
#[derive(Clone, Debug)]
pub struct PerfEntry {
    label: String,
    n: u32,
    total: Duration,
    total_sq_us: f64,
    min: Duration,
    max: Duration,
}

impl PerfEntry {
    fn new(label: String) -> Self {
        Self {
            label,
            n: 0,
            total: Duration::ZERO,
            total_sq_us: 0.0,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }

    fn add(&mut self, sample: Duration) {
        self.n += 1;
        self.total += sample;
        let us = sample.as_secs_f64() * 1e6;
        self.total_sq_us += us * us;
        self.min = self.min.min(sample);
        self.max = self.max.max(sample);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn measurements(&self) -> u32 {
        self.n
    }

    pub fn total_us(&self) -> f64 {
        self.total.as_secs_f64() * 1e6
    }

    pub fn mean_us(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.total_us() / self.n as f64
        }
    }

    pub fn stddev_us(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let mean = self.mean_us();
        (self.total_sq_us / self.n as f64 - mean * mean).max(0.0).sqrt()
    }

    pub fn min_us(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.min.as_secs_f64() * 1e6
        }
    }

    pub fn max_us(&self) -> f64 {
        self.max.as_secs_f64() * 1e6
    }

    pub fn summary(&self) -> PerfSummary {
        PerfSummary {
            label: self.label.clone(),
            measurements: self.n,
            total_us: self.total_us(),
            mean_us: self.mean_us(),
            stddev_us: self.stddev_us(),
            min_us: self.min_us(),
            max_us: self.max_us(),
        }
    }
}

/// Serialisable snapshot of one entry.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfSummary {
    pub label: String,
    pub measurements: u32,
    pub total_us: f64,
    pub mean_us: f64,
    pub stddev_us: f64,
    pub min_us: f64,
    pub max_us: f64,
}

/// Registry of stage timers.
#[derive(Clone, Debug, Default)]
pub struct PerfRegistry {
    entries: Vec<PerfEntry>,
}

impl PerfRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a timer; the returned token addresses it in `add`.
    pub fn create_entry(&mut self, label: impl Into<String>) -> PerfToken {
        self.entries.push(PerfEntry::new(label.into()));
        PerfToken(self.entries.len() - 1)
    }

    /// Record one duration sample.
    pub fn add(&mut self, token: PerfToken, sample: Duration) {
        self.entries[token.0].add(sample);
    }

    pub fn entries(&self) -> &[PerfEntry] {
        &self.entries
    }

    /// Snapshot of every entry, in registration order.
    pub fn report(&self) -> Vec<PerfSummary> {
        self.entries.iter().map(PerfEntry::summary).collect()
    }
}
