//! Process-wide generation totals.
//!
//! One instance is created with the engine and shared by every job. Each
//! counter is an independent atomic; totals only ever grow.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct StatisticsAggregator {
    total_logs: AtomicU64,
    total_metrics: AtomicU64,
    total_events: AtomicU64,
    total_bytes: AtomicU64,
    start_time: DateTime<Utc>,
    started: Instant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub total_logs_generated: u64,
    pub total_metrics_generated: u64,
    pub total_events_generated: u64,
    pub total_bytes_generated: u64,
    pub start_time: DateTime<Utc>,
    pub uptime_ms: u64,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self {
            total_logs: AtomicU64::new(0),
            total_metrics: AtomicU64::new(0),
            total_events: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            start_time: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Counts one log record of `bytes` payload bytes.
    pub fn add_log(&self, bytes: usize) {
        self.total_logs.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn add_metric(&self) {
        self.total_metrics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_event(&self) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            total_logs_generated: self.total_logs.load(Ordering::Relaxed),
            total_metrics_generated: self.total_metrics.load(Ordering::Relaxed),
            total_events_generated: self.total_events.load(Ordering::Relaxed),
            total_bytes_generated: self.total_bytes.load(Ordering::Relaxed),
            start_time: self.start_time,
            uptime_ms: self.uptime_ms(),
        }
    }
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self::new()
    }
}
