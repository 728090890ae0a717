//! Prometheus counters for the generator process, plus a procfs memory
//! reading for the periodic memory metric.

use crate::sink::Properties;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder};

pub static RECORDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("telegen_records_total", "Telemetry records handed to the sink"),
        &["kind"],
    )
    .expect("valid metric definition");
    prometheus::register(Box::new(c.clone())).expect("metric registered once");
    c
});

pub static SINK_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("telegen_sink_errors_total", "Sink calls that returned an error")
        .expect("valid metric definition");
    prometheus::register(Box::new(c.clone())).expect("metric registered once");
    c
});

pub static FLUSH_REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("telegen_flush_requests_total", "Flush requests sent to the sink")
        .expect("valid metric definition");
    prometheus::register(Box::new(c.clone())).expect("metric registered once");
    c
});

pub static JOBS_STARTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("telegen_jobs_started_total", "Generation jobs started"),
        &["kind"],
    )
    .expect("valid metric definition");
    prometheus::register(Box::new(c.clone())).expect("metric registered once");
    c
});

pub static ACTIVE_JOBS: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("telegen_active_jobs", "Running or stopping jobs")
        .expect("valid metric definition");
    prometheus::register(Box::new(g.clone())).expect("metric registered once");
    g
});

/// Renders every registered metric in the Prometheus text format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Resident and mapped memory of this process, in megabytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryUsage {
    pub rss_mb: f64,
    pub data_mb: f64,
    pub virtual_mb: f64,
}

impl MemoryUsage {
    /// Properties attached to the `MemoryUsageMB` metric.
    pub fn properties(&self) -> Properties {
        let mut properties = Properties::new();
        properties.insert("rss".to_string(), format!("{:.2}", self.rss_mb));
        properties.insert("heapTotal".to_string(), format!("{:.2}", self.data_mb));
        properties.insert("virtual".to_string(), format!("{:.2}", self.virtual_mb));
        properties
    }
}

/// Reads `/proc/self/status`. `None` where procfs is unavailable.
pub fn memory_usage() -> Option<MemoryUsage> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_proc_status(&status)
}

fn parse_proc_status(status: &str) -> Option<MemoryUsage> {
    let field_mb = |name: &str| -> Option<f64> {
        let line = status.lines().find(|l| l.starts_with(name))?;
        let kb: f64 = line[name.len()..]
            .trim()
            .trim_end_matches("kB")
            .trim()
            .parse()
            .ok()?;
        Some(kb / 1024.0)
    };
    Some(MemoryUsage {
        rss_mb: field_mb("VmRSS:")?,
        data_mb: field_mb("VmData:").unwrap_or_default(),
        virtual_mb: field_mb("VmSize:").unwrap_or_default(),
    })
}
