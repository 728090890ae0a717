//! Telemetry sink abstraction.
//!
//! The engine never talks to a backend directly; it is handed an
//! `Arc<dyn TelemetrySink>` at construction. All methods are synchronous and
//! must not block: implementations either record in memory, log, or enqueue
//! onto a bounded channel drained elsewhere.

pub mod http;
pub mod memory;
pub mod tracing_sink;

pub use http::HttpSink;
pub use memory::{MemorySink, Record};
pub use tracing_sink::TracingSink;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// String properties attached to a record.
pub type Properties = BTreeMap<String, String>;

/// Record severity, numbered like the common trace severity scale (0..=4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Verbose = 0,
    Information = 1,
    Warning = 2,
    Error = 3,
    Critical = 4,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink queue is full")]
    Backpressure,

    #[error("sink is closed")]
    Closed,

    #[error("request to ingestion endpoint failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ingestion endpoint rejected batch with status {status}")]
    Rejected { status: u16 },
}

pub type SinkResult = Result<(), SinkError>;

/// Destination for generated telemetry.
pub trait TelemetrySink: Send + Sync {
    fn emit_trace(&self, message: &str, severity: Severity, properties: &Properties) -> SinkResult;

    fn emit_exception(
        &self,
        message: &str,
        severity: Severity,
        properties: &Properties,
    ) -> SinkResult;

    fn emit_metric(&self, name: &str, value: f64, properties: &Properties) -> SinkResult;

    fn emit_event(&self, name: &str, properties: &Properties) -> SinkResult;

    /// Ask for buffered records to be forwarded promptly. Safe to call
    /// concurrently; implementations coalesce.
    fn flush(&self) -> SinkResult;
}
