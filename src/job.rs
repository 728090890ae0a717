//! Job records and the validated parameters of each job kind.

use crate::error::{EngineError, Result};
use crate::sink::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const MAX_PACED_COUNT: u64 = 1_000_000;
pub const MAX_PACED_INTERVAL_MS: u64 = 60_000;
pub const MIN_BURST_DURATION_MS: u64 = 1_000;
pub const MAX_BURST_DURATION_MS: u64 = 300_000;
pub const MAX_BURST_WORKERS: usize = 50;
pub const MAX_LOGS_PER_SECOND: u32 = 10_000;
pub const DEFAULT_MESSAGE_SIZE_BYTES: usize = 1024;

/// Opaque job identifier. Random v4 uuids, never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Paced,
    Burst,
    Continuous,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Paced => "paced",
            JobKind::Burst => "burst",
            JobKind::Continuous => "continuous",
        }
    }
}

/// Job lifecycle state.
///
/// Paced: Running -> Completed | Cancelled.
/// Burst: Running -> Stopping -> Completed, or Running/Stopping -> Cancelled.
/// Continuous: Running -> Stopped | Cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Stopping,
    Cancelled,
    Completed,
    Stopped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Cancelled | JobStatus::Completed | JobStatus::Stopped
        )
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

/// Requested severity of generated log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Trace,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Critical => "critical",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Level::Trace => Severity::Verbose,
            Level::Info => Severity::Information,
            Level::Warning => Severity::Warning,
            Level::Error => Severity::Error,
            Level::Critical => Severity::Critical,
        }
    }

    /// Error and critical levels are emitted as exception records.
    pub fn is_exception(self) -> bool {
        matches!(self, Level::Error | Level::Critical)
    }
}

impl FromStr for Level {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Level::ALL.iter().map(|l| l.as_str()).collect();
                EngineError::validation("level", format!("must be one of: {}", names.join(", ")))
            })
    }
}

/// Fixed-count run with an optional delay between records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacedParams {
    pub count: u64,
    pub interval_ms: u64,
    pub level: Level,
    pub message_size_bytes: usize,
    pub include_metrics: bool,
    pub include_events: bool,
}

impl Default for PacedParams {
    fn default() -> Self {
        Self {
            count: 1000,
            interval_ms: 100,
            level: Level::Info,
            message_size_bytes: DEFAULT_MESSAGE_SIZE_BYTES,
            include_metrics: true,
            include_events: true,
        }
    }
}

impl PacedParams {
    pub fn validate(&self, max_message_size_bytes: usize) -> Result<()> {
        if !(1..=MAX_PACED_COUNT).contains(&self.count) {
            return Err(EngineError::validation(
                "count",
                format!("must be between 1 and {MAX_PACED_COUNT}"),
            ));
        }
        if self.interval_ms > MAX_PACED_INTERVAL_MS {
            return Err(EngineError::validation(
                "intervalMs",
                format!("must be between 0 and {MAX_PACED_INTERVAL_MS} ms"),
            ));
        }
        check_message_size(self.message_size_bytes, max_message_size_bytes)
    }
}

/// Wall-clock bounded multi-worker burst.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstParams {
    pub duration_ms: u64,
    pub worker_count: usize,
}

impl BurstParams {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_BURST_DURATION_MS..=MAX_BURST_DURATION_MS).contains(&self.duration_ms) {
            return Err(EngineError::validation(
                "durationMs",
                format!(
                    "must be between {MIN_BURST_DURATION_MS} and {MAX_BURST_DURATION_MS} ms"
                ),
            ));
        }
        if !(1..=MAX_BURST_WORKERS).contains(&self.worker_count) {
            return Err(EngineError::validation(
                "workerCount",
                format!("must be between 1 and {MAX_BURST_WORKERS}"),
            ));
        }
        Ok(())
    }
}

/// Per-record settings of the continuous stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContinuousConfig {
    pub level: Level,
    #[serde(alias = "messageSize")]
    pub message_size_bytes: usize,
    pub include_metrics: bool,
    pub include_events: bool,
}

impl Default for ContinuousConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            message_size_bytes: DEFAULT_MESSAGE_SIZE_BYTES,
            include_metrics: false,
            include_events: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuousParams {
    pub logs_per_second: u32,
    pub config: ContinuousConfig,
}

impl ContinuousParams {
    pub fn validate(&self, max_message_size_bytes: usize) -> Result<()> {
        if !(1..=MAX_LOGS_PER_SECOND).contains(&self.logs_per_second) {
            return Err(EngineError::validation(
                "logsPerSecond",
                format!("must be between 1 and {MAX_LOGS_PER_SECOND}"),
            ));
        }
        check_message_size(self.config.message_size_bytes, max_message_size_bytes)
    }
}

fn check_message_size(size: usize, max: usize) -> Result<()> {
    if size > max {
        return Err(EngineError::validation(
            "messageSizeBytes",
            format!("must not exceed {max} bytes"),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobParameters {
    Paced(PacedParams),
    Burst(BurstParams),
    Continuous(ContinuousParams),
}

impl JobParameters {
    pub fn kind(&self) -> JobKind {
        match self {
            JobParameters::Paced(_) => JobKind::Paced,
            JobParameters::Burst(_) => JobKind::Burst,
            JobParameters::Continuous(_) => JobKind::Continuous,
        }
    }
}

/// Snapshot of one job. The registry owns the live record; callers only
/// ever see clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub parameters: JobParameters,
    pub logs_generated: u64,
    pub metrics_generated: u64,
    pub events_generated: u64,
}

impl Job {
    pub(crate) fn new(parameters: JobParameters) -> Self {
        Self {
            id: JobId::new(),
            kind: parameters.kind(),
            status: JobStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: None,
            parameters,
            logs_generated: 0,
            metrics_generated: 0,
            events_generated: 0,
        }
    }

    /// Moves the job into a terminal status. Returns false if it already was terminal.
    pub(crate) fn finish(&mut self, status: JobStatus) -> bool {
        debug_assert!(status.is_terminal());
        if self.status.is_terminal() {
            return false;
        }
        let end = Utc::now();
        self.status = status;
        self.duration_ms = Some((end - self.start_time).num_milliseconds().max(0) as u64);
        self.end_time = Some(end);
        true
    }
}
