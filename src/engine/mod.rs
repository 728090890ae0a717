//! Generation Engine
//!
//! Starts, observes and cancels generation jobs on top of the job registry,
//! the statistics aggregator and an injected telemetry sink.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    GenerationEngine                      │
//! │  ┌────────────┐  ┌──────────────┐  ┌──────────────────┐  │
//! │  │   paced    │  │    burst     │  │   continuous     │  │
//! │  │ (1 task)   │  │ (N threads + │  │ (1 interval task │  │
//! │  │            │  │  deadline)   │  │  + cancel token) │  │
//! │  └─────┬──────┘  └──────┬───────┘  └────────┬─────────┘  │
//! │        └────────────────┼───────────────────┘            │
//! │                         ▼                                │
//! │   Emitter ──► TelemetrySink     JobRegistry   Statistics │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Cancellation is cooperative: every executor re-reads its job status from
//! the registry at the top of each iteration and exits once it is no longer
//! running. At most one in-flight emission completes after a stop request.
//!
//! Start operations spawn onto the current Tokio runtime and must be called
//! from within one.

mod burst;
mod continuous;
mod paced;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::job::{
    BurstParams, ContinuousConfig, ContinuousParams, Job, JobId, JobParameters, Level, PacedParams,
};
use crate::metrics::{FLUSH_REQUESTS_TOTAL, JOBS_STARTED_TOTAL, RECORDS_TOTAL, SINK_ERRORS_TOTAL};
use crate::registry::{JobRegistry, RegistryConfig};
use crate::sink::{Properties, SinkResult, TelemetrySink};
use crate::stats::{StatisticsAggregator, StatisticsSnapshot};
use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Chance per iteration that a paced job also emits a metric / an event.
pub const PACED_METRIC_PROBABILITY: f64 = 0.3;
pub const PACED_EVENT_PROBABILITY: f64 = 0.2;
/// Chance per iteration that a burst worker also emits a metric / an event.
pub const BURST_METRIC_PROBABILITY: f64 = 0.5;
pub const BURST_EVENT_PROBABILITY: f64 = 0.3;
/// Chance per tick that the continuous stream also emits a metric / an event.
pub const CONTINUOUS_METRIC_PROBABILITY: f64 = 0.1;
pub const CONTINUOUS_EVENT_PROBABILITY: f64 = 0.05;

/// Paced jobs flush when `iteration % 100 == 0`.
pub const PACED_FLUSH_EVERY: u64 = 100;
/// Burst workers pause and flush whenever the job's log count hits a multiple of this.
pub const BURST_FLUSH_EVERY: u64 = 1000;
/// The continuous stream flushes whenever its log count hits a multiple of this.
pub const CONTINUOUS_FLUSH_EVERY: u64 = 100;
/// Payload size of every burst record.
pub const BURST_MESSAGE_SIZE_BYTES: usize = 1024;

/// Everything a status query returns, captured at one point in time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub statistics: StatisticsSnapshot,
    pub active_jobs: Vec<Job>,
    pub continuous_job: Option<Job>,
    pub finished_jobs: usize,
    pub uptime_ms: u64,
}

/// Outcome of [`GenerationEngine::stop_all`].
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopAllReport {
    pub continuous_job: Option<Job>,
    pub cancelled: Vec<JobId>,
}

/// Shared emission path for all executors. Builds record properties, calls
/// the sink, updates process totals and swallows sink errors.
#[derive(Clone)]
pub(crate) struct Emitter {
    sink: Arc<dyn TelemetrySink>,
    stats: Arc<StatisticsAggregator>,
    generator_id: Arc<str>,
    session_id: Arc<str>,
}

impl Emitter {
    fn stamp(&self, properties: &mut Properties) {
        properties.insert("generatorId".to_string(), self.generator_id.to_string());
        properties.insert(
            "timestamp".to_string(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        );
    }

    /// Emits one log record at `level`. Error and critical levels become
    /// exception records.
    pub(crate) fn log(&self, level: Level, message: &str, mut properties: Properties) {
        self.stamp(&mut properties);
        properties.insert("sessionId".to_string(), self.session_id.to_string());
        properties.insert("messageSize".to_string(), message.len().to_string());

        let (kind, result) = if level.is_exception() {
            let text = match level {
                Level::Critical => format!("CRITICAL: {message}"),
                _ => message.to_string(),
            };
            (
                "exception",
                self.sink
                    .emit_exception(&text, level.severity(), &properties),
            )
        } else {
            (
                "trace",
                self.sink.emit_trace(message, level.severity(), &properties),
            )
        };
        Self::check(kind, result);
        self.stats.add_log(message.len());
    }

    /// Emits a metric with a uniform value in [0, 1000).
    pub(crate) fn metric(&self, name: &str, mut properties: Properties) {
        self.stamp(&mut properties);
        let value = rand::rng().random_range(0.0..1000.0);
        Self::check("metric", self.sink.emit_metric(name, value, &properties));
        self.stats.add_metric();
    }

    pub(crate) fn event(&self, name: &str, mut properties: Properties) {
        self.stamp(&mut properties);
        properties.insert(
            "randomValue".to_string(),
            rand::rng().random::<f64>().to_string(),
        );
        Self::check("event", self.sink.emit_event(name, &properties));
        self.stats.add_event();
    }

    pub(crate) fn flush(&self) {
        FLUSH_REQUESTS_TOTAL.inc();
        if let Err(e) = self.sink.flush() {
            SINK_ERRORS_TOTAL.inc();
            warn!(error = %e, "Sink flush failed");
        }
    }

    /// Bernoulli draw used for the optional metric/event of each iteration.
    pub(crate) fn chance(p: f64) -> bool {
        rand::rng().random_bool(p)
    }

    fn check(kind: &'static str, result: SinkResult) {
        RECORDS_TOTAL.with_label_values(&[kind]).inc();
        if let Err(e) = result {
            SINK_ERRORS_TOTAL.inc();
            debug!(kind, error = %e, "Sink rejected record");
        }
    }
}

/// Job lifecycle manager. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct GenerationEngine {
    registry: Arc<JobRegistry>,
    stats: Arc<StatisticsAggregator>,
    emitter: Emitter,
    config: Arc<EngineConfig>,
}

impl GenerationEngine {
    pub fn new(
        sink: Arc<dyn TelemetrySink>,
        stats: Arc<StatisticsAggregator>,
        config: EngineConfig,
    ) -> Self {
        let registry = JobRegistry::with_config(RegistryConfig {
            max_finished_jobs: config.max_finished_jobs,
        });
        let emitter = Emitter {
            sink,
            stats: stats.clone(),
            generator_id: Arc::from(config.generator_id.as_str()),
            session_id: Arc::from(Uuid::new_v4().to_string().as_str()),
        };

        Self {
            registry: Arc::new(registry),
            stats,
            emitter,
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn statistics(&self) -> &StatisticsAggregator {
        &self.stats
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Starts a fixed-count run. Returns the job as created; progress is
    /// visible through [`status`](Self::status) and [`job`](Self::job).
    pub fn start_paced(&self, params: PacedParams) -> Result<Job> {
        params.validate(self.config.max_message_size_bytes)?;

        let job = self.registry.create(JobParameters::Paced(params.clone()));
        JOBS_STARTED_TOTAL
            .with_label_values(&[job.kind.as_str()])
            .inc();
        info!(
            job_id = %job.id,
            count = params.count,
            interval_ms = params.interval_ms,
            level = params.level.as_str(),
            "Paced job started"
        );

        tokio::spawn(paced::run(
            job.id,
            params,
            self.registry.clone(),
            self.emitter.clone(),
        ));
        Ok(job)
    }

    /// Starts `worker_count` workers that emit as fast as they can until
    /// `duration_ms` has elapsed.
    pub fn start_burst(&self, params: BurstParams) -> Result<Job> {
        params.validate()?;

        let job = self.registry.create(JobParameters::Burst(params.clone()));
        JOBS_STARTED_TOTAL
            .with_label_values(&[job.kind.as_str()])
            .inc();
        info!(
            job_id = %job.id,
            duration_ms = params.duration_ms,
            workers = params.worker_count,
            "Burst job started"
        );

        burst::start(job.id, &params, self.registry.clone(), self.emitter.clone());
        Ok(job)
    }

    /// Starts the singleton rate-driven stream.
    pub fn start_continuous(&self, logs_per_second: u32, config: ContinuousConfig) -> Result<Job> {
        let params = ContinuousParams {
            logs_per_second,
            config,
        };
        params.validate(self.config.max_message_size_bytes)?;

        let cancel = tokio_util::sync::CancellationToken::new();
        let job = self
            .registry
            .create_continuous(params.clone(), cancel.clone())?;
        JOBS_STARTED_TOTAL
            .with_label_values(&[job.kind.as_str()])
            .inc();
        info!(job_id = %job.id, logs_per_second, "Continuous generation started");

        tokio::spawn(continuous::run(
            job.id,
            params,
            cancel,
            self.registry.clone(),
            self.emitter.clone(),
        ));
        Ok(job)
    }

    /// Stops the continuous stream and returns its final snapshot.
    pub fn stop_continuous(&self) -> Result<Job> {
        let job = self.registry.clear_continuous()?;
        self.emitter.flush();
        info!(
            job_id = %job.id,
            logs = job.logs_generated,
            duration_ms = job.duration_ms.unwrap_or_default(),
            "Continuous generation stopped"
        );
        Ok(job)
    }

    /// Stops the continuous stream (if any) and cancels every other live job.
    /// Safe to call with nothing running.
    pub fn stop_all(&self) -> StopAllReport {
        let continuous_job = self.stop_continuous().ok();
        let cancelled = self.registry.cancel_active();
        self.emitter.flush();

        info!(
            continuous = continuous_job.is_some(),
            cancelled = cancelled.len(),
            "All generation stopped"
        );
        StopAllReport {
            continuous_job,
            cancelled,
        }
    }

    pub fn job(&self, id: JobId) -> Result<Job> {
        self.registry.get(id)
    }

    pub fn status(&self) -> EngineStatus {
        let snapshot = self.registry.snapshot();
        let statistics = self.stats.snapshot();
        EngineStatus {
            uptime_ms: statistics.uptime_ms,
            statistics,
            active_jobs: snapshot.active,
            continuous_job: snapshot.continuous,
            finished_jobs: snapshot.finished_jobs,
        }
    }
}

fn job_properties(job_id: JobId) -> Properties {
    let mut properties = Properties::new();
    properties.insert("jobId".to_string(), job_id.to_string());
    properties
}
