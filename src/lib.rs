//! # telegen
//!
//! Synthetic telemetry generator. Produces log records, metrics and custom
//! events against a pluggable [`TelemetrySink`] so that ingestion pipelines
//! can be exercised under controlled load.
//!
//! Three job kinds:
//! - **paced**: a fixed number of records with a fixed delay between them
//! - **burst**: N concurrent workers emitting flat out for a bounded window
//! - **continuous**: one rate-driven stream that runs until stopped
//!
//! ```no_run
//! use std::sync::Arc;
//! use telegen::{EngineConfig, GenerationEngine, MemorySink, PacedParams, StatisticsAggregator};
//!
//! # async fn demo() -> telegen::Result<()> {
//! let engine = GenerationEngine::new(
//!     Arc::new(MemorySink::new()),
//!     Arc::new(StatisticsAggregator::new()),
//!     EngineConfig::default(),
//! );
//! let job = engine.start_paced(PacedParams {
//!     count: 100,
//!     interval_ms: 10,
//!     ..PacedParams::default()
//! })?;
//! println!("started {}", job.id);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod metrics;
pub mod payload;
pub mod registry;
pub mod sink;
pub mod stats;

pub use config::{EngineConfig, GENERATOR_VERSION, HttpSinkConfig, ServerConfig};
pub use engine::{EngineStatus, GenerationEngine, StopAllReport};
pub use error::{EngineError, ErrorKind, Result};
pub use job::{
    BurstParams, ContinuousConfig, ContinuousParams, Job, JobId, JobKind, JobParameters, JobStatus,
    Level, PacedParams,
};
pub use payload::generate_message;
pub use registry::{JobRegistry, RegistryConfig};
pub use sink::{
    HttpSink, MemorySink, Properties, Record, Severity, SinkError, SinkResult, TelemetrySink,
    TracingSink,
};
pub use stats::{StatisticsAggregator, StatisticsSnapshot};
