//! Configuration for the engine, the HTTP sink and the server process.

use clap::Parser;
use serde::{Deserialize, Serialize};

pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Value of the `generatorId` property on every record
    pub generator_id: String,
    /// Finished jobs kept for lookup before the oldest are evicted
    pub max_finished_jobs: usize,
    /// Upper bound on requested payload sizes
    pub max_message_size_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            generator_id: "telegen".to_string(),
            max_finished_jobs: 1000,
            max_message_size_bytes: 1_048_576,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSinkConfig {
    /// Ingestion URL that receives JSON arrays of envelopes
    pub endpoint: String,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub channel_capacity: usize,
    pub timeout_ms: u64,
    /// Share of traces, exceptions and events kept, 0..=100. Metrics are never sampled.
    pub sampling_percentage: f64,
    pub role_name: String,
    pub role_instance: String,
    pub environment: String,
    pub generator_version: String,
}

impl Default for HttpSinkConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4318/ingest".to_string(),
            batch_size: 250,
            flush_interval_ms: 20_000,
            max_retries: 3,
            retry_base_delay_ms: 100,
            channel_capacity: 100_000,
            timeout_ms: 5000,
            sampling_percentage: 100.0,
            role_name: "telegen".to_string(),
            role_instance: "local".to_string(),
            environment: "development".to_string(),
            generator_version: GENERATOR_VERSION.to_string(),
        }
    }
}

/// Process configuration, read from flags with environment fallbacks.
#[derive(Debug, Clone, Parser)]
#[command(name = "telegen-server")]
#[command(about = "Synthetic telemetry generator with an HTTP control API")]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "TELEGEN_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Ingestion endpoint; records are only logged when unset
    #[arg(long, env = "TELEGEN_SINK_URL")]
    pub sink_url: Option<String>,

    /// Percentage of traces/exceptions/events forwarded to the endpoint
    #[arg(long, env = "TELEGEN_SAMPLING_PERCENTAGE", default_value_t = 100.0)]
    pub sampling_percentage: f64,

    /// Envelope batch size
    #[arg(long, env = "TELEGEN_BATCH_SIZE", default_value_t = 250)]
    pub batch_size: usize,

    /// Maximum time a partial batch waits before it is sent
    #[arg(long, env = "TELEGEN_BATCH_INTERVAL_MS", default_value_t = 20_000)]
    pub batch_interval_ms: u64,

    /// Deployment environment reported on every envelope
    #[arg(long, env = "TELEGEN_ENV", default_value = "development")]
    pub environment: String,

    /// Instance name reported on every envelope
    #[arg(long, env = "INSTANCE_ID", default_value = "local")]
    pub instance_id: String,

    /// Daily ingestion cap of the downstream sink, reported by /config/sink
    #[arg(long, env = "TELEGEN_DAILY_CAP_GB", default_value = "1")]
    pub daily_cap_gb: String,

    #[arg(long, env = "TELEGEN_CUSTOM_METRICS", default_value_t = false)]
    pub custom_metrics: bool,

    #[arg(long, env = "TELEGEN_CUSTOM_EVENTS", default_value_t = false)]
    pub custom_events: bool,

    /// Finished jobs kept for lookup
    #[arg(long, env = "TELEGEN_MAX_FINISHED_JOBS", default_value_t = 1000)]
    pub max_finished_jobs: usize,
}

impl ServerConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_finished_jobs: self.max_finished_jobs,
            ..EngineConfig::default()
        }
    }

    /// HTTP sink settings, or `None` when records should only be logged.
    pub fn http_sink_config(&self) -> Option<HttpSinkConfig> {
        let endpoint = self.sink_url.clone()?;
        Some(HttpSinkConfig {
            endpoint,
            batch_size: self.batch_size.max(1),
            flush_interval_ms: self.batch_interval_ms.max(1),
            sampling_percentage: self.sampling_percentage.clamp(0.0, 100.0),
            role_instance: self.instance_id.clone(),
            environment: self.environment.clone(),
            ..HttpSinkConfig::default()
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
