//! HTTP sink - batched envelope forwarding
//!
//! Records are turned into envelopes, pushed onto a bounded channel and
//! drained by a background worker that POSTs JSON batches to the ingestion
//! endpoint with retry and exponential backoff. Enqueueing never blocks: a
//! full queue is reported as backpressure and the record is dropped.

use super::{Properties, Severity, SinkError, SinkResult, TelemetrySink};
use crate::config::HttpSinkConfig;
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnvelopeKind {
    Message,
    Exception,
    Metric,
    Event,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub kind: EnvelopeKind,
    pub time: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub properties: Properties,
}

#[derive(Debug)]
enum Command {
    Record(Box<Envelope>),
    Flush,
}

#[derive(Debug, Default)]
pub struct HttpSinkStats {
    pub sent: AtomicU64,
    pub failed: AtomicU64,
    pub retried: AtomicU64,
    pub dropped: AtomicU64,
    pub sampled_out: AtomicU64,
    pub batches: AtomicU64,
}

pub struct HttpSink {
    tx: mpsc::Sender<Command>,
    stats: Arc<HttpSinkStats>,
    tags: BTreeMap<String, String>,
    environment: String,
    generator_version: String,
    keep_ratio: f64,
}

impl HttpSink {
    /// Creates the sink and spawns its forwarding worker on the current Tokio runtime.
    pub fn new(config: HttpSinkConfig) -> Self {
        let (sink, rx) = Self::detached(&config);
        let stats = sink.stats.clone();

        tokio::spawn(async move {
            Self::worker(rx, config, stats).await;
        });

        sink
    }

    fn detached(config: &HttpSinkConfig) -> (Self, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let mut tags = BTreeMap::new();
        tags.insert("cloud.role".to_string(), config.role_name.clone());
        tags.insert("cloud.roleInstance".to_string(), config.role_instance.clone());

        let sink = Self {
            tx,
            stats: Arc::new(HttpSinkStats::default()),
            tags,
            environment: config.environment.clone(),
            generator_version: config.generator_version.clone(),
            keep_ratio: (config.sampling_percentage / 100.0).clamp(0.0, 1.0),
        };
        (sink, rx)
    }

    pub fn stats(&self) -> &HttpSinkStats {
        &self.stats
    }

    fn envelope(&self, kind: EnvelopeKind, properties: &Properties) -> Envelope {
        let mut properties = properties.clone();
        properties.insert("environment".to_string(), self.environment.clone());
        properties.insert(
            "generatorVersion".to_string(),
            self.generator_version.clone(),
        );

        Envelope {
            kind,
            time: Utc::now(),
            tags: self.tags.clone(),
            message: None,
            severity: None,
            name: None,
            value: None,
            properties,
        }
    }

    fn sampled_in(&self) -> bool {
        if self.keep_ratio >= 1.0 {
            return true;
        }
        let keep = rand::rng().random_bool(self.keep_ratio);
        if !keep {
            self.stats.sampled_out.fetch_add(1, Ordering::Relaxed);
        }
        keep
    }

    fn enqueue(&self, command: Command) -> SinkResult {
        match self.tx.try_send(command) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(SinkError::Backpressure)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(SinkError::Closed)
            }
        }
    }

    async fn worker(
        mut rx: mpsc::Receiver<Command>,
        config: HttpSinkConfig,
        stats: Arc<HttpSinkStats>,
    ) {
        let client = match reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_max_idle_per_host(10)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            }
        };

        let batch_size = config.batch_size.max(1);
        let mut batch: Vec<Envelope> = Vec::with_capacity(batch_size);
        let period = Duration::from_millis(config.flush_interval_ms.max(1));
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        info!(endpoint = %config.endpoint, batch_size, "HTTP sink started");

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Record(envelope)) => {
                        batch.push(*envelope);
                        if batch.len() >= batch_size {
                            Self::send_batch(&client, &mut batch, &config, &stats).await;
                        }
                    }
                    // Flush requests on an empty batch coalesce into nothing
                    Some(Command::Flush) => {
                        Self::send_batch(&client, &mut batch, &config, &stats).await;
                    }
                    None => break,
                },
                _ = interval.tick() => {
                    Self::send_batch(&client, &mut batch, &config, &stats).await;
                }
            }
        }

        Self::send_batch(&client, &mut batch, &config, &stats).await;
        info!("HTTP sink stopped");
    }

    async fn send_batch(
        client: &reqwest::Client,
        batch: &mut Vec<Envelope>,
        config: &HttpSinkConfig,
        stats: &HttpSinkStats,
    ) {
        if batch.is_empty() {
            return;
        }

        let payload = std::mem::take(batch);
        let count = payload.len() as u64;

        for attempt in 0..=config.max_retries {
            match Self::post(client, &config.endpoint, &payload).await {
                Ok(()) => {
                    stats.sent.fetch_add(count, Ordering::Relaxed);
                    stats.batches.fetch_add(1, Ordering::Relaxed);
                    debug!(count, "Forwarded envelopes");
                    return;
                }
                Err(e) => warn!(attempt, error = %e, "Failed to forward envelopes"),
            }

            if attempt < config.max_retries {
                stats.retried.fetch_add(1, Ordering::Relaxed);
                let delay = config.retry_base_delay_ms * (1 << attempt);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        stats.failed.fetch_add(count, Ordering::Relaxed);
        error!(count, "Dropped envelopes after max retries");
    }

    async fn post(client: &reqwest::Client, url: &str, payload: &[Envelope]) -> SinkResult {
        let response = client.post(url).json(payload).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Ingestion endpoint is rate limiting");
        }
        Err(SinkError::Rejected {
            status: status.as_u16(),
        })
    }
}

impl TelemetrySink for HttpSink {
    fn emit_trace(&self, message: &str, severity: Severity, properties: &Properties) -> SinkResult {
        if !self.sampled_in() {
            return Ok(());
        }
        let mut envelope = self.envelope(EnvelopeKind::Message, properties);
        envelope.message = Some(message.to_string());
        envelope.severity = Some(severity);
        self.enqueue(Command::Record(Box::new(envelope)))
    }

    fn emit_exception(
        &self,
        message: &str,
        severity: Severity,
        properties: &Properties,
    ) -> SinkResult {
        if !self.sampled_in() {
            return Ok(());
        }
        let mut envelope = self.envelope(EnvelopeKind::Exception, properties);
        envelope.message = Some(message.to_string());
        envelope.severity = Some(severity);
        self.enqueue(Command::Record(Box::new(envelope)))
    }

    fn emit_metric(&self, name: &str, value: f64, properties: &Properties) -> SinkResult {
        let mut envelope = self.envelope(EnvelopeKind::Metric, properties);
        envelope.name = Some(name.to_string());
        envelope.value = Some(value);
        self.enqueue(Command::Record(Box::new(envelope)))
    }

    fn emit_event(&self, name: &str, properties: &Properties) -> SinkResult {
        if !self.sampled_in() {
            return Ok(());
        }
        let mut envelope = self.envelope(EnvelopeKind::Event, properties);
        envelope.name = Some(name.to_string());
        self.enqueue(Command::Record(Box::new(envelope)))
    }

    fn flush(&self) -> SinkResult {
        self.enqueue(Command::Flush)
    }
}
