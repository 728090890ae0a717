//! telegen-server: synthetic telemetry generator behind an HTTP control API.
//!
//! Records go to the ingestion endpoint given by `--sink-url` /
//! `TELEGEN_SINK_URL`; without one they are only written to the process log
//! (enable with `RUST_LOG=telegen::sink=trace`). Resident memory is reported
//! as a `MemoryUsageMB` metric every 30 seconds.

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use telegen::{
    GENERATOR_VERSION, GenerationEngine, HttpSink, Properties, ServerConfig, StatisticsAggregator,
    TelemetrySink, TracingSink,
    api::{self, SinkSettings},
    metrics,
};

/// Time given to the HTTP sink to push its last batch after stop-all.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);
/// Period of the `MemoryUsageMB` metric.
const MEMORY_REPORT_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();
    info!(version = GENERATOR_VERSION, "Starting telegen");

    let http_sink = config.http_sink_config();
    let forwarding = http_sink.is_some();
    let sink: Arc<dyn TelemetrySink> = match http_sink {
        Some(sink_config) => {
            info!(
                endpoint = %sink_config.endpoint,
                sampling = sink_config.sampling_percentage,
                batch_size = sink_config.batch_size,
                "Forwarding telemetry over HTTP"
            );
            Arc::new(HttpSink::new(sink_config))
        }
        None => {
            warn!("No sink endpoint configured; telemetry will only be logged");
            Arc::new(TracingSink::new())
        }
    };

    let mut startup = Properties::new();
    startup.insert("version".to_string(), GENERATOR_VERSION.to_string());
    startup.insert("platform".to_string(), std::env::consts::OS.to_string());
    startup.insert("environment".to_string(), config.environment.clone());
    startup.insert("dailyCapGB".to_string(), config.daily_cap_gb.clone());
    if let Err(e) = sink.emit_event("TelegenStartup", &startup) {
        warn!(error = %e, "Failed to emit startup event");
    }

    spawn_memory_reporter(sink.clone());

    let engine = GenerationEngine::new(
        sink,
        Arc::new(StatisticsAggregator::new()),
        config.engine_config(),
    );
    let state = api::create_shared_state(engine.clone(), SinkSettings::from_server_config(&config));
    let app = api::router(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr.as_str()).await?;
    info!(addr = %addr, "Control API listening");
    for (method, path, desc) in api::api_routes() {
        info!("  {method:6} {path:18} - {desc}");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, stopping all generation");
    engine.stop_all();
    if forwarding {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    }
    info!("Goodbye.");
    Ok(())
}

fn spawn_memory_reporter(sink: Arc<dyn TelemetrySink>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(MEMORY_REPORT_INTERVAL);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(usage) = metrics::memory_usage() else {
                warn!("Process memory unavailable; memory metric disabled");
                return;
            };
            if let Err(e) = sink.emit_metric("MemoryUsageMB", usage.rss_mb, &usage.properties()) {
                warn!(error = %e, "Failed to emit memory metric");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
