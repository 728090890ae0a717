//! HTTP Control API
//!
//! REST surface over the generation engine:
//! - Start paced, burst and continuous generation
//! - Stop continuous generation or everything at once
//! - Status, per-job lookup, sink configuration and Prometheus metrics
//!
//! Handler logic lives in framework-independent `handle_*` functions; the
//! axum layer at the bottom only extracts inputs and encodes results.

use crate::config::{GENERATOR_VERSION, ServerConfig};
use crate::engine::{EngineStatus, GenerationEngine};
use crate::error::{EngineError, ErrorKind};
use crate::job::{
    BurstParams, ContinuousConfig, ContinuousParams, DEFAULT_MESSAGE_SIZE_BYTES, Job, JobId,
    JobParameters, PacedParams,
};
use crate::metrics::{self, ACTIVE_JOBS};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{OriginalUri, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SERVICE_NAME: &str = "telegen";

/// Sink settings reported by `GET /config/sink`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkSettings {
    pub endpoint: &'static str,
    #[serde(rename = "dailyCapGB")]
    pub daily_cap_gb: String,
    pub custom_metrics_enabled: bool,
    pub custom_events_enabled: bool,
    pub sampling_percentage: f64,
}

impl SinkSettings {
    pub fn from_server_config(config: &ServerConfig) -> Self {
        Self {
            endpoint: if config.sink_url.is_some() {
                "Configured"
            } else {
                "Not configured"
            },
            daily_cap_gb: config.daily_cap_gb.clone(),
            custom_metrics_enabled: config.custom_metrics,
            custom_events_enabled: config.custom_events,
            sampling_percentage: config.sampling_percentage,
        }
    }
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            endpoint: "Not configured",
            daily_cap_gb: "1".to_string(),
            custom_metrics_enabled: false,
            custom_events_enabled: false,
            sampling_percentage: 100.0,
        }
    }
}

/// Shared state behind every route.
pub struct AppState {
    pub engine: GenerationEngine,
    pub sink: SinkSettings,
}

pub type SharedState = Arc<AppState>;

pub fn create_shared_state(engine: GenerationEngine, sink: SinkSettings) -> SharedState {
    Arc::new(AppState { engine, sink })
}

// ============================================================================
// API Request/Response Types
// ============================================================================

/// Body of `POST /generate-logs`. Numbers are signed so that negative input
/// is reported as a validation error rather than a decode failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateLogsRequest {
    pub count: i64,
    pub interval: i64,
    pub level: String,
    pub message_size: i64,
    pub include_metrics: bool,
    pub include_events: bool,
}

impl Default for GenerateLogsRequest {
    fn default() -> Self {
        Self {
            count: 1000,
            interval: 100,
            level: "info".to_string(),
            message_size: DEFAULT_MESSAGE_SIZE_BYTES as i64,
            include_metrics: true,
            include_events: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BurstLogsRequest {
    pub duration: i64,
    pub threads_count: i64,
}

impl Default for BurstLogsRequest {
    fn default() -> Self {
        Self {
            duration: 60_000,
            threads_count: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContinuousLogsRequest {
    pub action: Option<String>,
    pub logs_per_second: i64,
    pub config: ContinuousConfig,
}

impl Default for ContinuousLogsRequest {
    fn default() -> Self {
        Self {
            action: None,
            logs_per_second: 100,
            config: ContinuousConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_seconds: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateLogsResponse {
    pub job_id: JobId,
    pub message: &'static str,
    pub parameters: PacedParams,
    pub estimated_duration: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstLogsResponse {
    pub job_id: JobId,
    pub message: &'static str,
    pub parameters: BurstParams,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuousLogsResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ContinuousParams>,
    /// Final snapshot of a stopped stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<Job>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopAllResponse {
    pub message: &'static str,
    pub continuous_stopped: bool,
    pub cancelled_jobs: usize,
}

/// Error response: a status code plus `{ "error": message }`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: &self.message,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

fn unsigned<T: TryFrom<i64>>(field: &'static str, value: i64) -> ApiResult<T> {
    T::try_from(value)
        .map_err(|_| EngineError::validation(field, "must not be negative").into())
}

// ============================================================================
// API Handler Functions (for integration with any HTTP framework)
// ============================================================================

/// Handle GET /health
pub fn handle_health(state: &AppState) -> HealthResponse {
    HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: GENERATOR_VERSION,
        uptime_seconds: state.engine.statistics().uptime_ms() as f64 / 1000.0,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

/// Handle GET /status
pub fn handle_status(state: &AppState) -> EngineStatus {
    state.engine.status()
}

/// Handle POST /generate-logs
pub fn handle_generate_logs(
    state: &AppState,
    request: GenerateLogsRequest,
) -> ApiResult<GenerateLogsResponse> {
    let params = PacedParams {
        count: unsigned("count", request.count)?,
        interval_ms: unsigned("interval", request.interval)?,
        level: request.level.parse()?,
        message_size_bytes: unsigned("messageSize", request.message_size)?,
        include_metrics: request.include_metrics,
        include_events: request.include_events,
    };
    let job = state.engine.start_paced(params.clone())?;

    let estimated_secs = params.count as f64 * params.interval_ms as f64 / 1000.0;
    Ok(GenerateLogsResponse {
        job_id: job.id,
        message: "Log generation started",
        parameters: params,
        estimated_duration: format!("{estimated_secs:.2} seconds"),
    })
}

/// Handle POST /burst-logs
pub fn handle_burst_logs(
    state: &AppState,
    request: BurstLogsRequest,
) -> ApiResult<BurstLogsResponse> {
    let params = BurstParams {
        duration_ms: unsigned("duration", request.duration)?,
        worker_count: unsigned("threadsCount", request.threads_count)?,
    };
    let job = state.engine.start_burst(params.clone())?;

    Ok(BurstLogsResponse {
        job_id: job.id,
        message: "Burst log generation started",
        parameters: params,
    })
}

/// Handle POST /continuous-logs
pub fn handle_continuous_logs(
    state: &AppState,
    request: ContinuousLogsRequest,
) -> ApiResult<ContinuousLogsResponse> {
    match request.action.as_deref() {
        Some("start") => {
            let logs_per_second = u32::try_from(request.logs_per_second).map_err(|_| {
                EngineError::validation("logsPerSecond", "must be between 1 and 10000")
            })?;
            let job = state
                .engine
                .start_continuous(logs_per_second, request.config)?;
            let parameters = match &job.parameters {
                JobParameters::Continuous(p) => Some(p.clone()),
                _ => None,
            };
            Ok(ContinuousLogsResponse {
                message: "Continuous log generation started",
                job_id: Some(job.id),
                parameters,
                job: None,
            })
        }
        Some("stop") => {
            let job = state.engine.stop_continuous()?;
            Ok(ContinuousLogsResponse {
                message: "Continuous log generation stopped",
                job_id: Some(job.id),
                parameters: None,
                job: Some(job),
            })
        }
        _ => Err(EngineError::validation("action", "must be either \"start\" or \"stop\"").into()),
    }
}

/// Handle POST /stop-all
pub fn handle_stop_all(state: &AppState) -> StopAllResponse {
    let report = state.engine.stop_all();
    StopAllResponse {
        message: "All log generation stopped",
        continuous_stopped: report.continuous_job.is_some(),
        cancelled_jobs: report.cancelled.len(),
    }
}

/// Handle GET /jobs/{id}
pub fn handle_get_job(state: &AppState, id: &str) -> ApiResult<Job> {
    let id: JobId = id
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid job id: {id}")))?;
    Ok(state.engine.job(id)?)
}

/// Handle GET /config/sink
pub fn handle_sink_config(state: &AppState) -> SinkSettings {
    state.sink.clone()
}

/// Handle GET /metrics
pub fn handle_metrics(state: &AppState) -> String {
    ACTIVE_JOBS.set(state.engine.registry().list_active().len() as i64);
    metrics::render()
}

/// API routes definition for documentation/integration
pub fn api_routes() -> Vec<(&'static str, &'static str, &'static str)> {
    vec![
        ("GET", "/health", "Liveness and uptime"),
        ("GET", "/status", "Totals, active jobs and the continuous stream"),
        ("POST", "/generate-logs", "Start a paced job"),
        ("POST", "/burst-logs", "Start a burst job"),
        ("POST", "/continuous-logs", "Start or stop continuous generation"),
        ("POST", "/stop-all", "Stop every running job"),
        ("GET", "/jobs/{id}", "Look up one job"),
        ("GET", "/config/sink", "Telemetry sink settings"),
        ("GET", "/metrics", "Prometheus metrics"),
    ]
}

// ============================================================================
// AXUM LAYER
// ============================================================================

/// Decodes a JSON body; an empty body means "all defaults".
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))
}

fn respond<T: Serialize>(result: ApiResult<T>) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(handle_health(&state))
}

async fn status(State(state): State<SharedState>) -> Json<EngineStatus> {
    Json(handle_status(&state))
}

async fn generate_logs(State(state): State<SharedState>, body: Bytes) -> Response {
    respond(parse_body(&body).and_then(|req| handle_generate_logs(&state, req)))
}

async fn burst_logs(State(state): State<SharedState>, body: Bytes) -> Response {
    respond(parse_body(&body).and_then(|req| handle_burst_logs(&state, req)))
}

async fn continuous_logs(State(state): State<SharedState>, body: Bytes) -> Response {
    respond(parse_body(&body).and_then(|req| handle_continuous_logs(&state, req)))
}

async fn stop_all(State(state): State<SharedState>) -> Json<StopAllResponse> {
    Json(handle_stop_all(&state))
}

async fn get_job(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    respond(handle_get_job(&state, &id))
}

async fn sink_config(State(state): State<SharedState>) -> Json<SinkSettings> {
    Json(handle_sink_config(&state))
}

async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle_metrics(&state),
    )
}

#[derive(Serialize)]
struct NotFoundBody {
    error: &'static str,
    path: String,
}

async fn not_found(OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundBody {
            error: "Not found",
            path: uri.path().to_string(),
        }),
    )
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/generate-logs", post(generate_logs))
        .route("/burst-logs", post(burst_logs))
        .route("/continuous-logs", post(continuous_logs))
        .route("/stop-all", post(stop_all))
        .route("/jobs/{id}", get(get_job))
        .route("/config/sink", get(sink_config))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .with_state(state)
}
