use super::{
    Emitter, PACED_EVENT_PROBABILITY, PACED_FLUSH_EVERY, PACED_METRIC_PROBABILITY, job_properties,
};
use crate::job::{JobId, JobStatus, PacedParams};
use crate::payload::generate_message;
use crate::registry::JobRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Emits `params.count` records, sleeping `interval_ms` between them.
pub(super) async fn run(
    job_id: JobId,
    params: PacedParams,
    registry: Arc<JobRegistry>,
    emitter: Emitter,
) {
    let interval = Duration::from_millis(params.interval_ms);
    let metric_name = format!("job_{job_id}_metric");
    let event_name = format!("job_{job_id}_event");

    for index in 0..params.count {
        if registry.status(job_id) != Some(JobStatus::Running) {
            break;
        }

        let message = generate_message(params.message_size_bytes);
        let mut properties = job_properties(job_id);
        properties.insert("index".to_string(), index.to_string());
        emitter.log(params.level, &message, properties.clone());

        let mut metrics = 0;
        if params.include_metrics && Emitter::chance(PACED_METRIC_PROBABILITY) {
            emitter.metric(&metric_name, job_properties(job_id));
            metrics = 1;
        }
        let mut events = 0;
        if params.include_events && Emitter::chance(PACED_EVENT_PROBABILITY) {
            emitter.event(&event_name, properties);
            events = 1;
        }
        registry.increment_counters(job_id, 1, metrics, events);

        if index % PACED_FLUSH_EVERY == 0 {
            emitter.flush();
        }

        if interval.is_zero() {
            tokio::task::yield_now().await;
        } else if index + 1 < params.count {
            tokio::time::sleep(interval).await;
        }
    }

    if registry.mark_terminal(job_id, JobStatus::Completed) {
        emitter.flush();
        info!(job_id = %job_id, logs = params.count, "Paced job completed");
    } else {
        info!(job_id = %job_id, "Paced job cancelled");
    }
}
