use super::{
    CONTINUOUS_EVENT_PROBABILITY, CONTINUOUS_FLUSH_EVERY, CONTINUOUS_METRIC_PROBABILITY, Emitter,
};
use crate::job::{ContinuousParams, JobId, JobStatus};
use crate::payload::generate_message;
use crate::registry::JobRegistry;
use crate::sink::Properties;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Emits one record per tick at `logs_per_second` until `cancel` fires.
pub(super) async fn run(
    job_id: JobId,
    params: ContinuousParams,
    cancel: CancellationToken,
    registry: Arc<JobRegistry>,
    emitter: Emitter,
) {
    let period = Duration::from_secs_f64(1.0 / f64::from(params.logs_per_second));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let config = params.config;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if registry.status(job_id) != Some(JobStatus::Running) {
            break;
        }

        let message = generate_message(config.message_size_bytes);
        emitter.log(config.level, &message, tags(job_id));

        let mut metrics = 0;
        if config.include_metrics && Emitter::chance(CONTINUOUS_METRIC_PROBABILITY) {
            emitter.metric("continuous_metric", tags(job_id));
            metrics = 1;
        }
        let mut events = 0;
        if config.include_events && Emitter::chance(CONTINUOUS_EVENT_PROBABILITY) {
            emitter.event("continuous_event", tags(job_id));
            events = 1;
        }

        if let Some(total) = registry.increment_counters(job_id, 1, metrics, events)
            && total % CONTINUOUS_FLUSH_EVERY == 0
        {
            emitter.flush();
        }
    }

    debug!(job_id = %job_id, "Continuous timer exited");
}

fn tags(job_id: JobId) -> Properties {
    let mut properties = Properties::new();
    properties.insert("continuousJobId".to_string(), job_id.to_string());
    properties
}
