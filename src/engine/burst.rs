//! Burst executor.
//!
//! Workers are plain OS threads spinning on the emission path. A Tokio task
//! owns the deadline: it flips the job to `Stopping`, waits for every worker
//! to observe that and exit, then records completion.

use super::{
    BURST_EVENT_PROBABILITY, BURST_FLUSH_EVERY, BURST_MESSAGE_SIZE_BYTES, BURST_METRIC_PROBABILITY,
    Emitter, job_properties,
};
use crate::job::{BurstParams, JobId, JobStatus, Level};
use crate::payload::generate_message;
use crate::registry::JobRegistry;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

pub(super) fn start(
    job_id: JobId,
    params: &BurstParams,
    registry: Arc<JobRegistry>,
    emitter: Emitter,
) {
    let mut handles = Vec::with_capacity(params.worker_count);
    for worker in 0..params.worker_count {
        let registry = registry.clone();
        let emitter = emitter.clone();
        let spawned = thread::Builder::new()
            .name(format!("telegen-burst-{worker}"))
            .spawn(move || run_worker(job_id, worker, &registry, &emitter));
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => warn!(job_id = %job_id, worker, error = %e, "Failed to spawn burst worker"),
        }
    }

    let deadline = Duration::from_millis(params.duration_ms);
    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        if registry.begin_stopping(job_id) {
            info!(job_id = %job_id, "Burst deadline reached, draining workers");
        }

        let joined = tokio::task::spawn_blocking(move || {
            for handle in handles {
                if handle.join().is_err() {
                    error!(job_id = %job_id, "Burst worker panicked");
                }
            }
        })
        .await;
        if let Err(e) = joined {
            error!(job_id = %job_id, error = %e, "Burst drain task failed");
        }

        // No-op when the job was cancelled in the meantime.
        if registry.mark_terminal(job_id, JobStatus::Completed) {
            let logs = registry.get(job_id).map(|j| j.logs_generated).unwrap_or_default();
            info!(job_id = %job_id, logs, "Burst job completed");
        }
        emitter.flush();
    });
}

fn run_worker(job_id: JobId, worker: usize, registry: &JobRegistry, emitter: &Emitter) {
    let worker_id = worker.to_string();
    let metric_name = format!("burst_metric_{worker}");
    let event_name = format!("burst_event_{worker}");

    while registry.status(job_id) == Some(JobStatus::Running) {
        let message = generate_message(BURST_MESSAGE_SIZE_BYTES);
        let mut properties = job_properties(job_id);
        properties.insert("workerId".to_string(), worker_id.clone());
        properties.insert("burst".to_string(), "true".to_string());
        emitter.log(Level::Info, &message, properties);

        let mut metrics = 0;
        if Emitter::chance(BURST_METRIC_PROBABILITY) {
            let mut properties = job_properties(job_id);
            properties.insert("workerId".to_string(), worker_id.clone());
            emitter.metric(&metric_name, properties);
            metrics = 1;
        }
        let mut events = 0;
        if Emitter::chance(BURST_EVENT_PROBABILITY) {
            let mut properties = job_properties(job_id);
            properties.insert("workerId".to_string(), worker_id.clone());
            emitter.event(&event_name, properties);
            events = 1;
        }

        // The count is the one this worker's own increment produced.
        if let Some(total) = registry.increment_counters(job_id, 1, metrics, events)
            && total % BURST_FLUSH_EVERY == 0
        {
            thread::sleep(Duration::from_millis(1));
            emitter.flush();
        }
    }
}
