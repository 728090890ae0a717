//! Job Registry with Bounded History
//!
//! Owns every job record. All mutation happens under one mutex, so worker
//! loops, timers and the control surface can call in concurrently without
//! lost updates. Finished jobs stay queryable until `max_finished_jobs` is
//! exceeded, then the oldest finished ones are evicted. Live jobs are never
//! evicted.

use crate::error::{EngineError, Result};
use crate::job::{ContinuousParams, Job, JobId, JobParameters, JobStatus};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Finished jobs kept for lookup
    pub max_finished_jobs: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_finished_jobs: 1000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    pub total_created: u64,
    pub total_finished: u64,
    pub total_evicted: u64,
}

/// Point-in-time view of the registry taken under a single lock.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    /// Running or stopping jobs other than the continuous one, oldest first
    pub active: Vec<Job>,
    pub continuous: Option<Job>,
    pub finished_jobs: usize,
}

struct Entry {
    seq: u64,
    job: Job,
}

/// The continuous job's slot. Holding the token lets whoever clears the
/// slot stop the job's timer.
struct ContinuousSlot {
    job_id: JobId,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Entry>,
    next_seq: u64,
    finished: VecDeque<JobId>,
    continuous: Option<ContinuousSlot>,
    stats: RegistryStats,
}

impl Inner {
    fn insert(&mut self, job: Job) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.stats.total_created += 1;
        self.jobs.insert(job.id, Entry { seq, job });
    }

    /// Returns the terminal snapshot, taken before the history bound can
    /// evict the job itself.
    fn finish(&mut self, id: JobId, status: JobStatus, max_finished: usize) -> Option<Job> {
        let entry = self.jobs.get_mut(&id)?;
        if !entry.job.finish(status) {
            return None;
        }
        let snapshot = entry.job.clone();
        self.stats.total_finished += 1;
        self.finished.push_back(id);
        while self.finished.len() > max_finished {
            if let Some(oldest) = self.finished.pop_front() {
                self.jobs.remove(&oldest);
                self.stats.total_evicted += 1;
            }
        }
        Some(snapshot)
    }

    fn sorted_active(&self) -> Vec<Job> {
        let mut active: Vec<&Entry> = self
            .jobs
            .values()
            .filter(|e| e.job.status.is_active())
            .collect();
        active.sort_by_key(|e| e.seq);
        active.into_iter().map(|e| e.job.clone()).collect()
    }
}

pub struct JobRegistry {
    inner: Mutex<Inner>,
    config: RegistryConfig,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            config,
        }
    }

    // Every mutation is a whole-field update, so data behind a poisoned
    // lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new running job with zeroed counters.
    pub fn create(&self, parameters: JobParameters) -> Job {
        let job = Job::new(parameters);
        self.lock().insert(job.clone());
        job
    }

    pub fn get(&self, id: JobId) -> Result<Job> {
        self.lock()
            .jobs
            .get(&id)
            .map(|e| e.job.clone())
            .ok_or(EngineError::NotFound(id))
    }

    /// Current status only; cheaper than `get` for polling loops.
    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.lock().jobs.get(&id).map(|e| e.job.status)
    }

    /// Running or stopping jobs in creation order, the continuous job included.
    pub fn list_active(&self) -> Vec<Job> {
        self.lock().sorted_active()
    }

    /// Moves a job to a terminal status, stamping end time and duration.
    ///
    /// Returns false without touching anything if the job is unknown or
    /// already terminal.
    pub fn mark_terminal(&self, id: JobId, status: JobStatus) -> bool {
        self.lock()
            .finish(id, status, self.config.max_finished_jobs)
            .is_some()
    }

    /// Running -> Stopping. Returns false if the job was not running.
    pub fn begin_stopping(&self, id: JobId) -> bool {
        let mut inner = self.lock();
        match inner.jobs.get_mut(&id) {
            Some(entry) if entry.job.status == JobStatus::Running => {
                entry.job.status = JobStatus::Stopping;
                true
            }
            _ => false,
        }
    }

    /// Adds to a live job's counters and returns its new log count.
    ///
    /// `None` if the job is unknown or terminal; counters of finished jobs
    /// are frozen.
    pub fn increment_counters(
        &self,
        id: JobId,
        logs: u64,
        metrics: u64,
        events: u64,
    ) -> Option<u64> {
        let mut inner = self.lock();
        let job = &mut inner.jobs.get_mut(&id)?.job;
        if job.status.is_terminal() {
            return None;
        }
        job.logs_generated += logs;
        job.metrics_generated += metrics;
        job.events_generated += events;
        Some(job.logs_generated)
    }

    /// Creates the continuous job and claims the single continuous slot in
    /// one step.
    pub fn create_continuous(
        &self,
        parameters: ContinuousParams,
        cancel: CancellationToken,
    ) -> Result<Job> {
        let mut inner = self.lock();
        if let Some(slot) = &inner.continuous {
            return Err(EngineError::ContinuousAlreadyRunning {
                job_id: slot.job_id,
            });
        }

        let job = Job::new(JobParameters::Continuous(parameters));
        inner.continuous = Some(ContinuousSlot {
            job_id: job.id,
            cancel,
        });
        inner.insert(job.clone());
        Ok(job)
    }

    pub fn continuous(&self) -> Option<Job> {
        let inner = self.lock();
        let slot = inner.continuous.as_ref()?;
        inner.jobs.get(&slot.job_id).map(|e| e.job.clone())
    }

    /// Empties the continuous slot, cancels its timer and marks the job
    /// `Stopped`. Returns the terminal snapshot.
    pub fn clear_continuous(&self) -> Result<Job> {
        let mut inner = self.lock();
        let slot = inner.continuous.take().ok_or(EngineError::NoContinuousJob)?;
        slot.cancel.cancel();
        match inner.finish(slot.job_id, JobStatus::Stopped, self.config.max_finished_jobs) {
            Some(job) => Ok(job),
            None => inner
                .jobs
                .get(&slot.job_id)
                .map(|e| e.job.clone())
                .ok_or(EngineError::NotFound(slot.job_id)),
        }
    }

    /// Cancels every running or stopping job and returns their ids.
    ///
    /// A continuous job caught here also loses its slot and timer.
    pub fn cancel_active(&self) -> Vec<JobId> {
        let mut inner = self.lock();
        let ids: Vec<JobId> = inner.sorted_active().into_iter().map(|j| j.id).collect();
        for id in &ids {
            inner.finish(*id, JobStatus::Cancelled, self.config.max_finished_jobs);
        }
        if let Some(slot) = inner.continuous.take_if(|slot| ids.contains(&slot.job_id)) {
            slot.cancel.cancel();
        }
        ids
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let inner = self.lock();
        let continuous_id = inner.continuous.as_ref().map(|s| s.job_id);
        let active = inner
            .sorted_active()
            .into_iter()
            .filter(|j| Some(j.id) != continuous_id)
            .collect();
        let continuous = continuous_id.and_then(|id| inner.jobs.get(&id).map(|e| e.job.clone()));

        RegistrySnapshot {
            active,
            continuous,
            finished_jobs: inner.finished.len(),
        }
    }

    pub fn stats(&self) -> RegistryStats {
        self.lock().stats.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
