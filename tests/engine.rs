use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use telegen::{
    BurstParams, ContinuousConfig, EngineConfig, EngineError, ErrorKind, GenerationEngine, Job,
    JobId, JobStatus, Level, MemorySink, PacedParams, Properties, Record, Severity, SinkResult,
    StatisticsAggregator, TelemetrySink,
};

/// Counts records without keeping them; burst workers produce far too many
/// to store.
#[derive(Default)]
struct CountingSink {
    logs: AtomicU64,
    metrics: AtomicU64,
    events: AtomicU64,
    flushes: AtomicU64,
}

impl TelemetrySink for CountingSink {
    fn emit_trace(&self, _: &str, _: Severity, _: &Properties) -> SinkResult {
        self.logs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn emit_exception(&self, _: &str, _: Severity, _: &Properties) -> SinkResult {
        self.logs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn emit_metric(&self, _: &str, _: f64, _: &Properties) -> SinkResult {
        self.metrics.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn emit_event(&self, _: &str, _: &Properties) -> SinkResult {
        self.events.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&self) -> SinkResult {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn engine_with(sink: Arc<dyn TelemetrySink>) -> GenerationEngine {
    GenerationEngine::new(
        sink,
        Arc::new(StatisticsAggregator::new()),
        EngineConfig::default(),
    )
}

fn memory_engine() -> (GenerationEngine, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    (engine_with(sink.clone()), sink)
}

fn quiet_paced(count: u64, interval_ms: u64, message_size_bytes: usize) -> PacedParams {
    PacedParams {
        count,
        interval_ms,
        level: Level::Info,
        message_size_bytes,
        include_metrics: false,
        include_events: false,
    }
}

/// Polls the job until `done` holds or `timeout` passes.
async fn wait_for_job(
    engine: &GenerationEngine,
    id: JobId,
    timeout: Duration,
    done: impl Fn(&Job) -> bool,
) -> Job {
    let deadline = Instant::now() + timeout;
    loop {
        let job = engine.job(id).unwrap();
        if done(&job) || Instant::now() >= deadline {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_paced_scenario_five_small_records() {
    let (engine, sink) = memory_engine();

    let job = engine.start_paced(quiet_paced(5, 0, 10)).unwrap();
    assert_eq!(job.status, JobStatus::Running);

    let job = wait_for_job(&engine, job.id, Duration::from_secs(5), |j| {
        j.status.is_terminal()
    })
    .await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.logs_generated, 5);
    assert_eq!(job.metrics_generated, 0);
    assert_eq!(job.events_generated, 0);
    assert!(job.end_time.is_some());
    assert!(job.duration_ms.is_some());

    let traces = sink.traces();
    assert_eq!(traces.len(), 5);
    for record in &traces {
        let Record::Trace {
            message, severity, ..
        } = record
        else {
            unreachable!()
        };
        assert_eq!(message.len(), 10);
        assert_eq!(*severity, Severity::Information);
    }
    assert!(sink.metrics().is_empty());
    assert!(sink.events().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_paced_totals_match_count() {
    let (engine, sink) = memory_engine();
    let before = engine.statistics().snapshot();

    let job = engine.start_paced(quiet_paced(250, 0, 32)).unwrap();
    let job = wait_for_job(&engine, job.id, Duration::from_secs(10), |j| {
        j.status.is_terminal()
    })
    .await;

    let after = engine.statistics().snapshot();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.logs_generated, 250);
    assert_eq!(
        after.total_logs_generated - before.total_logs_generated,
        250
    );
    assert_eq!(after.total_bytes_generated, 250 * 32);
    assert_eq!(sink.log_count(), 250);
    // Iterations 0, 100 and 200 plus the final flush.
    assert_eq!(sink.flush_count(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_paced_record_properties() {
    let (engine, sink) = memory_engine();

    let job = engine.start_paced(quiet_paced(3, 0, 16)).unwrap();
    wait_for_job(&engine, job.id, Duration::from_secs(5), |j| {
        j.status.is_terminal()
    })
    .await;

    let traces = sink.traces();
    let session = traces[0].properties()["sessionId"].clone();
    for (i, record) in traces.iter().enumerate() {
        let props = record.properties();
        assert_eq!(props["jobId"], job.id.to_string());
        assert_eq!(props["index"], i.to_string());
        assert_eq!(props["generatorId"], "telegen");
        assert_eq!(props["messageSize"], "16");
        assert_eq!(props["sessionId"], session);
        assert!(props.contains_key("timestamp"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_paced_error_levels_become_exceptions() {
    let (engine, sink) = memory_engine();

    let mut params = quiet_paced(2, 0, 8);
    params.level = Level::Critical;
    let critical = engine.start_paced(params).unwrap();
    let mut params = quiet_paced(2, 0, 8);
    params.level = Level::Error;
    let error = engine.start_paced(params).unwrap();

    for id in [critical.id, error.id] {
        wait_for_job(&engine, id, Duration::from_secs(5), |j| j.status.is_terminal()).await;
    }

    let exceptions = sink.exceptions();
    assert_eq!(exceptions.len(), 4);
    assert!(sink.traces().is_empty());

    let critical_count = exceptions
        .iter()
        .filter(|r| {
            matches!(r, Record::Exception { message, severity: Severity::Critical, .. }
                if message.starts_with("CRITICAL: "))
        })
        .count();
    assert_eq!(critical_count, 2);
    // Payload bytes exclude the prefix.
    assert_eq!(engine.statistics().snapshot().total_bytes_generated, 4 * 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_paced_with_metrics_and_events() {
    let (engine, sink) = memory_engine();

    let mut params = quiet_paced(400, 0, 8);
    params.include_metrics = true;
    params.include_events = true;
    let job = engine.start_paced(params).unwrap();
    let job = wait_for_job(&engine, job.id, Duration::from_secs(10), |j| {
        j.status.is_terminal()
    })
    .await;

    assert_eq!(job.metrics_generated as usize, sink.metrics().len());
    assert_eq!(job.events_generated as usize, sink.events().len());
    // 0.3 and 0.2 over 400 iterations; far outside these bounds is a bug.
    assert!(job.metrics_generated > 40 && job.metrics_generated < 200);
    assert!(job.events_generated > 20 && job.events_generated < 160);

    let metric_name = format!("job_{}_metric", job.id);
    for record in sink.metrics() {
        let Record::Metric { name, value, .. } = record else {
            unreachable!()
        };
        assert_eq!(name, metric_name);
        assert!((0.0..1000.0).contains(&value));
    }
    for record in sink.events() {
        assert!(record.properties().contains_key("randomValue"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_paced_cancel_freezes_counters() {
    let (engine, _sink) = memory_engine();

    let job = engine.start_paced(quiet_paced(1000, 5, 16)).unwrap();
    wait_for_job(&engine, job.id, Duration::from_secs(5), |j| {
        j.logs_generated >= 10
    })
    .await;

    let report = engine.stop_all();
    assert!(report.cancelled.contains(&job.id));

    let cancelled = engine.job(job.id).unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert!(cancelled.logs_generated < 1000);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let later = engine.job(job.id).unwrap();
    assert_eq!(later.status, JobStatus::Cancelled);
    assert_eq!(later.logs_generated, cancelled.logs_generated);
    assert_eq!(later.end_time, cancelled.end_time);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_paced_flushes_before_sleeping() {
    let (engine, sink) = memory_engine();
    let started = telegen::metrics::JOBS_STARTED_TOTAL
        .with_label_values(&["paced"])
        .get();

    let job = engine.start_paced(quiet_paced(3, 60_000, 8)).unwrap();
    wait_for_job(&engine, job.id, Duration::from_secs(5), |j| {
        j.logs_generated >= 1
    })
    .await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The first record is flushed long before the interval elapses
    assert_eq!(sink.log_count(), 1);
    assert_eq!(sink.flush_count(), 1);
    assert!(
        telegen::metrics::JOBS_STARTED_TOTAL
            .with_label_values(&["paced"])
            .get()
            > started
    );

    engine.stop_all();
    assert_eq!(engine.job(job.id).unwrap().status, JobStatus::Cancelled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sink_failures_do_not_abort_job() {
    let (engine, sink) = memory_engine();
    sink.set_failing(true);

    let job = engine.start_paced(quiet_paced(50, 0, 8)).unwrap();
    let job = wait_for_job(&engine, job.id, Duration::from_secs(5), |j| {
        j.status.is_terminal()
    })
    .await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.logs_generated, 50);
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn test_start_validation() {
    let (engine, _sink) = memory_engine();

    let err = engine.start_paced(quiet_paced(0, 0, 8)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = engine.start_paced(quiet_paced(1, 60_001, 8)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = engine
        .start_paced(quiet_paced(1, 0, 2 * 1024 * 1024))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = engine
        .start_burst(BurstParams {
            duration_ms: 500,
            worker_count: 1,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = engine
        .start_burst(BurstParams {
            duration_ms: 1000,
            worker_count: 0,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = engine
        .start_continuous(0, ContinuousConfig::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = engine
        .start_continuous(10_001, ContinuousConfig::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let status = engine.status();
    assert!(status.active_jobs.is_empty());
    assert!(status.continuous_job.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_continuous_singleton_and_stop() {
    let (engine, sink) = memory_engine();

    let job = engine
        .start_continuous(200, ContinuousConfig::default())
        .unwrap();
    assert_eq!(job.status, JobStatus::Running);

    let err = engine
        .start_continuous(10, ContinuousConfig::default())
        .unwrap_err();
    assert_eq!(err, EngineError::ContinuousAlreadyRunning { job_id: job.id });
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let running = wait_for_job(&engine, job.id, Duration::from_secs(5), |j| {
        j.logs_generated >= 5
    })
    .await;
    assert!(running.logs_generated >= 5);

    let status = engine.status();
    assert_eq!(status.continuous_job.as_ref().map(|j| j.id), Some(job.id));
    assert!(status.active_jobs.iter().all(|j| j.id != job.id));

    let stopped = engine.stop_continuous().unwrap();
    assert_eq!(stopped.status, JobStatus::Stopped);
    assert!(stopped.end_time.is_some());
    let flushes = sink.flush_count();

    let err = engine.stop_continuous().unwrap_err();
    assert_eq!(err, EngineError::NoContinuousJob);
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(sink.flush_count(), flushes);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let later = engine.job(job.id).unwrap();
    assert_eq!(later.logs_generated, stopped.logs_generated);
    assert!(engine.status().continuous_job.is_none());

    // The slot is free again.
    let next = engine
        .start_continuous(50, ContinuousConfig::default())
        .unwrap();
    assert_ne!(next.id, job.id);
    engine.stop_continuous().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_continuous_records() {
    let (engine, sink) = memory_engine();
    let config = ContinuousConfig {
        level: Level::Warning,
        message_size_bytes: 20,
        include_metrics: false,
        include_events: false,
    };

    let job = engine.start_continuous(500, config).unwrap();
    wait_for_job(&engine, job.id, Duration::from_secs(5), |j| {
        j.logs_generated >= 10
    })
    .await;
    engine.stop_continuous().unwrap();

    let traces = sink.traces();
    assert!(traces.len() >= 10);
    for record in traces {
        let Record::Trace {
            message,
            severity,
            properties,
        } = record
        else {
            unreachable!()
        };
        assert_eq!(message.len(), 20);
        assert_eq!(severity, Severity::Warning);
        assert_eq!(properties["continuousJobId"], job.id.to_string());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_continuous_flush_cadence() {
    let (engine, sink) = memory_engine();

    let job = engine
        .start_continuous(1000, ContinuousConfig::default())
        .unwrap();
    wait_for_job(&engine, job.id, Duration::from_secs(10), |j| {
        j.logs_generated >= 250
    })
    .await;
    let stopped = engine.stop_continuous().unwrap();

    assert!(stopped.logs_generated >= 250);
    // One flush per hundred logs, plus the one on stop
    assert!(sink.flush_count() > stopped.logs_generated / 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_continuous_with_metrics_and_events() {
    let (engine, sink) = memory_engine();
    let config = ContinuousConfig {
        level: Level::Info,
        message_size_bytes: 8,
        include_metrics: true,
        include_events: true,
    };

    let job = engine.start_continuous(1000, config).unwrap();
    wait_for_job(&engine, job.id, Duration::from_secs(10), |j| {
        j.logs_generated >= 1000
    })
    .await;
    let stopped = engine.stop_continuous().unwrap();
    assert!(stopped.logs_generated >= 1000);

    let metrics = sink.metrics();
    let events = sink.events();
    // 0.1 and 0.05 per tick; far outside these bounds is a bug.
    assert!(metrics.len() > 30 && metrics.len() < 250);
    assert!(events.len() > 10 && events.len() < 150);

    for record in metrics {
        let Record::Metric {
            name, properties, ..
        } = record
        else {
            unreachable!()
        };
        assert_eq!(name, "continuous_metric");
        assert_eq!(properties["continuousJobId"], job.id.to_string());
    }
    for record in events {
        let Record::Event { name, .. } = record else {
            unreachable!()
        };
        assert_eq!(name, "continuous_event");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_continuous_stop_without_history() {
    let sink = Arc::new(MemorySink::new());
    let engine = GenerationEngine::new(
        sink.clone(),
        Arc::new(StatisticsAggregator::new()),
        EngineConfig {
            max_finished_jobs: 0,
            ..EngineConfig::default()
        },
    );

    let job = engine
        .start_continuous(100, ContinuousConfig::default())
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let flushes = sink.flush_count();

    let stopped = engine.stop_continuous().unwrap();
    assert_eq!(stopped.id, job.id);
    assert_eq!(stopped.status, JobStatus::Stopped);
    assert!(sink.flush_count() > flushes);
    assert!(engine.status().continuous_job.is_none());
    assert_eq!(engine.job(job.id).unwrap_err(), EngineError::NotFound(job.id));

    let next = engine
        .start_continuous(100, ContinuousConfig::default())
        .unwrap();
    let report = engine.stop_all();
    assert_eq!(report.continuous_job.map(|j| j.id), Some(next.id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_burst_reaches_stopping_then_completes() {
    let sink = Arc::new(CountingSink::default());
    let engine = engine_with(sink.clone());

    let started = Instant::now();
    let job = engine
        .start_burst(BurstParams {
            duration_ms: 1000,
            worker_count: 5,
        })
        .unwrap();

    let mut last = 0;
    let mut increased = false;
    loop {
        let snapshot = engine.job(job.id).unwrap();
        assert!(snapshot.logs_generated >= last);
        increased |= snapshot.logs_generated > last;
        last = snapshot.logs_generated;
        if snapshot.status != JobStatus::Running {
            break;
        }
        assert!(started.elapsed() < Duration::from_secs(10));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert!(increased);

    let done = wait_for_job(&engine, job.id, Duration::from_secs(10), |j| {
        j.status.is_terminal()
    })
    .await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.logs_generated >= last);
    assert_eq!(sink.logs.load(Ordering::Relaxed), done.logs_generated);
    assert_eq!(
        engine.statistics().snapshot().total_logs_generated,
        done.logs_generated
    );
    // Every multiple of 1000 is hit by exactly one worker, plus the final flush
    assert!(sink.flushes.load(Ordering::Relaxed) > done.logs_generated / 1000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_burst_with_metrics_and_events() {
    let sink = Arc::new(CountingSink::default());
    let engine = engine_with(sink.clone());

    let job = engine
        .start_burst(BurstParams {
            duration_ms: 1000,
            worker_count: 2,
        })
        .unwrap();
    let done = wait_for_job(&engine, job.id, Duration::from_secs(10), |j| {
        j.status.is_terminal()
    })
    .await;

    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.logs_generated > 1000);
    assert_eq!(sink.metrics.load(Ordering::Relaxed), done.metrics_generated);
    assert_eq!(sink.events.load(Ordering::Relaxed), done.events_generated);
    // 0.5 and 0.3 per record
    let logs = done.logs_generated as f64;
    let metrics = done.metrics_generated as f64;
    let events = done.events_generated as f64;
    assert!(metrics > logs * 0.4 && metrics < logs * 0.6);
    assert!(events > logs * 0.2 && events < logs * 0.4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_all_cancels_burst() {
    let sink = Arc::new(CountingSink::default());
    let engine = engine_with(sink.clone());

    let job = engine
        .start_burst(BurstParams {
            duration_ms: 1000,
            worker_count: 2,
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let report = engine.stop_all();
    assert_eq!(report.cancelled, vec![job.id]);
    let cancelled = engine.job(job.id).unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);

    // The deadline passing later must not revive or complete the job.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let later = engine.job(job.id).unwrap();
    assert_eq!(later.status, JobStatus::Cancelled);
    assert_eq!(later.logs_generated, cancelled.logs_generated);
}

#[tokio::test]
async fn test_stop_all_when_idle() {
    let (engine, sink) = memory_engine();
    let before = engine.statistics().snapshot();

    let report = engine.stop_all();
    assert!(report.cancelled.is_empty());
    assert!(report.continuous_job.is_none());

    let after = engine.statistics().snapshot();
    assert_eq!(after.total_logs_generated, before.total_logs_generated);
    assert_eq!(after.total_bytes_generated, before.total_bytes_generated);
    assert_eq!(sink.flush_count(), 1);
    assert!(sink.records().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_all_stops_continuous() {
    let (engine, _sink) = memory_engine();

    let continuous = engine
        .start_continuous(100, ContinuousConfig::default())
        .unwrap();
    let paced = engine.start_paced(quiet_paced(1000, 10, 8)).unwrap();

    let report = engine.stop_all();
    assert_eq!(report.continuous_job.map(|j| j.id), Some(continuous.id));
    assert_eq!(report.cancelled, vec![paced.id]);

    assert_eq!(engine.job(continuous.id).unwrap().status, JobStatus::Stopped);
    assert_eq!(engine.job(paced.id).unwrap().status, JobStatus::Cancelled);

    let status = engine.status();
    assert!(status.active_jobs.is_empty());
    assert!(status.continuous_job.is_none());
    assert_eq!(status.finished_jobs, 2);

    // Nothing left to stop.
    assert!(engine.stop_all().cancelled.is_empty());
}

#[tokio::test]
async fn test_unknown_job() {
    let (engine, _sink) = memory_engine();
    let id = JobId::new();
    assert_eq!(engine.job(id).unwrap_err(), EngineError::NotFound(id));
}
