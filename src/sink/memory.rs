//! In-memory sink. Keeps every record; used by tests and dry runs.

use super::{Properties, Severity, SinkError, SinkResult, TelemetrySink};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Trace {
        message: String,
        severity: Severity,
        properties: Properties,
    },
    Exception {
        message: String,
        severity: Severity,
        properties: Properties,
    },
    Metric {
        name: String,
        value: f64,
        properties: Properties,
    },
    Event {
        name: String,
        properties: Properties,
    },
}

impl Record {
    pub fn properties(&self) -> &Properties {
        match self {
            Record::Trace { properties, .. }
            | Record::Exception { properties, .. }
            | Record::Metric { properties, .. }
            | Record::Event { properties, .. } => properties,
        }
    }

    /// True for trace and exception records, i.e. generated log lines.
    pub fn is_log(&self) -> bool {
        matches!(self, Record::Trace { .. } | Record::Exception { .. })
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
    flushes: AtomicU64,
    failing: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every emission returns `SinkError::Closed` without recording.
    /// Flushes are still counted.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<Record> {
        self.lock().clone()
    }

    pub fn traces(&self) -> Vec<Record> {
        self.filtered(|r| matches!(r, Record::Trace { .. }))
    }

    pub fn exceptions(&self) -> Vec<Record> {
        self.filtered(|r| matches!(r, Record::Exception { .. }))
    }

    pub fn metrics(&self) -> Vec<Record> {
        self.filtered(|r| matches!(r, Record::Metric { .. }))
    }

    pub fn events(&self) -> Vec<Record> {
        self.filtered(|r| matches!(r, Record::Event { .. }))
    }

    pub fn log_count(&self) -> usize {
        self.lock().iter().filter(|r| r.is_log()).count()
    }

    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    fn filtered(&self, keep: impl Fn(&Record) -> bool) -> Vec<Record> {
        self.lock().iter().filter(|r| keep(r)).cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, record: Record) -> SinkResult {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }
        self.lock().push(record);
        Ok(())
    }
}

impl TelemetrySink for MemorySink {
    fn emit_trace(&self, message: &str, severity: Severity, properties: &Properties) -> SinkResult {
        self.push(Record::Trace {
            message: message.to_string(),
            severity,
            properties: properties.clone(),
        })
    }

    fn emit_exception(
        &self,
        message: &str,
        severity: Severity,
        properties: &Properties,
    ) -> SinkResult {
        self.push(Record::Exception {
            message: message.to_string(),
            severity,
            properties: properties.clone(),
        })
    }

    fn emit_metric(&self, name: &str, value: f64, properties: &Properties) -> SinkResult {
        self.push(Record::Metric {
            name: name.to_string(),
            value,
            properties: properties.clone(),
        })
    }

    fn emit_event(&self, name: &str, properties: &Properties) -> SinkResult {
        self.push(Record::Event {
            name: name.to_string(),
            properties: properties.clone(),
        })
    }

    fn flush(&self) -> SinkResult {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
