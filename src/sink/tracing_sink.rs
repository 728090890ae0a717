//! Sink that writes records to the process log. Selected when no ingestion
//! endpoint is configured.

use super::{Properties, Severity, SinkResult, TelemetrySink};
use tracing::trace;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl TelemetrySink for TracingSink {
    fn emit_trace(&self, message: &str, severity: Severity, properties: &Properties) -> SinkResult {
        trace!(
            target: "telegen::sink",
            kind = "trace",
            ?severity,
            size = message.len(),
            ?properties,
            "{message}"
        );
        Ok(())
    }

    fn emit_exception(
        &self,
        message: &str,
        severity: Severity,
        properties: &Properties,
    ) -> SinkResult {
        trace!(
            target: "telegen::sink",
            kind = "exception",
            ?severity,
            size = message.len(),
            ?properties,
            "{message}"
        );
        Ok(())
    }

    fn emit_metric(&self, name: &str, value: f64, properties: &Properties) -> SinkResult {
        trace!(target: "telegen::sink", kind = "metric", name, value, ?properties);
        Ok(())
    }

    fn emit_event(&self, name: &str, properties: &Properties) -> SinkResult {
        trace!(target: "telegen::sink", kind = "event", name, ?properties);
        Ok(())
    }

    fn flush(&self) -> SinkResult {
        Ok(())
    }
}
