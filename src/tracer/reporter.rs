//! Destinations for finished spans.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::tracer::span::FinishedSpan;

/// Receives every finished, sampled span.
pub trait Reporter: Send + Sync + fmt::Debug {
    fn report(&self, span: &FinishedSpan);
}

/// Writes finished spans to the process log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingReporter;

impl Reporter for LoggingReporter {
    fn report(&self, span: &FinishedSpan) {
        let tags = serde_json::to_string(&span.tags).unwrap_or_default();
        tracing::info!(
            service = %span.service_name,
            operation = %span.operation_name,
            trace_id = %format_args!("{:x}", span.context.trace_id),
            span_id = %format_args!("{:x}", span.context.span_id),
            parent_id = %format_args!("{:x}", span.context.parent_id),
            duration_ms = span.duration().as_secs_f64() * 1000.0,
            logs = span.logs.len(),
            tags = %tags,
            "Reporting span"
        );
    }
}

/// Keeps finished spans in memory for inspection.
#[derive(Debug, Default, Clone)]
pub struct InMemoryReporter {
    spans: Arc<Mutex<Vec<FinishedSpan>>>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all spans reported so far.
    pub fn finished_spans(&self) -> Vec<FinishedSpan> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Reporter for InMemoryReporter {
    fn report(&self, span: &FinishedSpan) {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(span.clone());
    }
}
