//! Spans and span contexts.
//!
//! A span is live from [`Tracer::start_span`](crate::tracer::Tracer::start_span)
//! until its first [`SpanHandle::finish`]. Tags and log events can only be
//! appended while it is live; the finish call takes the span data out of the
//! handle, so every later mutation or finish is a no-op.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::tracer::Tracer;

/// Flag bit marking a sampled trace.
pub const FLAG_SAMPLED: u8 = 0x01;

/// Identity of a span within a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpanContext {
    pub trace_id: u64,
    pub span_id: u64,
    /// Zero for root spans.
    pub parent_id: u64,
    pub flags: u8,
}

impl SpanContext {
    pub fn is_sampled(&self) -> bool {
        self.flags & FLAG_SAMPLED != 0
    }
}

/// A tag value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Bool(v) => write!(f, "{v}"),
            TagValue::Int(v) => write!(f, "{v}"),
            TagValue::Float(v) => write!(f, "{v}"),
            TagValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Bool(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Int(v)
    }
}

impl From<u16> for TagValue {
    fn from(v: u16) -> Self {
        TagValue::Int(i64::from(v))
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Float(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::Str(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::Str(v)
    }
}

/// A structured log event attached to a span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    pub timestamp: SystemTime,
    pub fields: Vec<(String, String)>,
}

impl LogEvent {
    /// Returns the value of the first field named `key`.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Data of a span that has been finished, as handed to reporters.
#[derive(Debug, Clone, Serialize)]
pub struct FinishedSpan {
    pub service_name: String,
    pub operation_name: String,
    pub context: SpanContext,
    pub start: SystemTime,
    pub finish: SystemTime,
    pub tags: BTreeMap<String, TagValue>,
    pub logs: Vec<LogEvent>,
}

impl FinishedSpan {
    pub fn tag(&self, key: &str) -> Option<&TagValue> {
        self.tags.get(key)
    }

    pub fn duration(&self) -> Duration {
        self.finish.duration_since(self.start).unwrap_or_default()
    }

    /// True when the span was tagged `error=true`.
    pub fn is_error(&self) -> bool {
        self.tag("error") == Some(&TagValue::Bool(true))
    }
}

#[derive(Debug)]
struct SpanData {
    operation_name: String,
    start: SystemTime,
    tags: BTreeMap<String, TagValue>,
    logs: Vec<LogEvent>,
}

#[derive(Debug)]
struct SpanInner {
    context: SpanContext,
    // `None` once finished.
    data: Mutex<Option<SpanData>>,
    tracer: Tracer,
}

/// Thread safe reference to a span.
#[derive(Debug, Clone)]
pub struct SpanHandle {
    inner: Arc<SpanInner>,
}

impl SpanHandle {
    pub(crate) fn new(tracer: Tracer, context: SpanContext, operation_name: String) -> Self {
        Self {
            inner: Arc::new(SpanInner {
                context,
                data: Mutex::new(Some(SpanData {
                    operation_name,
                    start: SystemTime::now(),
                    tags: BTreeMap::new(),
                    logs: Vec::new(),
                })),
                tracer,
            }),
        }
    }

    fn data(&self) -> MutexGuard<'_, Option<SpanData>> {
        self.inner
            .data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn with_data<T>(&self, f: impl FnOnce(&mut SpanData) -> T) -> Option<T> {
        self.data().as_mut().map(f)
    }

    pub fn context(&self) -> &SpanContext {
        &self.inner.context
    }

    pub fn tracer(&self) -> &Tracer {
        &self.inner.tracer
    }

    /// Operation name, or `None` once the span is finished.
    pub fn operation_name(&self) -> Option<String> {
        self.with_data(|data| data.operation_name.clone())
    }

    /// Returns `false` if the span is already finished.
    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<TagValue>) -> bool {
        let (key, value) = (key.into(), value.into());
        self.with_data(|data| {
            data.tags.insert(key, value);
        })
        .is_some()
    }

    pub fn tag(&self, key: &str) -> Option<TagValue> {
        self.with_data(|data| data.tags.get(key).cloned()).flatten()
    }

    /// Appends a structured log event. Returns `false` if the span is already finished.
    pub fn log_kv<K, V>(&self, fields: impl IntoIterator<Item = (K, V)>) -> bool
    where
        K: Into<String>,
        V: Into<String>,
    {
        let event = LogEvent {
            timestamp: SystemTime::now(),
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        };
        self.with_data(|data| data.logs.push(event)).is_some()
    }

    /// Tags the span `error=true` and logs an error event with `kind` and `message`.
    pub fn record_error(&self, kind: &str, message: &str) {
        self.set_tag("error", true);
        self.log_kv([
            ("event", "error"),
            ("error.kind", kind),
            ("message", message),
        ]);
    }

    pub fn is_finished(&self) -> bool {
        self.data().is_none()
    }

    /// Starts a child span of this one on the same tracer.
    pub fn child(&self, operation_name: impl Into<String>) -> SpanHandle {
        self.inner
            .tracer
            .start_span(operation_name, Some(&self.inner.context))
    }

    /// Finishes the span and hands it to the tracer's reporters.
    ///
    /// Returns `true` for the call that finished the span, `false` for any later call.
    pub fn finish(&self) -> bool {
        let data = match self.data().take() {
            Some(data) => data,
            None => return false,
        };

        let finished = FinishedSpan {
            service_name: self.inner.tracer.service_name().to_string(),
            operation_name: data.operation_name,
            context: self.inner.context,
            start: data.start,
            finish: SystemTime::now(),
            tags: data.tags,
            logs: data.logs,
        };
        self.inner.tracer.report(finished);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::{InMemoryReporter, Sampler};

    fn tracer() -> (Tracer, InMemoryReporter) {
        let reporter = InMemoryReporter::new();
        let tracer = Tracer::builder("span-tests")
            .with_sampler(Sampler::Const(true))
            .with_reporter(Arc::new(reporter.clone()))
            .build();
        (tracer, reporter)
    }

    #[test]
    fn test_finish_is_exactly_once() {
        let (tracer, reporter) = tracer();
        let span = tracer.start_span("op", None);

        assert!(span.finish());
        assert!(!span.finish());
        assert!(span.is_finished());
        assert_eq!(reporter.finished_spans().len(), 1);
    }

    #[test]
    fn test_mutations_rejected_after_finish() {
        let (tracer, reporter) = tracer();
        let span = tracer.start_span("op", None);
        assert!(span.set_tag("before", "yes"));
        span.finish();

        assert!(!span.set_tag("after", "no"));
        assert!(!span.log_kv([("event", "late")]));
        assert_eq!(span.operation_name(), None);

        let finished = &reporter.finished_spans()[0];
        assert_eq!(finished.tag("before"), Some(&TagValue::from("yes")));
        assert!(finished.tag("after").is_none());
        assert!(finished.logs.is_empty());
    }

    #[test]
    fn test_record_error() {
        let (tracer, reporter) = tracer();
        let span = tracer.start_span("op", None);
        span.record_error("io", "disk on fire");
        span.finish();

        let finished = &reporter.finished_spans()[0];
        assert!(finished.is_error());
        assert_eq!(finished.logs[0].field("event"), Some("error"));
        assert_eq!(finished.logs[0].field("message"), Some("disk on fire"));
    }

    #[test]
    fn test_child_shares_trace() {
        let (tracer, _) = tracer();
        let parent = tracer.start_span("parent", None);
        let child = parent.child("child");

        assert_eq!(child.context().trace_id, parent.context().trace_id);
        assert_eq!(child.context().parent_id, parent.context().span_id);
        assert_ne!(child.context().span_id, parent.context().span_id);
    }
}
