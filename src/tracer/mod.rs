//! Tracing subsystem.
//!
//! # Data Flow
//! ```text
//! TracerInitializer (initializer.rs, once per process)
//!     → TracerFactory builds the Tracer (sampler.rs, reporter.rs)
//!     → client hooks + interceptors installed (hooks.rs)
//!
//! Per request:
//!     propagation.rs extracts the caller's span context
//!     → Tracer::start_span (span.rs)
//!     → SpanHandle::finish → Reporter::report
//! ```
//!
//! # Design Decisions
//! - The tracer is an explicit handle, cloned into whoever needs it; no global
//! - Sampling is decided once per trace, at the root
//! - Unsampled spans are fully functional but never reach reporters

pub mod context;
pub mod hooks;
pub mod initializer;
pub mod propagation;
pub mod reporter;
pub mod sampler;
pub mod span;

use std::sync::Arc;

pub use context::{current_span, SpanGuard};
pub use hooks::{ClientInterceptor, InstalledHooks, TracedClient};
pub use initializer::{ConfiguredTracerFactory, TracerFactory, TracerInitializer};
pub use propagation::Propagator;
pub use reporter::{InMemoryReporter, LoggingReporter, Reporter};
pub use sampler::Sampler;
pub use span::{FinishedSpan, LogEvent, SpanContext, SpanHandle, TagValue, FLAG_SAMPLED};

use crate::observability::metrics;

/// Errors raised while constructing the tracer.
#[derive(Debug, thiserror::Error)]
pub enum TracerError {
    #[error("sampler param {param} is out of range for `{kind}` sampler")]
    SamplerParam { kind: &'static str, param: f64 },
    #[error("invalid propagation header name `{0}`")]
    HeaderName(String),
    #[error("unknown client hook `{0}`")]
    UnknownHook(String),
    #[error("unknown client hooks keyword `{0}`")]
    HooksKeyword(String),
    #[error("unknown client interceptor `{0}`")]
    UnknownInterceptor(String),
    #[error("tracer construction failed: {0}")]
    Construction(String),
}

#[derive(Debug)]
struct TracerInner {
    service_name: String,
    sampler: Sampler,
    reporters: Vec<Arc<dyn Reporter>>,
    propagator: Propagator,
    hooks: InstalledHooks,
    interceptors: Vec<Arc<dyn ClientInterceptor>>,
}

/// Creates spans and hands finished ones to reporters.
#[derive(Debug, Clone)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

impl Tracer {
    pub fn builder(service_name: impl Into<String>) -> TracerBuilder {
        TracerBuilder::new(service_name)
    }

    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    pub fn sampler(&self) -> &Sampler {
        &self.inner.sampler
    }

    pub fn propagator(&self) -> &Propagator {
        &self.inner.propagator
    }

    pub fn hooks(&self) -> &InstalledHooks {
        &self.inner.hooks
    }

    pub fn interceptors(&self) -> &[Arc<dyn ClientInterceptor>] {
        &self.inner.interceptors
    }

    /// Start a span, as a child of `parent` when given, otherwise as a new root.
    pub fn start_span(
        &self,
        operation_name: impl Into<String>,
        parent: Option<&SpanContext>,
    ) -> SpanHandle {
        let context = match parent {
            Some(parent) => SpanContext {
                trace_id: parent.trace_id,
                span_id: new_id(),
                parent_id: parent.span_id,
                flags: parent.flags,
            },
            None => SpanContext {
                trace_id: new_id(),
                span_id: new_id(),
                parent_id: 0,
                flags: if self.inner.sampler.is_sampled() { FLAG_SAMPLED } else { 0 },
            },
        };

        let span = SpanHandle::new(self.clone(), context, operation_name.into());
        if parent.is_none() && context.is_sampled() {
            span.set_tag("sampler.type", self.inner.sampler.type_tag());
            span.set_tag("sampler.param", self.inner.sampler.param_tag());
        }
        span
    }

    pub(crate) fn report(&self, span: FinishedSpan) {
        metrics::record_span_finished(span.context.is_sampled());
        if !span.context.is_sampled() {
            return;
        }
        for reporter in &self.inner.reporters {
            reporter.report(&span);
        }
    }
}

fn new_id() -> u64 {
    loop {
        let id: u64 = rand::random();
        if id != 0 {
            return id;
        }
    }
}

/// Assembles a [`Tracer`].
#[derive(Debug)]
pub struct TracerBuilder {
    service_name: String,
    sampler: Sampler,
    reporters: Vec<Arc<dyn Reporter>>,
    propagator: Option<Propagator>,
    hooks: InstalledHooks,
    interceptors: Vec<Arc<dyn ClientInterceptor>>,
}

impl TracerBuilder {
    fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            sampler: Sampler::default(),
            reporters: Vec::new(),
            propagator: None,
            hooks: InstalledHooks::default(),
            interceptors: Vec::new(),
        }
    }

    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn with_propagator(mut self, propagator: Propagator) -> Self {
        self.propagator = Some(propagator);
        self
    }

    pub fn with_hooks(mut self, hooks: InstalledHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn ClientInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> Tracer {
        Tracer {
            inner: Arc::new(TracerInner {
                service_name: self.service_name,
                sampler: self.sampler,
                reporters: self.reporters,
                propagator: self.propagator.unwrap_or_default(),
                hooks: self.hooks,
                interceptors: self.interceptors,
            }),
        }
    }
}
