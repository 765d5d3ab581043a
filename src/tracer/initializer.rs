//! Exactly-once tracer construction.
//!
//! # Responsibilities
//! - Build the tracer from configuration on first use
//! - Install client hooks and interceptors together with it
//! - Stay retryable when construction fails
//!
//! # Design Decisions
//! - Double-checked locking: lock-free fast path on an atomic flag, a real
//!   mutex around construction so racing first requests on different worker
//!   threads build exactly one tracer
//! - The flag is only set after construction succeeds
//! - The initializer is an explicit object shared through `Arc`, not a static

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::config::{PropagationConfig, TracerConfig};
use crate::tracer::hooks::{self, ClientInterceptor};
use crate::tracer::{
    LoggingReporter, Propagator, Reporter, Sampler, Tracer, TracerBuilder, TracerError,
};

/// Turns configuration into a tracer.
///
/// The builder handed in already carries the service name, propagator,
/// installed hooks and interceptors; the factory decides sampling and
/// reporting.
pub trait TracerFactory: Send + Sync {
    fn build(&self, config: &TracerConfig, builder: TracerBuilder) -> Result<Tracer, TracerError>;
}

/// Factory driven purely by [`TracerConfig`], plus any extra reporters.
#[derive(Debug, Default, Clone)]
pub struct ConfiguredTracerFactory {
    reporters: Vec<Arc<dyn Reporter>>,
}

impl ConfiguredTracerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporters.push(reporter);
        self
    }
}

impl TracerFactory for ConfiguredTracerFactory {
    fn build(&self, config: &TracerConfig, builder: TracerBuilder) -> Result<Tracer, TracerError> {
        let mut builder = builder.with_sampler(Sampler::from_config(&config.sampler)?);
        if config.logging {
            builder = builder.with_reporter(Arc::new(LoggingReporter));
        }
        for reporter in &self.reporters {
            builder = builder.with_reporter(reporter.clone());
        }
        Ok(builder.build())
    }
}

/// Process-wide tracer state.
pub struct TracerInitializer {
    config: TracerConfig,
    propagation: PropagationConfig,
    factory: Box<dyn TracerFactory>,
    interceptors: HashMap<String, Arc<dyn ClientInterceptor>>,
    initialized: AtomicBool,
    guard: Mutex<()>,
    tracer: OnceLock<Tracer>,
}

impl TracerInitializer {
    pub fn new(config: TracerConfig, propagation: PropagationConfig) -> Self {
        Self::with_factory(config, propagation, ConfiguredTracerFactory::new())
    }

    pub fn with_factory(
        config: TracerConfig,
        propagation: PropagationConfig,
        factory: impl TracerFactory + 'static,
    ) -> Self {
        Self {
            config,
            propagation,
            factory: Box::new(factory),
            interceptors: HashMap::new(),
            initialized: AtomicBool::new(false),
            guard: Mutex::new(()),
            tracer: OnceLock::new(),
        }
    }

    /// Register an interceptor selectable by name from `tracer.client_interceptors`.
    pub fn register_interceptor(mut self, interceptor: Arc<dyn ClientInterceptor>) -> Self {
        self.interceptors
            .insert(interceptor.name().to_string(), interceptor);
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// The tracer, if it has been constructed.
    pub fn tracer(&self) -> Option<Tracer> {
        if self.is_initialized() {
            self.tracer.get().cloned()
        } else {
            None
        }
    }

    /// Construct the tracer unless that already happened, and return it.
    pub fn ensure_initialized(&self) -> Result<Tracer, TracerError> {
        if let Some(tracer) = self.tracer() {
            return Ok(tracer);
        }

        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tracer) = self.tracer() {
            return Ok(tracer);
        }

        let tracer = self.construct().inspect_err(|e| {
            tracing::error!(error = %e, "Tracer initialization failed");
        })?;
        let tracer = self.tracer.get_or_init(|| tracer).clone();
        self.initialized.store(true, Ordering::Release);
        Ok(tracer)
    }

    fn construct(&self) -> Result<Tracer, TracerError> {
        tracing::info!(
            service_name = %self.config.service_name,
            config = %serde_json::to_string(&self.config).unwrap_or_default(),
            "Initializing tracer"
        );

        let propagator = Propagator::from_config(&self.propagation)?;
        let interceptors = self
            .config
            .client_interceptors
            .iter()
            .map(|name| {
                self.interceptors
                    .get(name)
                    .cloned()
                    .ok_or_else(|| TracerError::UnknownInterceptor(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let hooks = hooks::install_patches(&self.config.client_hooks)?;

        let mut builder = Tracer::builder(self.config.service_name.clone())
            .with_propagator(propagator)
            .with_hooks(hooks);
        for interceptor in interceptors {
            builder = builder.with_interceptor(interceptor);
        }
        self.factory.build(&self.config, builder)
    }
}
