//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use trace_dispatch::config::{PropagationConfig, TracerConfig};
use trace_dispatch::http::{handler_fn, BoxError, Handler};
use trace_dispatch::tracer::{
    ConfiguredTracerFactory, InMemoryReporter, Tracer, TracerBuilder, TracerError, TracerFactory,
    TracerInitializer,
};

/// Factory that counts how many tracers it built.
#[derive(Debug, Clone)]
pub struct CountingFactory {
    pub constructions: Arc<AtomicUsize>,
    pub reporter: InMemoryReporter,
}

impl CountingFactory {
    pub fn new() -> Self {
        Self {
            constructions: Arc::new(AtomicUsize::new(0)),
            reporter: InMemoryReporter::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}

impl TracerFactory for CountingFactory {
    fn build(&self, config: &TracerConfig, builder: TracerBuilder) -> Result<Tracer, TracerError> {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        // Widen the window in which concurrent callers could race.
        std::thread::sleep(std::time::Duration::from_millis(20));
        ConfiguredTracerFactory::new()
            .with_reporter(Arc::new(self.reporter.clone()))
            .build(config, builder)
    }
}

/// Tracer config sampling everything, without the logging reporter.
pub fn tracer_config() -> TracerConfig {
    let mut config = TracerConfig::default();
    config.logging = false;
    config
}

/// An uninitialized tracer whose finished spans land in the returned reporter.
pub fn tracer() -> (Arc<TracerInitializer>, InMemoryReporter) {
    let reporter = InMemoryReporter::new();
    let factory = ConfiguredTracerFactory::new().with_reporter(Arc::new(reporter.clone()));
    let initializer =
        TracerInitializer::with_factory(tracer_config(), PropagationConfig::default(), factory);
    (Arc::new(initializer), reporter)
}

/// Handler answering `{"status":200}`, counting its invocations.
pub fn status_handler(name: &str, calls: Arc<AtomicUsize>) -> impl Handler {
    handler_fn(name, move |_req| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, BoxError>(Json(serde_json::json!({ "status": 200 })).into_response())
        }
    })
}

pub fn ok_handler(name: &str) -> impl Handler {
    handler_fn(name, |_req| async { Ok::<_, BoxError>(StatusCode::OK.into_response()) })
}

pub fn get(uri: &str) -> Request {
    axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
