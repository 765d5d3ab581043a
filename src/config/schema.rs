//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the traced service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Tracer construction settings.
    pub tracer: TracerConfig,

    /// Names of the trace propagation headers.
    pub propagation: PropagationConfig,

    /// Middleware chain settings.
    pub app: AppConfig,

    /// Demo handler settings.
    pub demo: DemoConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8888").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8888".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Sampling strategy.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SamplerKind {
    /// Samples everything (`param = 1`) or nothing (`param = 0`).
    Const,
    /// Samples with probability `param`.
    Probabilistic,
}

/// Sampler configuration (`sampler.type`, `sampler.param`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplerConfig {
    #[serde(rename = "type")]
    pub kind: SamplerKind,
    pub param: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            kind: SamplerKind::Const,
            param: 1.0,
        }
    }
}

/// Which outbound client libraries receive automatic instrumentation.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ClientHooksConfig {
    /// `"all"` (or `"none"`).
    Keyword(String),
    /// Explicit list of hook names.
    List(Vec<String>),
}

impl Default for ClientHooksConfig {
    fn default() -> Self {
        ClientHooksConfig::Keyword("all".to_string())
    }
}

/// Tracer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Service name reported on every span and sent as caller name.
    pub service_name: String,

    /// Sampling strategy.
    pub sampler: SamplerConfig,

    /// Report finished spans to the process log.
    pub logging: bool,

    /// Outbound client hooks to install.
    pub client_hooks: ClientHooksConfig,

    /// Names of registered outbound interceptors to apply.
    pub client_interceptors: Vec<String>,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            service_name: "trace-dispatch-example".to_string(),
            sampler: SamplerConfig::default(),
            logging: true,
            client_hooks: ClientHooksConfig::default(),
            client_interceptors: Vec::new(),
        }
    }
}

/// Trace propagation header names.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Header carrying the serialized span context.
    pub trace_header: String,

    /// Headers naming the calling service, checked in order.
    pub caller_name_headers: Vec<String>,

    /// Headers naming the called endpoint, checked in order.
    pub callee_endpoint_headers: Vec<String>,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            trace_header: "uber-trace-id".to_string(),
            caller_name_headers: vec!["X-Uber-Source".to_string()],
            callee_endpoint_headers: vec!["X-Uber-Endpoint".to_string()],
        }
    }
}

/// Middleware chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Middleware registry names, in execution order.
    pub middlewares: Vec<String>,
}

/// Demo handler configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DemoConfig {
    /// Upstream URLs fetched by the demo handler: the first one alone,
    /// the rest concurrently.
    pub upstream_urls: Vec<String>,
}
