//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, sampler params)
//! - Check header names are usable as HTTP header names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;

use crate::config::schema::{ClientHooksConfig, SamplerKind, ServiceConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address `{0}`")]
    BindAddress(String),
    #[error("invalid metrics address `{0}`")]
    MetricsAddress(String),
    #[error("timeouts.request_secs must be greater than zero")]
    ZeroTimeout,
    #[error("tracer.service_name must not be empty")]
    EmptyServiceName,
    #[error("sampler param {param} is out of range for `{kind}` sampler")]
    SamplerParam { kind: &'static str, param: f64 },
    #[error("unknown client_hooks keyword `{0}` (expected \"all\", \"none\" or a list)")]
    HooksKeyword(String),
    #[error("invalid header name `{0}`")]
    HeaderName(String),
    #[error("empty middleware name at position {0}")]
    EmptyMiddlewareName(usize),
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    let tracer = &config.tracer;
    if tracer.service_name.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName);
    }

    let param = tracer.sampler.param;
    match tracer.sampler.kind {
        SamplerKind::Const if param != 0.0 && param != 1.0 => {
            errors.push(ValidationError::SamplerParam { kind: "const", param });
        }
        SamplerKind::Probabilistic if !(0.0..=1.0).contains(&param) => {
            errors.push(ValidationError::SamplerParam { kind: "probabilistic", param });
        }
        _ => {}
    }

    if let ClientHooksConfig::Keyword(keyword) = &tracer.client_hooks {
        if keyword != "all" && keyword != "none" {
            errors.push(ValidationError::HooksKeyword(keyword.clone()));
        }
    }

    let propagation = &config.propagation;
    let headers = std::iter::once(&propagation.trace_header)
        .chain(&propagation.caller_name_headers)
        .chain(&propagation.callee_endpoint_headers);
    for name in headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::HeaderName(name.clone()));
        }
    }

    for (idx, name) in config.app.middlewares.iter().enumerate() {
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyMiddlewareName(idx));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ServiceConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServiceConfig::default();
        config.listener.bind_address = "not-an-addr".into();
        config.timeouts.request_secs = 0;
        config.tracer.sampler.param = 0.5;
        config.propagation.caller_name_headers.push("bad header".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::ZeroTimeout));
        assert!(errors.contains(&ValidationError::SamplerParam { kind: "const", param: 0.5 }));
    }

    #[test]
    fn test_probabilistic_range() {
        let mut config = ServiceConfig::default();
        config.tracer.sampler.kind = SamplerKind::Probabilistic;
        config.tracer.sampler.param = 0.3;
        assert!(validate_config(&config).is_ok());

        config.tracer.sampler.param = 1.5;
        assert!(validate_config(&config).is_err());
    }
}
