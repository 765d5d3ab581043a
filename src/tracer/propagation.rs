//! Trace propagation over HTTP headers.
//!
//! The span context travels in a single header (by default `uber-trace-id`)
//! encoded as `{trace_id}:{span_id}:{parent_id}:{flags}` in lowercase hex.
//! Caller and callee identity travel in separately configured headers.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::PropagationConfig;
use crate::tracer::span::SpanContext;
use crate::tracer::TracerError;

/// Encode a span context into its header form.
pub fn encode(context: &SpanContext) -> String {
    format!(
        "{:x}:{:x}:{:x}:{:x}",
        context.trace_id, context.span_id, context.parent_id, context.flags
    )
}

/// Decode a header value into a span context.
///
/// Accepts URL-encoded separators. Trace ids longer than 64 bits keep their
/// low 64 bits. Zero trace or span ids are rejected.
pub fn decode(value: &str) -> Option<SpanContext> {
    if !value.is_ascii() {
        return None;
    }
    let value = value.trim().replace("%3A", ":").replace("%3a", ":");
    let mut parts = value.split(':');
    let (trace, span, parent, flags) = (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let trace = hex_digits(trace)?;
    let trace = if trace.len() > 16 { &trace[trace.len() - 16..] } else { trace };
    let context = SpanContext {
        trace_id: u64::from_str_radix(trace, 16).ok()?,
        span_id: u64::from_str_radix(hex_digits(span)?, 16).ok()?,
        parent_id: u64::from_str_radix(hex_digits(parent)?, 16).ok()?,
        flags: u8::from_str_radix(hex_digits(flags)?, 16).ok()?,
    };

    if context.trace_id == 0 || context.span_id == 0 {
        return None;
    }
    Some(context)
}

// `from_str_radix` also takes a leading sign.
fn hex_digits(field: &str) -> Option<&str> {
    (!field.is_empty() && field.bytes().all(|b| b.is_ascii_hexdigit())).then_some(field)
}

/// Reads and writes propagation headers.
#[derive(Debug, Clone)]
pub struct Propagator {
    trace_header: HeaderName,
    caller_name_headers: Vec<HeaderName>,
    callee_endpoint_headers: Vec<HeaderName>,
}

fn header_name(name: &str) -> Result<HeaderName, TracerError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| TracerError::HeaderName(name.to_string()))
}

impl Default for Propagator {
    fn default() -> Self {
        Self {
            trace_header: HeaderName::from_static("uber-trace-id"),
            caller_name_headers: vec![HeaderName::from_static("x-uber-source")],
            callee_endpoint_headers: vec![HeaderName::from_static("x-uber-endpoint")],
        }
    }
}

impl Propagator {
    pub fn from_config(config: &PropagationConfig) -> Result<Self, TracerError> {
        Ok(Self {
            trace_header: header_name(&config.trace_header)?,
            caller_name_headers: config
                .caller_name_headers
                .iter()
                .map(|h| header_name(h))
                .collect::<Result<_, _>>()?,
            callee_endpoint_headers: config
                .callee_endpoint_headers
                .iter()
                .map(|h| header_name(h))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn trace_header(&self) -> &HeaderName {
        &self.trace_header
    }

    /// Extract the remote span context, if present and well formed.
    pub fn extract(&self, headers: &HeaderMap) -> Option<SpanContext> {
        let raw = headers.get(&self.trace_header)?;
        let context = raw.to_str().ok().and_then(decode);
        if context.is_none() {
            tracing::debug!(header = %self.trace_header, value = ?raw, "Ignoring malformed trace header");
        }
        context
    }

    /// Write the span context into outbound headers.
    pub fn inject(&self, context: &SpanContext, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&encode(context)) {
            headers.insert(self.trace_header.clone(), value);
        }
    }

    /// Name of the calling service, from the first caller-name header present.
    pub fn caller_name<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        first_value(&self.caller_name_headers, headers)
    }

    /// Name of the called endpoint, from the first callee-endpoint header present.
    pub fn callee_endpoint<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        first_value(&self.callee_endpoint_headers, headers)
    }

    /// Identify this service as the caller on an outbound request.
    pub fn inject_caller_name(&self, service_name: &str, headers: &mut HeaderMap) {
        let Some(name) = self.caller_name_headers.first() else {
            return;
        };
        if let Ok(value) = HeaderValue::from_str(service_name) {
            headers.insert(name.clone(), value);
        }
    }
}

fn first_value<'a>(names: &[HeaderName], headers: &'a HeaderMap) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| headers.get(name))
        .filter_map(|value| value.to_str().ok())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn propagator() -> Propagator {
        Propagator::from_config(&PropagationConfig::default()).unwrap()
    }

    #[test]
    fn test_decode() {
        let ctx = decode("abc:de:0:1").unwrap();
        assert_eq!(ctx.trace_id, 0xabc);
        assert_eq!(ctx.span_id, 0xde);
        assert_eq!(ctx.parent_id, 0);
        assert!(ctx.is_sampled());

        let encoded = decode("abc%3Ade%3A0%3A1").unwrap();
        assert_eq!(encoded, ctx);
    }

    #[test]
    fn test_decode_128_bit_trace_id() {
        let ctx = decode("0000000000000001000000000000abcd:1:0:0").unwrap();
        assert_eq!(ctx.trace_id, 0xabcd);
        assert!(!ctx.is_sampled());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode("").is_none());
        assert!(decode("abc:de:0").is_none());
        assert!(decode("abc:de:0:1:7").is_none());
        assert!(decode("xyz:de:0:1").is_none());
        assert!(decode("0:de:0:1").is_none());
        assert!(decode("abc:0:0:1").is_none());
    }

    #[test]
    fn test_decode_rejects_signed_fields() {
        assert!(decode("+abc:de:0:1").is_none());
        assert!(decode("abc:+de:0:1").is_none());
        assert!(decode("abc:de:+0:1").is_none());
        assert!(decode("abc:de:0:+1").is_none());
        assert!(decode("abc: de:0:1").is_none());
    }

    #[test]
    fn test_inject_then_extract() {
        let p = propagator();
        let ctx = SpanContext { trace_id: 7, span_id: 9, parent_id: 3, flags: 1 };
        let mut headers = HeaderMap::new();
        p.inject(&ctx, &mut headers);

        assert_eq!(headers.get("uber-trace-id").unwrap(), "7:9:3:1");
        assert_eq!(p.extract(&headers), Some(ctx));
    }

    #[test]
    fn test_caller_and_callee_headers() {
        let p = propagator();
        let mut headers = HeaderMap::new();
        assert_eq!(p.caller_name(&headers), None);

        headers.insert("x-uber-source", HeaderValue::from_static("billing"));
        headers.insert("x-uber-endpoint", HeaderValue::from_static("charge"));
        assert_eq!(p.caller_name(&headers), Some("billing"));
        assert_eq!(p.callee_endpoint(&headers), Some("charge"));

        let mut outbound = HeaderMap::new();
        p.inject_caller_name("orders", &mut outbound);
        assert_eq!(outbound.get("X-Uber-Source").unwrap(), "orders");
    }
}
