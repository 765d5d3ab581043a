//! Outbound client instrumentation.
//!
//! Hooks are installed once, by the tracer initializer, and recorded on the
//! tracer. [`TracedClient`] consults them on every call: with the `reqwest`
//! hook installed each outbound request gets a client span that is a child
//! of the current request span, and carries the propagation headers.

use std::collections::BTreeSet;
use std::fmt;

use crate::config::ClientHooksConfig;
use crate::tracer::context::{current_span, SpanGuard};
use crate::tracer::{SpanHandle, Tracer, TracerError};

/// Hook instrumenting [`TracedClient`] requests.
pub const REQWEST_HOOK: &str = "reqwest";

/// Every hook this crate knows how to install.
pub const KNOWN_HOOKS: &[&str] = &[REQWEST_HOOK];

/// Client hooks installed on a tracer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledHooks {
    names: BTreeSet<String>,
}

impl InstalledHooks {
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Resolve the `client_hooks` setting into the set of hooks to install.
pub fn install_patches(config: &ClientHooksConfig) -> Result<InstalledHooks, TracerError> {
    let names: BTreeSet<String> = match config {
        ClientHooksConfig::Keyword(k) if k == "all" => {
            KNOWN_HOOKS.iter().map(|h| h.to_string()).collect()
        }
        ClientHooksConfig::Keyword(k) if k == "none" => BTreeSet::new(),
        ClientHooksConfig::Keyword(k) => return Err(TracerError::HooksKeyword(k.clone())),
        ClientHooksConfig::List(list) => {
            for name in list {
                if !KNOWN_HOOKS.contains(&name.as_str()) {
                    return Err(TracerError::UnknownHook(name.clone()));
                }
            }
            list.iter().cloned().collect()
        }
    };

    for name in &names {
        tracing::info!(hook = %name, "Installed client hook");
    }
    Ok(InstalledHooks { names })
}

/// Extra processing applied to every instrumented outbound request.
pub trait ClientInterceptor: Send + Sync + fmt::Debug {
    /// Name used to select this interceptor in `tracer.client_interceptors`.
    fn name(&self) -> &str;

    /// Called after propagation headers are injected, before the request is sent.
    fn process(&self, request: &mut reqwest::Request, span: &SpanHandle);
}

/// `reqwest::Client` wrapper that traces outbound calls.
#[derive(Debug, Clone)]
pub struct TracedClient {
    client: reqwest::Client,
    tracer: Tracer,
}

impl TracedClient {
    pub fn new(tracer: Tracer) -> Self {
        Self::with_client(reqwest::Client::new(), tracer)
    }

    pub fn with_client(client: reqwest::Client, tracer: Tracer) -> Self {
        Self { client, tracer }
    }

    pub async fn get(&self, url: &str) -> reqwest::Result<reqwest::Response> {
        let request = self.client.get(url).build()?;
        self.execute(request).await
    }

    pub async fn execute(
        &self,
        mut request: reqwest::Request,
    ) -> reqwest::Result<reqwest::Response> {
        if !self.tracer.hooks().contains(REQWEST_HOOK) {
            return self.client.execute(request).await;
        }

        let operation = request.method().as_str().to_string();
        let span = match current_span() {
            Some(parent) => parent.child(operation),
            None => self.tracer.start_span(operation, None),
        };
        let guard = SpanGuard::new(span.clone());

        span.set_tag("span.kind", "client");
        span.set_tag("http.method", request.method().as_str());
        span.set_tag("http.url", request.url().as_str());
        if let Some(host) = request.url().host_str() {
            span.set_tag("peer.hostname", host);
        }

        let propagator = self.tracer.propagator();
        propagator.inject(span.context(), request.headers_mut());
        propagator.inject_caller_name(self.tracer.service_name(), request.headers_mut());
        for interceptor in self.tracer.interceptors() {
            interceptor.process(&mut request, &span);
        }

        let result = self.client.execute(request).await;
        match &result {
            Ok(response) => {
                let status = response.status();
                span.set_tag("http.status_code", status.as_u16());
                if status.is_server_error() {
                    span.set_tag("error", true);
                }
            }
            Err(e) => span.record_error("reqwest::Error", &e.to_string()),
        }
        guard.close();
        result
    }
}
