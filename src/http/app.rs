//! Application assembly.
//!
//! # Responsibilities
//! - Resolve configured middleware entries into ready instances
//! - Reject bad middleware and route configuration at build time
//! - Produce an axum `Router` whose routes delegate to dispatchers
//!
//! # Design Decisions
//! - Middleware arrive as instances, no-argument factories or registry names;
//!   all three are resolved in `build`, so the running chain only holds
//!   ready-to-invoke values
//! - Routing stays with axum; each route gets its own `Dispatcher`

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::routing::any;
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::config::AppConfig;
use crate::http::dispatcher::Dispatcher;
use crate::http::middleware::{BoxError, Chain, Handler, HandlerRef, Middleware, RequestLog};
use crate::http::request;
use crate::tracer::TracerInitializer;

/// Errors raised while building the application.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("middleware #{position} `{name}` is not registered")]
    UnknownMiddleware { position: usize, name: String },
    #[error("middleware #{position} `{name}` could not be constructed: {source}")]
    MiddlewareFactory {
        position: usize,
        name: String,
        #[source]
        source: BoxError,
    },
    #[error("route path `{path}` is invalid: {reason}")]
    InvalidRoute { path: String, reason: &'static str },
    #[error("route path `{0}` is registered twice")]
    DuplicateRoute(String),
    #[error("route path `{0}` conflicts with another route")]
    RouteConflict(String),
}

type MakeMiddleware = Box<dyn FnOnce() -> Result<Arc<dyn Middleware>, BoxError> + Send>;

/// A middleware as configured, before it is resolved into an instance.
pub enum MiddlewareEntry {
    /// A ready instance.
    Instance(Arc<dyn Middleware>),
    /// A no-argument constructor, run at build time.
    Factory { name: String, make: MakeMiddleware },
    /// A name looked up in the [`MiddlewareRegistry`].
    Named(String),
}

impl MiddlewareEntry {
    pub fn instance(middleware: impl Middleware) -> Self {
        MiddlewareEntry::Instance(Arc::new(middleware))
    }

    /// Construct `M` with its `Default` impl.
    pub fn of<M: Middleware + Default>() -> Self {
        MiddlewareEntry::Factory {
            name: std::any::type_name::<M>().to_string(),
            make: Box::new(|| Ok(Arc::new(M::default()) as Arc<dyn Middleware>)),
        }
    }

    pub fn factory<F>(name: impl Into<String>, make: F) -> Self
    where
        F: FnOnce() -> Result<Arc<dyn Middleware>, BoxError> + Send + 'static,
    {
        MiddlewareEntry::Factory {
            name: name.into(),
            make: Box::new(make),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        MiddlewareEntry::Named(name.into())
    }

    fn resolve(
        self,
        position: usize,
        registry: &MiddlewareRegistry,
    ) -> Result<Arc<dyn Middleware>, BuildError> {
        match self {
            MiddlewareEntry::Instance(middleware) => Ok(middleware),
            MiddlewareEntry::Factory { name, make } => {
                make().map_err(|source| BuildError::MiddlewareFactory { position, name, source })
            }
            MiddlewareEntry::Named(name) => registry
                .create(&name)
                .ok_or(BuildError::UnknownMiddleware { position, name }),
        }
    }
}

impl fmt::Debug for MiddlewareEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareEntry::Instance(m) => f.debug_tuple("Instance").field(&m.name()).finish(),
            MiddlewareEntry::Factory { name, .. } => f.debug_tuple("Factory").field(name).finish(),
            MiddlewareEntry::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

type Constructor = Arc<dyn Fn() -> Arc<dyn Middleware> + Send + Sync>;

/// Middleware constructible by name, e.g. from `app.middlewares` in the config.
#[derive(Clone)]
pub struct MiddlewareRegistry {
    constructors: HashMap<String, Constructor>,
}

impl MiddlewareRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self { constructors: HashMap::new() }
    }

    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Arc<dyn Middleware> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn create(&self, name: &str) -> Option<Arc<dyn Middleware>> {
        self.constructors.get(name).map(|make| make())
    }
}

impl Default for MiddlewareRegistry {
    /// Registry holding the built-in middleware.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("request_log", || Arc::new(RequestLog));
        registry
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}

/// Builds the request-dispatchable application.
pub struct AppBuilder {
    tracer: Arc<TracerInitializer>,
    registry: MiddlewareRegistry,
    middlewares: Vec<MiddlewareEntry>,
    routes: Vec<(String, HandlerRef)>,
    request_timeout: Option<Duration>,
}

impl AppBuilder {
    pub fn new(tracer: Arc<TracerInitializer>) -> Self {
        Self {
            tracer,
            registry: MiddlewareRegistry::default(),
            middlewares: Vec::new(),
            routes: Vec::new(),
            request_timeout: None,
        }
    }

    pub fn registry(mut self, registry: MiddlewareRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Append a middleware; entries run in the order they are added.
    pub fn middleware(mut self, entry: MiddlewareEntry) -> Self {
        self.middlewares.push(entry);
        self
    }

    /// Append a middleware looked up by name in the registry.
    pub fn middleware_named(self, name: impl Into<String>) -> Self {
        self.middleware(MiddlewareEntry::named(name))
    }

    /// Append the middleware named in `app.middlewares`.
    pub fn middlewares_from_config(mut self, config: &AppConfig) -> Self {
        self.middlewares
            .extend(config.middlewares.iter().map(MiddlewareEntry::named));
        self
    }

    pub fn route(self, path: impl Into<String>, handler: impl Handler) -> Self {
        self.route_ref(path, HandlerRef::new(handler))
    }

    pub fn route_ref(mut self, path: impl Into<String>, handler: HandlerRef) -> Self {
        self.routes.push((path.into(), handler));
        self
    }

    /// Requests still running after `timeout` are answered with 408.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[allow(deprecated)]
    pub fn build(self) -> Result<Router, BuildError> {
        let middlewares = self
            .middlewares
            .into_iter()
            .enumerate()
            .map(|(position, entry)| entry.resolve(position, &self.registry))
            .collect::<Result<Vec<_>, _>>()?;
        let chain = Chain::new(middlewares);

        let mut seen = HashSet::new();
        for (path, _) in &self.routes {
            check_route(path).map_err(|reason| BuildError::InvalidRoute {
                path: path.clone(),
                reason,
            })?;
            if !seen.insert(path.as_str()) {
                return Err(BuildError::DuplicateRoute(path.clone()));
            }
        }

        tracing::info!(
            middlewares = ?chain,
            routes = self.routes.len(),
            "Application built"
        );

        let mut router = Router::new();
        for (path, handler) in self.routes {
            let dispatcher = Arc::new(Dispatcher::new(handler, chain.clone(), self.tracer.clone()));
            let method_router = any(move |req: Request| {
                let dispatcher = dispatcher.clone();
                async move { dispatcher.dispatch(req).await }
            });
            // The router panics on paths its matcher cannot insert.
            router = panic::catch_unwind(AssertUnwindSafe(|| router.route(&path, method_router)))
                .map_err(|_| BuildError::RouteConflict(path.clone()))?;
        }

        if let Some(timeout) = self.request_timeout {
            router = router.layer(TimeoutLayer::new(timeout));
        }
        Ok(request::with_request_id(router))
    }
}

/// Check `path` against the route syntax the router accepts:
/// `/literal`, `/{capture}` and a trailing `/{*wildcard}`.
fn check_route(path: &str) -> Result<(), &'static str> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err("must start with `/`");
    };
    let segments: Vec<&str> = rest.split('/').collect();
    let last = segments.len() - 1;

    for (index, segment) in segments.iter().enumerate() {
        if segment.starts_with(':') || segment.starts_with('*') {
            return Err("captures are written `{name}` or `{*name}`");
        }
        let unescaped = segment.replace("{{", "").replace("}}", "");
        if !unescaped.contains(['{', '}']) {
            continue;
        }
        let Some(capture) = unescaped.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
            return Err("a capture must span a whole segment");
        };
        let name = match capture.strip_prefix('*') {
            Some(_) if index != last => return Err("a wildcard must be the last segment"),
            Some(name) => name,
            None => capture,
        };
        if name.is_empty() || name.contains(['{', '}', '*']) {
            return Err("capture names must be plain and non-empty");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PropagationConfig, TracerConfig};
    use crate::http::middleware::{handler_fn, MiddlewareResult, Next};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn builder() -> AppBuilder {
        let tracer = Arc::new(TracerInitializer::new(
            TracerConfig::default(),
            PropagationConfig::default(),
        ));
        AppBuilder::new(tracer)
    }

    fn handler() -> impl Handler {
        handler_fn("Noop", |_req| async { Ok::<_, BoxError>(StatusCode::OK.into_response()) })
    }

    #[test]
    fn test_unknown_middleware_name_fails_build() {
        let err = builder()
            .middleware_named("request_log")
            .middleware_named("gzip")
            .route("/", handler())
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            BuildError::UnknownMiddleware { position: 1, ref name } if name == "gzip"
        ));
    }

    #[test]
    fn test_failing_factory_fails_build() {
        let err = builder()
            .middleware(MiddlewareEntry::factory("broken", || Err("no config".into())))
            .route("/", handler())
            .build()
            .unwrap_err();

        assert!(matches!(err, BuildError::MiddlewareFactory { position: 0, .. }));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_route_validation() {
        let err = builder().route("nope", handler()).build().unwrap_err();
        assert!(matches!(err, BuildError::InvalidRoute { .. }));

        let err = builder()
            .route("/a", handler())
            .route("/a", handler())
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateRoute(_)));
    }

    #[test]
    fn test_route_syntax_is_checked_at_build() {
        for path in ["/:id", "/{", "/*rest", "/a/}", "/{}", "/{*rest}/more", "/x{id}"] {
            let err = builder().route(path, handler()).build().unwrap_err();
            assert!(
                matches!(err, BuildError::InvalidRoute { path: ref p, .. } if p == path),
                "{path} accepted"
            );
        }

        for path in ["/", "/users/{id}", "/files/{*rest}", "/{{literal}}", "/trailing/"] {
            assert!(check_route(path).is_ok(), "{path} rejected");
        }
    }

    #[test]
    fn test_conflicting_captures_fail_build() {
        let err = builder()
            .route("/users/{id}", handler())
            .route("/users/{name}", handler())
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::RouteConflict(ref p) if p == "/users/{name}"));
    }

    static CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);
    static INVOKED: AtomicUsize = AtomicUsize::new(0);

    struct Counted;

    impl Default for Counted {
        fn default() -> Self {
            CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
            Counted
        }
    }

    #[async_trait]
    impl Middleware for Counted {
        async fn invoke(&self, req: Request, _h: &HandlerRef, next: Next) -> MiddlewareResult {
            INVOKED.fetch_add(1, Ordering::SeqCst);
            next.run(req).await
        }
    }

    #[tokio::test]
    async fn test_type_entry_is_constructed_once_at_build() {
        let app = builder()
            .middleware(MiddlewareEntry::of::<Counted>())
            .route("/", handler())
            .build()
            .unwrap();
        assert_eq!(CONSTRUCTED.load(Ordering::SeqCst), 1);

        for _ in 0..3 {
            let request = axum::http::Request::builder()
                .uri("/")
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(CONSTRUCTED.load(Ordering::SeqCst), 1);
        assert_eq!(INVOKED.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_registry() {
        let mut registry = MiddlewareRegistry::empty();
        assert!(!registry.contains("request_log"));
        registry.register("log", || Arc::new(RequestLog));
        assert!(registry.create("log").is_some());
        assert!(MiddlewareRegistry::default().contains("request_log"));
    }
}
