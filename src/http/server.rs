//! HTTP server setup.
//!
//! # Responsibilities
//! - Serve the application router on a bound listener
//! - Provide connection info to handlers (peer address tags)
//! - Shut down gracefully on Ctrl+C or a `Shutdown` trigger

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::ServiceConfig;

/// HTTP server for the traced application.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a server for an already built application router.
    pub fn new(config: ServiceConfig, router: Router) -> Self {
        Self { router, config }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service = %self.config.tracer.service_name,
            request_timeout_secs = self.config.timeouts.request_secs,
            "HTTP server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Wait for Ctrl+C or an explicit shutdown trigger.
async fn shutdown_signal(mut shutdown: broadcast::Receiver<()>) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                // Fall back to the explicit trigger only.
                let _ = shutdown.recv().await;
            }
        }
        _ = shutdown.recv() => {}
    }
    tracing::info!("Shutdown signal received");
}
