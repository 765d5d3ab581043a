//! Traced demo service.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ router ─▶ Dispatcher
//!                                               │ ensure tracer (once)
//!                                               │ open span (uber-trace-id)
//!                                               ▼
//!                                  middleware 0 ─▶ … ─▶ middleware N-1
//!                                                          │
//!                                                          ▼
//!     Client Response                               ExampleHandler ──▶ upstreams
//!     ◀────────────── close span ◀─────────────────────────┘   (client spans)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use trace_dispatch::config::{load_config, ServiceConfig};
use trace_dispatch::demo::ExampleHandler;
use trace_dispatch::observability::{logging, metrics};
use trace_dispatch::{AppBuilder, HttpServer, Shutdown, TracerInitializer};

#[derive(Parser)]
#[command(name = "trace-dispatch")]
#[command(about = "Demo service with per-request tracing middleware", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("trace-dispatch v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let tracer = Arc::new(TracerInitializer::new(
        config.tracer.clone(),
        config.propagation.clone(),
    ));
    // Build eagerly so a bad tracer config stops startup; requests reuse it.
    tracer.ensure_initialized()?;

    let app = AppBuilder::new(tracer)
        .middlewares_from_config(&config.app)
        .route(
            "/",
            ExampleHandler::new(
                config.tracer.service_name.clone(),
                config.demo.upstream_urls.clone(),
            ),
        )
        .request_timeout(Duration::from_secs(config.timeouts.request_secs))
        .build()?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, app);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
