//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Logging → Tracer → Build app → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C or trigger → Stop accepting → Drain in-flight requests → Exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The tracer is built before the listener accepts traffic

pub mod shutdown;

pub use shutdown::Shutdown;
