//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Request spans live in crate::tracer and are reported separately.
//! ```

pub mod logging;
pub mod metrics;
