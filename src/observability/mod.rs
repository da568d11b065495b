//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, filter from the logging block)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (compact or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging for machine parsing
//! - Request ID flows through spans via the trace layer
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
