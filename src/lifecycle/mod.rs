//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Logging → Flatten config → Validate → Properties → Beans
//!     → ContextRefreshed → Routes → Security → ContextStarted
//!     → Metrics endpoint (Application::run, when declared)
//!     → Bind listener (Application::run, reactive only)
//!
//! Shutdown (shutdown.rs):
//!     stop() or signal → Stop accepting → Drain connections → ContextClosed
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then beans, then listeners
//! - No listener is bound unless every phase succeeded
//! - An application is realized at most once

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{RunningApplication, Shutdown};
pub use startup::{ApplicationSpec, Realized, StartupError};
