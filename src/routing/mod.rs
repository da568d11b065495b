//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Declaration (startup):
//!     router { GET("/") ... "/api".nest { ... } }
//!     → builder.rs (prefix scoping, pattern validation)
//!     → matcher.rs (compile path patterns)
//!     → RouteTable (immutable, insertion-ordered)
//!
//! Dispatch (per request):
//!     method + path
//!     → router.rs (first matching entry)
//!     → handler.rs (direct call or awaited future)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - First match wins, in registration order
//! - Nest prefixes are concatenated textually
//! - Builder errors are deferred to `build()` so the DSL reads linearly

pub mod builder;
pub mod handler;
pub mod matcher;
pub mod router;

pub use builder::{co_router, router, CoRouterBuilder, RouterBuilder};
pub use handler::Handler;
pub use matcher::{PathParams, PathPattern};
pub use router::{RouteEntry, RouteMatch, RouteTable};

/// Malformed route registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("route path must not be empty")]
    EmptyPath,

    #[error("nest prefix must not be empty")]
    EmptyPrefix,

    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("path variable `{name}` appears twice in `{pattern}`")]
    DuplicateVariable { pattern: String, name: String },
}
