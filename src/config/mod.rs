//! Configuration composition subsystem.
//!
//! # Data Flow
//! ```text
//! Declaration (synchronous, one thread):
//!     configuration { beans / listener / configuration_properties / server }
//!     → block.rs (ConfigurationBlock, immutable Arc snapshot)
//!     → enable(block) composes by reference
//!
//! Realization (run):
//!     active profiles (profiles.rs)
//!     → block.rs flatten (profile blocks gated, server conflicts rejected)
//!     → validation.rs (semantic checks on the merged server)
//!     → properties.rs: DSL defaults < loader.rs (TOML files) < environment
//!     → typed bindings resolved as beans
//! ```
//!
//! # Design Decisions
//! - Config is immutable once built; nothing is reloaded at runtime
//! - All server settings have defaults so minimal blocks stay minimal
//! - Profile-conditional values are resolved once, at run time
//! - Validation separates syntactic (DSL, serde) from semantic checks

pub mod block;
pub mod error;
pub mod loader;
pub mod profiles;
pub mod properties;
pub mod schema;
pub mod server;
pub mod validation;

pub use block::{configuration, ConfigurationBlock, ConfigurationDsl, MergedConfiguration};
pub use error::ConfigError;
pub use profiles::{Profiled, Profiles};
pub use properties::{PropertyError, PropertySource};
pub use schema::{
    ApplicationType, CodecKind, CorsRule, LogFormat, LogLevel, LoggingConfig, TemplateConfig,
    WebClientConfig,
};
pub use server::{CorsDsl, RouterRegistration, ServerConfig, ServerDsl};
pub use validation::ValidationError;
