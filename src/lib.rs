//! Declarative route tables, composable configuration blocks and a small
//! dependency-injection container on top of Axum.

pub mod application;
pub mod config;
pub mod context;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use application::{application, Application, ApplicationDsl, LoggingDsl};
pub use config::{configuration, ApplicationType, ConfigError, ConfigurationBlock, LogLevel};
pub use context::{ApplicationContext, BeanError, BoxError};
pub use http::{RequestExt, ServerResponse};
pub use lifecycle::{RunningApplication, StartupError};
pub use routing::{co_router, router, Handler, RouteTable};
