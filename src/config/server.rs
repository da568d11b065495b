//! The `server { }` block: port, CORS, codecs, templates, routers, security.

use std::fmt;
use std::sync::Arc;

use crate::config::profiles::Profiled;
use crate::config::schema::{CodecKind, CodecsDsl, CorsRule, TemplateConfig};
use crate::context::{ApplicationContext, BeanError};
use crate::routing::{CoRouterBuilder, RouteTable, RouterBuilder};
use crate::security::{SecurityConfig, SecurityDsl};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

type DirectRouterFn =
    dyn Fn(&ApplicationContext, &mut RouterBuilder) -> Result<(), BeanError> + Send + Sync;
type DeferredRouterFn =
    dyn Fn(&ApplicationContext, &mut CoRouterBuilder) -> Result<(), BeanError> + Send + Sync;

/// A route source contributed to the server, realized against the context.
#[derive(Clone)]
pub enum RouterRegistration {
    /// `router { }`: direct handlers, may look up beans.
    Direct(Arc<DirectRouterFn>),
    /// `co_router { }`: suspending handlers, may look up beans.
    Deferred(Arc<DeferredRouterFn>),
    /// A table built ahead of time.
    Table(RouteTable),
}

impl fmt::Debug for RouterRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterRegistration::Direct(_) => f.write_str("Direct(..)"),
            RouterRegistration::Deferred(_) => f.write_str("Deferred(..)"),
            RouterRegistration::Table(table) => write!(f, "Table({} routes)", table.len()),
        }
    }
}

/// Realized-once server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: Profiled<u16>,
    pub host: String,
    pub cors: Vec<CorsRule>,
    pub codecs: Vec<CodecKind>,
    /// `Some` when the mustache engine is selected.
    pub template: Option<TemplateConfig>,
    pub request_timeout_secs: u64,
    pub max_body_size: usize,
    pub routers: Vec<RouterRegistration>,
    pub security: Option<SecurityConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: Profiled::new(DEFAULT_PORT),
            host: "0.0.0.0".to_string(),
            cors: Vec::new(),
            codecs: Vec::new(),
            template: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            routers: Vec::new(),
            security: None,
        }
    }
}

/// Receiver of `cors { }`.
#[derive(Debug, Default)]
pub struct CorsDsl {
    rules: Vec<CorsRule>,
}

impl CorsDsl {
    /// Allow `origin` with the default methods (GET, HEAD, POST) and any header.
    pub fn origin(&mut self, origin: impl Into<String>) -> &mut CorsRule {
        self.rules.push(CorsRule::new(origin));
        let last = self.rules.len() - 1;
        &mut self.rules[last]
    }
}

/// Receiver of `server { }`.
#[derive(Debug, Default)]
pub struct ServerDsl {
    config: ServerConfig,
}

impl ServerDsl {
    /// Default port; profile overrides from `port_for` are kept.
    pub fn port(&mut self, port: u16) -> &mut Self {
        self.config.port.set_default(port);
        self
    }

    /// Use `port` instead when `profile` is active.
    pub fn port_for(&mut self, profile: impl Into<String>, port: u16) -> &mut Self {
        let current = std::mem::take(&mut self.config.port);
        self.config.port = current.when(profile, port);
        self
    }

    pub fn host(&mut self, host: impl Into<String>) -> &mut Self {
        self.config.host = host.into();
        self
    }

    pub fn cors(&mut self, f: impl FnOnce(&mut CorsDsl)) -> &mut Self {
        let mut dsl = CorsDsl::default();
        f(&mut dsl);
        self.config.cors.extend(dsl.rules);
        self
    }

    pub fn codecs(&mut self, f: impl FnOnce(&mut CodecsDsl)) -> &mut Self {
        let mut dsl = CodecsDsl::default();
        f(&mut dsl);
        self.config.codecs.extend(dsl.codecs);
        self
    }

    /// Select the mustache engine with default prefix and suffix.
    pub fn mustache(&mut self) -> &mut Self {
        self.mustache_with(|_| {})
    }

    pub fn mustache_with(&mut self, f: impl FnOnce(&mut TemplateConfig)) -> &mut Self {
        let mut template = self.config.template.take().unwrap_or_default();
        f(&mut template);
        self.config.template = Some(template);
        self
    }

    /// Contribute direct-flavor routes, built once the context is realized.
    pub fn router<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&ApplicationContext, &mut RouterBuilder) -> Result<(), BeanError> + Send + Sync + 'static,
    {
        self.config.routers.push(RouterRegistration::Direct(Arc::new(f)));
        self
    }

    /// Contribute suspending-flavor routes, built once the context is realized.
    pub fn co_router<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&ApplicationContext, &mut CoRouterBuilder) -> Result<(), BeanError> + Send + Sync + 'static,
    {
        self.config.routers.push(RouterRegistration::Deferred(Arc::new(f)));
        self
    }

    /// Contribute a prebuilt route table.
    pub fn routes(&mut self, table: RouteTable) -> &mut Self {
        self.config.routers.push(RouterRegistration::Table(table));
        self
    }

    pub fn security(&mut self, f: impl FnOnce(&mut SecurityDsl)) -> &mut Self {
        let mut dsl = SecurityDsl::default();
        f(&mut dsl);
        self.config.security = Some(dsl.into_config());
        self
    }

    pub fn request_timeout_secs(&mut self, secs: u64) -> &mut Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_body_size(&mut self, bytes: usize) -> &mut Self {
        self.config.max_body_size = bytes;
        self
    }

    pub(crate) fn into_config(self) -> ServerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::profiles::Profiles;

    #[test]
    fn test_profile_conditional_port() {
        let mut dsl = ServerDsl::default();
        dsl.port(8080).port_for("test", 8181);
        let config = dsl.into_config();

        assert_eq!(*config.port.resolve(&Profiles::default()), 8080);
        assert_eq!(*config.port.resolve(&Profiles::parse("test")), 8181);
    }

    #[test]
    fn test_port_keeps_profile_overrides() {
        let mut dsl = ServerDsl::default();
        dsl.port_for("test", 8181).port(9000);
        let config = dsl.into_config();

        assert_eq!(*config.port.resolve(&Profiles::parse("test")), 8181);
        assert_eq!(*config.port.default_value(), 9000);
    }

    #[test]
    fn test_cors_and_codecs_accumulate() {
        let mut dsl = ServerDsl::default();
        dsl.cors(|c| {
            c.origin("example.com");
            c.origin("*").allowed_methods(["GET"]);
        })
        .codecs(|c| {
            c.string().json();
        })
        .mustache();
        let config = dsl.into_config();

        assert_eq!(config.cors.len(), 2);
        assert_eq!(config.cors[1].allowed_methods, vec!["GET"]);
        assert_eq!(config.codecs, vec![CodecKind::String, CodecKind::Json]);
        assert_eq!(config.template, Some(TemplateConfig::default()));
    }

    #[test]
    fn test_routers_keep_registration_order() {
        let mut dsl = ServerDsl::default();
        dsl.routes(RouteTable::default())
            .router(|_ctx, _r| Ok(()))
            .co_router(|_ctx, _r| Ok(()));
        let config = dsl.into_config();

        assert!(matches!(config.routers[0], RouterRegistration::Table(_)));
        assert!(matches!(config.routers[1], RouterRegistration::Direct(_)));
        assert!(matches!(config.routers[2], RouterRegistration::Deferred(_)));
    }
}
