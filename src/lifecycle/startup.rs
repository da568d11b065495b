//! Startup orchestration.
//!
//! # Responsibilities
//! - Flatten and validate configuration for the active profiles
//! - Layer property sources and bind typed properties
//! - Create every bean, then build routes and the security filter chain
//! - Fire lifecycle events in order
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready); binding lives in
//!   `Application::run`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;

use crate::config::block::ConfigurationBlock;
use crate::config::error::ConfigError;
use crate::config::loader::load_properties;
use crate::config::profiles::Profiles;
use crate::config::properties::PropertySource;
use crate::config::schema::{ApplicationType, LoggingConfig};
use crate::config::server::{RouterRegistration, ServerConfig};
use crate::config::validation::{validate_server, ValidationError};
use crate::context::{
    ApplicationContext, BeanDefinition, BeanError, ContextRefreshed, ContextStarted, EventError,
    ListenerRegistry,
};
use crate::http::codec::Codecs;
use crate::http::server::HttpServer;
use crate::http::template::TemplateEngine;
use crate::observability::logging;
use crate::routing::{CoRouterBuilder, RouteError, RouteTable, RouterBuilder};
use crate::security::{SecurityError, SecurityFilterChain};

/// Any failure between `run` and the listener accepting connections.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("application has already been realized")]
    AlreadyRealized,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bean(#[from] BeanError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("security initialization failed: {0}")]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Server(#[source] std::io::Error),
}

/// Everything an application declares, before realization.
#[derive(Debug, Clone)]
pub struct ApplicationSpec {
    pub app_type: ApplicationType,
    pub root: ConfigurationBlock,
    pub logging: LoggingConfig,
    /// Lowest-precedence properties set in code.
    pub properties: PropertySource,
    pub property_files: Vec<PathBuf>,
    pub metrics_endpoint: Option<SocketAddr>,
}

/// The outcome of realization: live beans, the final route table, server settings.
#[derive(Debug)]
pub struct Realized {
    pub app_type: ApplicationType,
    pub profiles: Profiles,
    pub context: Arc<ApplicationContext>,
    pub routes: RouteTable,
    pub server: Arc<ServerConfig>,
    pub port: u16,
    pub codecs: Arc<Codecs>,
    pub security: Option<Arc<SecurityFilterChain>>,
}

impl Realized {
    pub fn http_server(&self) -> HttpServer {
        HttpServer::new(
            self.routes.clone(),
            &self.server,
            self.codecs.clone(),
            self.security.clone(),
        )
    }

    /// The layered router, for in-process dispatch without a socket.
    pub fn router(&self) -> Router {
        self.http_server().into_router()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.port)
    }
}

/// Realize `spec` under `profiles`. Synchronous; nothing is bound, not even
/// the metrics endpoint (see `Application::run`).
pub fn realize(spec: &ApplicationSpec, profiles: Profiles) -> Result<Realized, StartupError> {
    // 1. Logging
    logging::init_logging(&spec.logging, &profiles);
    tracing::info!(
        application_type = ?spec.app_type,
        profiles = %profiles,
        "Realizing application"
    );

    // 2. Flatten enabled blocks
    let merged = spec.root.flatten(&profiles)?;
    let server = match &merged.server {
        Some((block, server)) => {
            tracing::debug!(block = %block, "Server configuration selected");
            server.clone()
        }
        None => Arc::new(ServerConfig::default()),
    };

    // 3. Semantic validation
    validate_server(&server).map_err(ConfigError::Validation)?;

    // 4. Property sources: code < files < environment
    let mut properties = spec.properties.clone();
    for path in &spec.property_files {
        properties.extend(&load_properties(path)?);
    }
    properties.extend(&PropertySource::from_env());
    let port = resolve_port(&server, &profiles, &properties)?;
    tracing::info!(
        properties = properties.len(),
        bindings = merged.property_prefixes.len(),
        "Properties resolved"
    );

    // 5. Infrastructure beans contributed by the server block
    let mut beans = merged.beans;
    let codecs = Arc::new(Codecs::new(server.codecs.clone(), server.max_body_size));
    if merged.server.is_some() {
        beans.push(BeanDefinition::instance((*codecs).clone()));
        if let Some(template) = &server.template {
            beans.push(BeanDefinition::instance(TemplateEngine::new(template.clone())));
        }
    }

    // 6. Context and singletons
    let context = Arc::new(ApplicationContext::new(
        beans,
        ListenerRegistry::new(merged.listeners),
        profiles.clone(),
        properties,
    )?);
    context.instantiate_all()?;
    tracing::info!(beans = context.bean_names().len(), "Beans created");
    context.publish(&ContextRefreshed)?;

    // 7. Routes: registrations, then route table beans
    let routes = build_routes(&server.routers, &context)?;
    tracing::info!(routes = routes.len(), "Routes realized");

    // 8. Security filter chain, before anything listens
    let security = match &server.security {
        Some(config) => Some(Arc::new(SecurityFilterChain::initialize(config, &context)?)),
        None => None,
    };

    context.publish(&ContextStarted)?;

    Ok(Realized {
        app_type: spec.app_type,
        profiles,
        context,
        routes,
        server,
        port,
        codecs,
        security,
    })
}

/// `server.port` from the property sources overrides the declared port.
fn resolve_port(
    server: &ServerConfig,
    profiles: &Profiles,
    properties: &PropertySource,
) -> Result<u16, ConfigError> {
    match properties.get("server.port") {
        Some(raw) => raw.trim().parse().map_err(|_| {
            ConfigError::Validation(vec![ValidationError::new(
                "server.port",
                format!("`{raw}` is not a valid port"),
            )])
        }),
        None => Ok(*server.port.resolve(profiles)),
    }
}

fn build_routes(
    registrations: &[RouterRegistration],
    context: &ApplicationContext,
) -> Result<RouteTable, StartupError> {
    let mut routes = RouteTable::default();
    for registration in registrations {
        let table = match registration {
            RouterRegistration::Direct(f) => {
                let mut builder = RouterBuilder::new();
                f(context, &mut builder)?;
                builder.build()?
            }
            RouterRegistration::Deferred(f) => {
                let mut builder = CoRouterBuilder::new();
                f(context, &mut builder)?;
                builder.build()?
            }
            RouterRegistration::Table(table) => table.clone(),
        };
        routes = routes.and(&table);
    }
    for table in context.get_all::<RouteTable>()? {
        routes = routes.and(&table);
    }
    Ok(routes)
}
