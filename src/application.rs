//! Root application: declaration and realization.
//!
//! ```ignore
//! let app = application(ApplicationType::Reactive, |app| {
//!     app.logging(|l| {
//!         l.level(LogLevel::Info).logger("tower_http", LogLevel::Debug);
//!     });
//!     app.enable(&data_config).enable(&web_config);
//! })?;
//! let running = app.run("dev").await?;
//! running.wait().await?;
//! ```

use std::net::SocketAddr;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::TcpListener;

use crate::config::block::ConfigurationDsl;
use crate::config::error::ConfigError;
use crate::config::profiles::Profiles;
use crate::config::properties::PropertySource;
use crate::config::schema::{ApplicationType, LogFormat, LogLevel, LoggingConfig};
use crate::lifecycle::shutdown::{RunningApplication, Shutdown};
use crate::lifecycle::startup::{realize, ApplicationSpec, Realized, StartupError};
use crate::observability::metrics;

/// Receiver of the `logging { }` block.
#[derive(Debug, Default)]
pub struct LoggingDsl {
    config: LoggingConfig,
}

impl LoggingDsl {
    /// Root level; profile overrides from `level_for` are kept.
    pub fn level(&mut self, level: LogLevel) -> &mut Self {
        self.config.level.set_default(level);
        self
    }

    /// Root level to use when `profile` is active.
    pub fn level_for(&mut self, profile: impl Into<String>, level: LogLevel) -> &mut Self {
        let current = std::mem::take(&mut self.config.level);
        self.config.level = current.when(profile, level);
        self
    }

    /// Level for loggers whose target starts with `prefix`.
    pub fn logger(&mut self, prefix: impl Into<String>, level: LogLevel) -> &mut Self {
        self.config.loggers.push((prefix.into(), level));
        self
    }

    pub fn json(&mut self) -> &mut Self {
        self.config.format = LogFormat::Json;
        self
    }
}

/// Receiver of `application { }`: a configuration block plus global settings.
#[derive(Debug)]
pub struct ApplicationDsl {
    configuration: ConfigurationDsl,
    logging: LoggingConfig,
    properties: PropertySource,
    property_files: Vec<PathBuf>,
    metrics_endpoint: Option<SocketAddr>,
}

impl ApplicationDsl {
    pub fn logging(&mut self, f: impl FnOnce(&mut LoggingDsl)) -> &mut Self {
        let mut dsl = LoggingDsl {
            config: std::mem::take(&mut self.logging),
        };
        f(&mut dsl);
        self.logging = dsl.config;
        self
    }

    /// Default value for a property; files and the environment override it.
    pub fn property(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.properties.set(key, value);
        self
    }

    /// TOML file loaded at realization, over code defaults and under the environment.
    pub fn property_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.property_files.push(path.into());
        self
    }

    /// Expose Prometheus metrics on `addr` once the application runs.
    pub fn metrics_endpoint(&mut self, addr: SocketAddr) -> &mut Self {
        self.metrics_endpoint = Some(addr);
        self
    }
}

impl Deref for ApplicationDsl {
    type Target = ConfigurationDsl;

    fn deref(&self) -> &Self::Target {
        &self.configuration
    }
}

impl DerefMut for ApplicationDsl {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.configuration
    }
}

/// A declared application. Realized at most once.
#[derive(Debug)]
pub struct Application {
    spec: ApplicationSpec,
    realized: AtomicBool,
}

/// Build the root application configuration.
pub fn application(
    app_type: ApplicationType,
    f: impl FnOnce(&mut ApplicationDsl),
) -> Result<Application, ConfigError> {
    let mut dsl = ApplicationDsl {
        configuration: ConfigurationDsl::new("application"),
        logging: LoggingConfig::default(),
        properties: PropertySource::new(),
        property_files: Vec::new(),
        metrics_endpoint: None,
    };
    f(&mut dsl);

    Ok(Application {
        spec: ApplicationSpec {
            app_type,
            root: dsl.configuration.build()?,
            logging: dsl.logging,
            properties: dsl.properties,
            property_files: dsl.property_files,
            metrics_endpoint: dsl.metrics_endpoint,
        },
        realized: AtomicBool::new(false),
    })
}

impl Application {
    pub fn app_type(&self) -> ApplicationType {
        self.spec.app_type
    }

    pub fn is_realized(&self) -> bool {
        self.realized.load(Ordering::SeqCst)
    }

    /// Realize beans, routes and security without binding.
    ///
    /// `profiles` is a comma- or space-separated list. A second call, or a
    /// call after [`run`](Self::run), fails with
    /// [`StartupError::AlreadyRealized`], even when the first one failed.
    pub fn realize(&self, profiles: &str) -> Result<Realized, StartupError> {
        if self.realized.swap(true, Ordering::SeqCst) {
            return Err(StartupError::AlreadyRealized);
        }
        realize(&self.spec, Profiles::parse(profiles))
    }

    /// Realize, then start the metrics endpoint (when declared) and the HTTP
    /// listener (when the type requires one). Nothing listens if realization fails.
    pub async fn run(&self, profiles: &str) -> Result<RunningApplication, StartupError> {
        let realized = self.realize(profiles)?;
        if let Some(addr) = self.spec.metrics_endpoint {
            metrics::init_metrics(addr)?;
            tracing::info!(address = %addr, "Metrics endpoint listening");
        }
        let shutdown = Shutdown::new();

        if realized.app_type == ApplicationType::None {
            tracing::info!("Application realized without HTTP listener");
            return Ok(RunningApplication::new(
                realized.context,
                realized.routes,
                None,
                shutdown,
                None,
            ));
        }

        let addr = realized.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| StartupError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| StartupError::Bind { addr, source })?;
        tracing::info!(address = %local_addr, "Listening for connections");

        let server = realized.http_server();
        let handle = tokio::spawn(server.run(listener, shutdown.signalled()));

        Ok(RunningApplication::new(
            realized.context,
            realized.routes,
            Some(local_addr),
            shutdown,
            Some(handle),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextStarted;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_realize_twice_fails() {
        let app = application(ApplicationType::None, |app| {
            app.beans(|b| {
                b.instance(42u32);
            });
        })
        .unwrap();

        let realized = app.realize("").unwrap();
        assert_eq!(*realized.context.get::<u32>().unwrap(), 42);
        assert!(matches!(app.realize(""), Err(StartupError::AlreadyRealized)));
    }

    #[test]
    fn test_failed_realization_consumes_application() {
        let app = application(ApplicationType::None, |app| {
            app.beans(|b| {
                b.bean::<u8, _>(|_ctx| Err("boom".into()));
            });
        })
        .unwrap();

        assert!(matches!(app.realize(""), Err(StartupError::Bean(_))));
        assert!(app.is_realized());
        assert!(matches!(app.realize(""), Err(StartupError::AlreadyRealized)));
    }

    #[tokio::test]
    async fn test_failed_startup_leaves_metrics_port_closed() {
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let app = application(ApplicationType::None, move |app| {
            app.metrics_endpoint(addr);
            app.beans(|b| {
                b.bean::<u8, _>(|_ctx| Err("boom".into()));
            });
        })
        .unwrap();

        assert!(matches!(app.run("").await, Err(StartupError::Bean(_))));
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[test]
    fn test_root_level_keeps_profile_overrides() {
        let mut dsl = LoggingDsl::default();
        dsl.level_for("dev", LogLevel::Debug).level(LogLevel::Warn);

        assert_eq!(*dsl.config.level.resolve(&Profiles::parse("dev")), LogLevel::Debug);
        assert_eq!(*dsl.config.level.resolve(&Profiles::default()), LogLevel::Warn);
    }

    #[test]
    fn test_properties_layering() {
        #[derive(Debug, serde::Deserialize)]
        struct Greeting {
            text: String,
            times: u8,
        }

        let app = application(ApplicationType::None, |app| {
            app.property("wwtestgreeting.text", "hello")
                .property("wwtestgreeting.times", "2");
            app.configuration_properties::<Greeting>("wwtestgreeting");
        })
        .unwrap();

        let realized = app.realize("").unwrap();
        let greeting = realized.context.get::<Greeting>().unwrap();
        assert_eq!(greeting.text, "hello");
        assert_eq!(greeting.times, 2);
    }

    #[test]
    fn test_started_listener_runs_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let app = application(ApplicationType::None, move |app| {
            app.listener(move |_e: &ContextStarted, _ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        })
        .unwrap();

        app.realize("").unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
