//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber from the application's logging block
//! - Translate root level and logger-prefix overrides into filter directives
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, compact format for development
//! - `RUST_LOG` wins over the DSL when set
//! - Initialization is idempotent: the first subscriber in a process stays

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::profiles::Profiles;
use crate::config::schema::{LogFormat, LoggingConfig};

/// Filter directives for the active profiles, e.g. `info,tower_http=debug`.
pub fn directives(config: &LoggingConfig, profiles: &Profiles) -> String {
    let mut directives = vec![config.level.resolve(profiles).as_directive().to_string()];
    directives.extend(
        config
            .loggers
            .iter()
            .map(|(prefix, level)| format!("{prefix}={}", level.as_directive())),
    );
    directives.join(",")
}

/// Install the global subscriber. Returns `false` when one was already set.
pub fn init_logging(config: &LoggingConfig, profiles: &Profiles) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(config, profiles)));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()
            .is_ok(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::debug!(profiles = %profiles, "Logging initialized");
    }
    installed
}
