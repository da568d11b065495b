//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::validation::ValidationError;

/// Errors raised while declaring, loading, merging or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Malformed `configuration_properties` prefix.
    #[error("invalid property prefix `{prefix}`: {reason}")]
    InvalidPropertyPrefix { prefix: String, reason: &'static str },

    #[error("profile name must not be empty")]
    EmptyProfileName,

    /// Two enabled blocks both declare a server.
    #[error("ambiguous server configuration: declared by `{first}` and by `{second}`")]
    AmbiguousServerConfig { first: String, second: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
