//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation of the merged server block (serde and the DSL
//!   handle syntax)
//! - Validate value ranges (timeouts > 0, body limit > 0)
//! - Detect conflicting entries (duplicate codecs)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before any bean is constructed

use std::fmt;

use crate::config::server::ServerConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a server block.
pub fn validate_server(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (i, rule) in config.cors.iter().enumerate() {
        if rule.origin.trim().is_empty() {
            errors.push(ValidationError::new(format!("cors[{i}].origin"), "must not be empty"));
        }
        if rule.allowed_methods.iter().any(|m| axum::http::Method::from_bytes(m.as_bytes()).is_err()) {
            errors.push(ValidationError::new(
                format!("cors[{i}].allowed_methods"),
                "contains an invalid HTTP method",
            ));
        }
    }

    for (i, codec) in config.codecs.iter().enumerate() {
        if config.codecs[..i].contains(codec) {
            errors.push(ValidationError::new(
                "codecs",
                format!("{codec:?} codec registered more than once"),
            ));
        }
    }

    if config.request_timeout_secs == 0 {
        errors.push(ValidationError::new("request_timeout_secs", "must be greater than 0"));
    }

    if config.max_body_size == 0 {
        errors.push(ValidationError::new("max_body_size", "must be greater than 0"));
    }

    if let Some(template) = &config.template {
        if template.prefix.is_empty() {
            errors.push(ValidationError::new("template.prefix", "must not be empty"));
        }
        if template.suffix.is_empty() {
            errors.push(ValidationError::new("template.suffix", "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CodecKind, CorsRule};

    #[test]
    fn test_default_server_is_valid() {
        assert!(validate_server(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_all_errors() {
        let mut config = ServerConfig::default();
        config.cors.push(CorsRule::new(""));
        config.codecs = vec![CodecKind::Json, CodecKind::String, CodecKind::Json];
        config.request_timeout_secs = 0;
        config.max_body_size = 0;

        let errors = validate_server(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["cors[0].origin", "codecs", "request_timeout_secs", "max_body_size"]
        );
    }
}
