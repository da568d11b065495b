//! Configuration schema definitions.
//!
//! Plain-data settings produced by the DSL blocks. Closures and route
//! registrations live in `server.rs` and `block.rs`; everything here derives
//! Serde traits so it can be logged or dumped as-is.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::profiles::Profiled;

/// Whether realization starts an HTTP listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationType {
    /// Beans, routes and listeners are realized but no socket is bound.
    None,
    #[default]
    Reactive,
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    /// Directive text understood by `EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Logging block: root level plus per-logger-prefix overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Root level, may differ per profile.
    pub level: Profiled<LogLevel>,

    /// Overrides keyed by logger (module path) prefix, in declaration order.
    pub loggers: Vec<(String, LogLevel)>,

    pub format: LogFormat,
}

/// One allowed CORS origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsRule {
    /// Origin, e.g. `https://example.com`, or `*`.
    pub origin: String,

    pub allowed_methods: Vec<String>,

    /// Empty means any header.
    pub allowed_headers: Vec<String>,

    pub allow_credentials: bool,

    pub max_age_secs: Option<u64>,
}

impl CorsRule {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            allowed_methods: vec!["GET".into(), "HEAD".into(), "POST".into()],
            allowed_headers: Vec::new(),
            allow_credentials: false,
            max_age_secs: None,
        }
    }

    pub fn allowed_methods<I, S>(&mut self, methods: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn allowed_headers<I, S>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn allow_credentials(&mut self, allow: bool) -> &mut Self {
        self.allow_credentials = allow;
        self
    }

    pub fn max_age(&mut self, secs: u64) -> &mut Self {
        self.max_age_secs = Some(secs);
        self
    }
}

/// Body codecs a server or client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// `text/plain` and any `text/*`.
    String,
    /// `application/json` and `+json` suffixes.
    Json,
}

/// Receiver of `codecs { }`.
#[derive(Debug, Default)]
pub struct CodecsDsl {
    pub(crate) codecs: Vec<CodecKind>,
}

impl CodecsDsl {
    pub fn string(&mut self) -> &mut Self {
        self.codecs.push(CodecKind::String);
        self
    }

    pub fn json(&mut self) -> &mut Self {
        self.codecs.push(CodecKind::Json);
        self
    }
}

/// Mustache template engine selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Directory prefix for template files.
    pub prefix: String,
    pub suffix: String,
    /// Templates registered in code, by name. Checked before disk.
    pub inline: BTreeMap<String, String>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            prefix: "templates/".to_string(),
            suffix: ".mustache".to_string(),
            inline: BTreeMap::new(),
        }
    }
}

impl TemplateConfig {
    pub fn prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.prefix = prefix.into();
        self
    }

    pub fn suffix(&mut self, suffix: impl Into<String>) -> &mut Self {
        self.suffix = suffix.into();
        self
    }

    pub fn template(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.inline.insert(name.into(), source.into());
        self
    }
}

/// `web_client { }` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebClientConfig {
    pub base_url: Option<String>,
    pub codecs: Vec<CodecKind>,
    pub timeout_secs: Option<u64>,
}

impl WebClientConfig {
    pub fn base_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn codecs(&mut self, f: impl FnOnce(&mut CodecsDsl)) -> &mut Self {
        let mut dsl = CodecsDsl::default();
        f(&mut dsl);
        self.codecs.extend(dsl.codecs);
        self
    }

    pub fn timeout_secs(&mut self, secs: u64) -> &mut Self {
        self.timeout_secs = Some(secs);
        self
    }
}
