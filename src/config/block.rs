//! Configuration blocks and the composer that builds them.
//!
//! # Responsibilities
//! - Record beans, listeners, property bindings and server settings in
//!   declaration order
//! - Compose blocks by reference with `enable`
//! - Flatten enabled and profile-conditional blocks into one merged
//!   configuration at realization
//!
//! # Design Decisions
//! - A block is an immutable `Arc` snapshot; enabling it twice shares it
//! - Build-time errors (bad prefix, empty profile name) fail `configuration()`
//! - Merge conflicts surface only when flattening, never at `enable` time

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::error::ConfigError;
use crate::config::profiles::Profiles;
use crate::config::schema::WebClientConfig;
use crate::config::server::{ServerConfig, ServerDsl};
use crate::context::{
    ApplicationContext, ApplicationEvent, BeanDefinition, BeansDsl, BoxError, ListenerRegistration,
};
use crate::http::client::WebClient;

#[derive(Debug)]
enum Part {
    Bean(BeanDefinition),
    Listener(ListenerRegistration),
    Properties {
        prefix: String,
        definition: BeanDefinition,
    },
    Server(Arc<ServerConfig>),
    Enable(ConfigurationBlock),
    Profile {
        profile: String,
        block: ConfigurationBlock,
    },
}

/// A named, immutable unit of configuration.
#[derive(Debug, Clone)]
pub struct ConfigurationBlock {
    name: String,
    parts: Arc<Vec<Part>>,
}

/// Everything the enabled blocks contribute under the active profiles.
#[derive(Debug, Default)]
pub struct MergedConfiguration {
    pub beans: Vec<BeanDefinition>,
    pub listeners: Vec<ListenerRegistration>,
    pub property_prefixes: Vec<String>,
    /// Declaring block name and its server settings.
    pub server: Option<(String, Arc<ServerConfig>)>,
}

impl ConfigurationBlock {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Merge this block, in declaration order, into `merged`.
    pub fn flatten_into(
        &self,
        profiles: &Profiles,
        merged: &mut MergedConfiguration,
    ) -> Result<(), ConfigError> {
        for part in self.parts.iter() {
            match part {
                Part::Bean(definition) => merged.beans.push(definition.clone()),
                Part::Listener(listener) => merged.listeners.push(listener.clone()),
                Part::Properties { prefix, definition } => {
                    merged.property_prefixes.push(prefix.clone());
                    merged.beans.push(definition.clone());
                }
                Part::Server(config) => {
                    if let Some((first, _)) = &merged.server {
                        return Err(ConfigError::AmbiguousServerConfig {
                            first: first.clone(),
                            second: self.name.clone(),
                        });
                    }
                    merged.server = Some((self.name.clone(), config.clone()));
                }
                Part::Enable(block) => block.flatten_into(profiles, merged)?,
                Part::Profile { profile, block } => {
                    if profiles.contains(profile) {
                        tracing::debug!(block = %self.name, profile = %profile, "Profile block active");
                        block.flatten_into(profiles, merged)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Convenience wrapper around [`flatten_into`](Self::flatten_into).
    pub fn flatten(&self, profiles: &Profiles) -> Result<MergedConfiguration, ConfigError> {
        let mut merged = MergedConfiguration::default();
        self.flatten_into(profiles, &mut merged)?;
        Ok(merged)
    }
}

/// Receiver of `configuration { }`.
#[derive(Debug)]
pub struct ConfigurationDsl {
    name: String,
    parts: Vec<Part>,
    error: Option<ConfigError>,
}

impl ConfigurationDsl {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parts: Vec::new(),
            error: None,
        }
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    pub fn beans(&mut self, f: impl FnOnce(&mut BeansDsl)) -> &mut Self {
        let mut beans = BeansDsl::new();
        f(&mut beans);
        self.parts
            .extend(beans.into_definitions().into_iter().map(Part::Bean));
        self
    }

    /// Register a callback for events of type `E`.
    pub fn listener<E, F>(&mut self, f: F) -> &mut Self
    where
        E: ApplicationEvent,
        F: Fn(&E, &ApplicationContext) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.parts.push(Part::Listener(ListenerRegistration::new(f)));
        self
    }

    /// Bind the properties under `prefix` to a bean of type `T`.
    pub fn configuration_properties<T>(&mut self, prefix: &str) -> &mut Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        if let Err(reason) = check_prefix(prefix) {
            self.fail(ConfigError::InvalidPropertyPrefix {
                prefix: prefix.to_string(),
                reason,
            });
            return self;
        }
        let bound = prefix.to_string();
        let definition = BeanDefinition::new(move |ctx: &ApplicationContext| {
            ctx.properties().bind::<T>(&bound).map_err(BoxError::from)
        });
        self.parts.push(Part::Properties {
            prefix: prefix.to_string(),
            definition,
        });
        self
    }

    pub fn server(&mut self, f: impl FnOnce(&mut ServerDsl)) -> &mut Self {
        let mut dsl = ServerDsl::default();
        f(&mut dsl);
        self.parts.push(Part::Server(Arc::new(dsl.into_config())));
        self
    }

    /// Register a [`WebClient`] bean.
    pub fn web_client(&mut self, f: impl FnOnce(&mut WebClientConfig)) -> &mut Self {
        let mut config = WebClientConfig::default();
        f(&mut config);
        let definition = BeanDefinition::new(move |_ctx: &ApplicationContext| {
            WebClient::new(&config).map_err(BoxError::from)
        });
        self.parts.push(Part::Bean(definition));
        self
    }

    /// Merge a previously built block into this one.
    pub fn enable(&mut self, block: &ConfigurationBlock) -> &mut Self {
        self.parts.push(Part::Enable(block.clone()));
        self
    }

    /// Contribute a nested block only when `profile` is active.
    pub fn profile(&mut self, profile: &str, f: impl FnOnce(&mut ConfigurationDsl)) -> &mut Self {
        if profile.trim().is_empty() {
            self.fail(ConfigError::EmptyProfileName);
            return self;
        }
        let mut nested = ConfigurationDsl::new(format!("{}[{}]", self.name, profile));
        f(&mut nested);
        match nested.build() {
            Ok(block) => self.parts.push(Part::Profile {
                profile: profile.to_string(),
                block,
            }),
            Err(e) => self.fail(e),
        }
        self
    }

    fn fail(&mut self, error: ConfigError) {
        tracing::debug!(block = %self.name, error = %error, "Rejected configuration entry");
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    pub(crate) fn build(self) -> Result<ConfigurationBlock, ConfigError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(ConfigurationBlock {
            name: self.name,
            parts: Arc::new(self.parts),
        })
    }
}

/// Build a detached configuration block.
///
/// ```ignore
/// let data = configuration(|c| {
///     c.name("data").beans(|b| {
///         b.instance(UserRepository::default());
///     });
/// })?;
/// ```
pub fn configuration(f: impl FnOnce(&mut ConfigurationDsl)) -> Result<ConfigurationBlock, ConfigError> {
    let mut dsl = ConfigurationDsl::new("configuration");
    f(&mut dsl);
    dsl.build()
}

/// Prefixes are dot-separated, non-empty segments of lowercase
/// alphanumerics, `-` or `_`.
fn check_prefix(prefix: &str) -> Result<(), &'static str> {
    if prefix.is_empty() {
        return Err("must not be empty");
    }
    for segment in prefix.split('.') {
        if segment.is_empty() {
            return Err("contains an empty segment");
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err("only lowercase letters, digits, '-' and '_' are allowed");
        }
    }
    Ok(())
}
