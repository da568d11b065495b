//! Active profiles and profile-conditional values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The set of active profiles, in activation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profiles {
    active: Vec<String>,
}

impl Profiles {
    /// Parse a comma- or whitespace-separated profile list, e.g. `"data, webflux"`.
    pub fn parse(spec: &str) -> Self {
        let mut active: Vec<String> = Vec::new();
        for name in spec.split(|c: char| c == ',' || c.is_whitespace()) {
            if !name.is_empty() && !active.iter().any(|p| p == name) {
                active.push(name.to_string());
            }
        }
        Self { active }
    }

    pub fn contains(&self, profile: &str) -> bool {
        self.active.iter().any(|p| p == profile)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.active.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

impl fmt::Display for Profiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.active.join(","))
    }
}

/// A value with per-profile overrides, resolved once at realization.
///
/// The first override (in declaration order) whose profile is active wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profiled<T> {
    default: T,
    overrides: Vec<(String, T)>,
}

impl<T> Profiled<T> {
    pub fn new(default: T) -> Self {
        Self {
            default,
            overrides: Vec::new(),
        }
    }

    /// Use `value` when `profile` is active.
    pub fn when(mut self, profile: impl Into<String>, value: T) -> Self {
        self.overrides.push((profile.into(), value));
        self
    }

    /// Replace the default, keeping every override.
    pub fn set_default(&mut self, value: T) {
        self.default = value;
    }

    pub fn resolve(&self, profiles: &Profiles) -> &T {
        self.overrides
            .iter()
            .find(|(profile, _)| profiles.contains(profile))
            .map(|(_, value)| value)
            .unwrap_or(&self.default)
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }
}

impl<T: Default> Default for Profiled<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for Profiled<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}
