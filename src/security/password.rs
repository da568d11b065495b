//! Password encoders.
//!
//! Stored passwords carry their scheme as a `{id}` prefix, e.g.
//! `{noop}secret` or `{sha256}2bb80d53...`. The delegating encoder dispatches
//! on that prefix so several schemes can coexist in one user store.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use data_encoding::HEXLOWER;
use sha2::{Digest, Sha256};

/// Encodes raw passwords and checks raw passwords against stored ones.
pub trait PasswordEncoder: Send + Sync + fmt::Debug {
    fn encode(&self, raw: &str) -> String;

    fn matches(&self, raw: &str, encoded: &str) -> bool;
}

/// Stores passwords as-is. Only for tests and samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpPasswordEncoder;

impl PasswordEncoder for NoOpPasswordEncoder {
    fn encode(&self, raw: &str) -> String {
        raw.to_string()
    }

    fn matches(&self, raw: &str, encoded: &str) -> bool {
        constant_time_eq(raw.as_bytes(), encoded.as_bytes())
    }
}

/// Lowercase hex SHA-256 digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256PasswordEncoder;

impl PasswordEncoder for Sha256PasswordEncoder {
    fn encode(&self, raw: &str) -> String {
        HEXLOWER.encode(&Sha256::digest(raw.as_bytes()))
    }

    fn matches(&self, raw: &str, encoded: &str) -> bool {
        constant_time_eq(self.encode(raw).as_bytes(), encoded.trim().as_bytes())
    }
}

/// Dispatches on the `{id}` prefix of stored passwords.
#[derive(Clone)]
pub struct DelegatingPasswordEncoder {
    encoding_id: String,
    encoders: HashMap<String, Arc<dyn PasswordEncoder>>,
}

impl DelegatingPasswordEncoder {
    /// `encoding_id` must be one of `encoders`; it is used by [`encode`](PasswordEncoder::encode).
    pub fn new(
        encoding_id: impl Into<String>,
        encoders: HashMap<String, Arc<dyn PasswordEncoder>>,
    ) -> Self {
        Self {
            encoding_id: encoding_id.into(),
            encoders,
        }
    }

    fn split(encoded: &str) -> Option<(&str, &str)> {
        let rest = encoded.strip_prefix('{')?;
        let end = rest.find('}')?;
        Some((&rest[..end], &rest[end + 1..]))
    }
}

impl Default for DelegatingPasswordEncoder {
    /// Encodes with `{sha256}`, also accepts `{noop}`.
    fn default() -> Self {
        let mut encoders: HashMap<String, Arc<dyn PasswordEncoder>> = HashMap::new();
        encoders.insert("noop".to_string(), Arc::new(NoOpPasswordEncoder));
        encoders.insert("sha256".to_string(), Arc::new(Sha256PasswordEncoder));
        Self::new("sha256", encoders)
    }
}

impl PasswordEncoder for DelegatingPasswordEncoder {
    fn encode(&self, raw: &str) -> String {
        match self.encoders.get(&self.encoding_id) {
            Some(encoder) => format!("{{{}}}{}", self.encoding_id, encoder.encode(raw)),
            None => format!("{{noop}}{raw}"),
        }
    }

    fn matches(&self, raw: &str, encoded: &str) -> bool {
        let Some((id, stored)) = Self::split(encoded) else {
            tracing::debug!("Stored password has no {{id}} prefix");
            return false;
        };
        match self.encoders.get(id) {
            Some(encoder) => encoder.matches(raw, stored),
            None => {
                tracing::debug!(id, "No password encoder registered for id");
                false
            }
        }
    }
}

impl fmt::Debug for DelegatingPasswordEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.encoders.keys().collect();
        ids.sort();
        f.debug_struct("DelegatingPasswordEncoder")
            .field("encoding_id", &self.encoding_id)
            .field("encoders", &ids)
            .finish()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
