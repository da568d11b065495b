//! Route table lookup.
//!
//! # Responsibilities
//! - Store realized routes in registration order
//! - Look up the first route matching a request method and path
//! - Compose tables (concatenation, nesting under a prefix)
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in insertion order: first match wins, never re-sorted
//! - Explicit no-match (`None`) rather than a silent default
//! - `HEAD` is answered by the first `GET` route unless a `HEAD` route exists

use std::sync::Arc;

use axum::http::Method;

use crate::routing::handler::Handler;
use crate::routing::matcher::{PathParams, PathPattern};
use crate::routing::RouteError;

/// A single method + path + handler binding.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEntry {
    method: Method,
    pattern: PathPattern,
    handler: Handler,
}

impl RouteEntry {
    pub fn new(method: Method, pattern: PathPattern, handler: Handler) -> Self {
        Self {
            method,
            pattern,
            handler,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

/// Result of a successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub entry: &'a RouteEntry,
    pub params: PathParams,
}

/// Ordered, immutable set of routes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteTable {
    entries: Arc<Vec<RouteEntry>>,
}

impl RouteTable {
    pub(crate) fn from_entries(entries: Vec<RouteEntry>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the first entry matching `method` and `path`.
    ///
    /// `HEAD` without an explicit `HEAD` route falls back to the first
    /// matching `GET` route; the caller strips the body.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.first_match(method, path).or_else(|| {
            if *method == Method::HEAD {
                self.first_match(&Method::GET, path)
            } else {
                None
            }
        })
    }

    fn first_match(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.entries
            .iter()
            .filter(|entry| entry.method == *method)
            .find_map(|entry| {
                entry
                    .pattern
                    .matches(path)
                    .map(|params| RouteMatch { entry, params })
            })
    }

    /// Append `other`'s routes after this table's routes.
    pub fn and(&self, other: &RouteTable) -> RouteTable {
        let mut entries = Vec::with_capacity(self.len() + other.len());
        entries.extend(self.entries.iter().cloned());
        entries.extend(other.entries.iter().cloned());
        Self::from_entries(entries)
    }

    /// Re-root every route of this table under `prefix`.
    pub fn nest(&self, prefix: &str) -> Result<RouteTable, RouteError> {
        if prefix.is_empty() {
            return Err(RouteError::EmptyPrefix);
        }
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                let pattern = PathPattern::parse(&format!("{prefix}{}", entry.pattern))?;
                Ok(RouteEntry::new(entry.method.clone(), pattern, entry.handler.clone()))
            })
            .collect::<Result<Vec<_>, RouteError>>()?;
        Ok(Self::from_entries(entries))
    }
}
