//! Path pattern matching.
//!
//! # Responsibilities
//! - Parse route patterns (`/article/{id}`, `/static/{*path}`)
//! - Match a request path segment by segment
//! - Extract path variables for the handler
//!
//! # Design Decisions
//! - Literal segments are case-sensitive
//! - `{name}` captures exactly one segment, `{*name}` captures the rest
//! - A pattern without a trailing slash also matches the path with one
//! - No regex to keep matching O(segments)

use std::collections::HashMap;
use std::fmt;

use crate::routing::RouteError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
    CatchAll(String),
}

/// A compiled route path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern such as `/api/{id}`.
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        if raw.is_empty() {
            return Err(RouteError::EmptyPath);
        }

        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();
        let parts: Vec<&str> = raw.split('/').collect();
        let last = parts.len() - 1;

        for (i, part) in parts.iter().enumerate() {
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(inner) => {
                    let (name, catch_all) = match inner.strip_prefix('*') {
                        Some(name) => (name, true),
                        None => (inner, false),
                    };
                    if name.is_empty() || name.contains(['{', '}', '*']) {
                        return Err(RouteError::InvalidPattern {
                            pattern: raw.to_string(),
                            reason: format!("malformed variable `{part}`"),
                        });
                    }
                    if catch_all && i != last {
                        return Err(RouteError::InvalidPattern {
                            pattern: raw.to_string(),
                            reason: "catch-all variable must be the last segment".to_string(),
                        });
                    }
                    if names.contains(&name) {
                        return Err(RouteError::DuplicateVariable {
                            pattern: raw.to_string(),
                            name: name.to_string(),
                        });
                    }
                    names.push(name);
                    if catch_all {
                        Segment::CatchAll(name.to_string())
                    } else {
                        Segment::Variable(name.to_string())
                    }
                }
                None if part.contains(['{', '}']) => {
                    return Err(RouteError::InvalidPattern {
                        pattern: raw.to_string(),
                        reason: format!("unbalanced braces in `{part}`"),
                    });
                }
                None => Segment::Literal(part.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The pattern text as registered (prefixes included).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a request path, returning the captured variables.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let parts: Vec<&str> = path.split('/').collect();
        if let Some(params) = self.match_parts(&parts) {
            return Some(params);
        }

        // `/api` also serves `/api/`
        match parts.split_last() {
            Some((&"", rest)) if parts.len() > 2 && !self.ends_with_slash() => self.match_parts(rest),
            _ => None,
        }
    }

    fn ends_with_slash(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Literal(s)) if s.is_empty())
    }

    fn match_parts(&self, parts: &[&str]) -> Option<PathParams> {
        let mut params = PathParams::default();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::CatchAll(name) => {
                    let rest = parts.get(i..).unwrap_or_default().join("/");
                    params.insert(name, rest);
                    return Some(params);
                }
                Segment::Literal(literal) => {
                    if parts.get(i) != Some(&literal.as_str()) {
                        return None;
                    }
                }
                Segment::Variable(name) => match parts.get(i) {
                    Some(value) if !value.is_empty() => params.insert(name, (*value).to_string()),
                    _ => return None,
                },
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Path variables captured by a matched route.
///
/// Inserted into the request extensions before the handler runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    values: HashMap<String, String>,
}

impl PathParams {
    fn insert(&mut self, name: &str, value: String) {
        self.values.insert(name.to_string(), value);
    }

    /// Get a captured variable by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
