//! Declarative route table builders.
//!
//! Two flavors share one collector: [`RouterBuilder`] binds direct handlers,
//! [`CoRouterBuilder`] binds handlers returning futures. Both produce the same
//! [`RouteTable`]; only the calling convention recorded on each entry differs.

use std::future::Future;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::IntoResponse;

use crate::routing::handler::Handler;
use crate::routing::matcher::PathPattern;
use crate::routing::router::{RouteEntry, RouteTable};
use crate::routing::RouteError;

/// Scoped state shared by both builder flavors.
#[derive(Debug, Default)]
struct RouteCollector {
    prefix: String,
    entries: Vec<RouteEntry>,
    error: Option<RouteError>,
}

impl RouteCollector {
    fn add(&mut self, method: Method, path: &str, handler: Handler) {
        if self.error.is_some() {
            return;
        }
        if path.is_empty() {
            self.fail(RouteError::EmptyPath);
            return;
        }
        match PathPattern::parse(&format!("{}{}", self.prefix, path)) {
            Ok(pattern) => self.entries.push(RouteEntry::new(method, pattern, handler)),
            Err(e) => self.fail(e),
        }
    }

    fn include(&mut self, table: &RouteTable) {
        if self.error.is_some() {
            return;
        }
        if self.prefix.is_empty() {
            self.entries.extend(table.entries().iter().cloned());
            return;
        }
        match table.nest(&self.prefix) {
            Ok(nested) => self.entries.extend(nested.entries().iter().cloned()),
            Err(e) => self.fail(e),
        }
    }

    /// Returns the previous prefix, to be restored when the scope closes.
    fn enter(&mut self, prefix: &str) -> Option<String> {
        if prefix.is_empty() {
            self.fail(RouteError::EmptyPrefix);
            return None;
        }
        let outer = self.prefix.clone();
        self.prefix.push_str(prefix);
        Some(outer)
    }

    fn fail(&mut self, error: RouteError) {
        tracing::debug!(error = %error, prefix = %self.prefix, "Rejected route registration");
        self.error.get_or_insert(error);
    }

    fn build(&self) -> Result<RouteTable, RouteError> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(RouteTable::from_entries(self.entries.clone())),
        }
    }
}

macro_rules! direct_verbs {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            #[doc = concat!("Register a `", stringify!($method), "` route.")]
            pub fn $name<F, R>(&mut self, path: &str, handler: F) -> &mut Self
            where
                F: Fn(Request<Body>) -> R + Send + Sync + 'static,
                R: IntoResponse,
            {
                self.collector.add(Method::$method, path, Handler::direct(handler));
                self
            }
        )*
    };
}

macro_rules! deferred_verbs {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            #[doc = concat!("Register a suspending `", stringify!($method), "` route.")]
            pub fn $name<F, Fut, R>(&mut self, path: &str, handler: F) -> &mut Self
            where
                F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
                Fut: Future<Output = R> + Send + 'static,
                R: IntoResponse + 'static,
            {
                self.collector.add(Method::$method, path, Handler::deferred(handler));
                self
            }
        )*
    };
}

/// Builder for routes whose handlers complete synchronously.
#[derive(Debug, Default)]
pub struct RouterBuilder {
    collector: RouteCollector,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    direct_verbs! {
        get => GET,
        post => POST,
        put => PUT,
        delete => DELETE,
        patch => PATCH,
        head => HEAD,
        options => OPTIONS,
    }

    /// Register a route for an arbitrary method.
    pub fn route<F, R>(&mut self, method: Method, path: &str, handler: F) -> &mut Self
    where
        F: Fn(Request<Body>) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.collector.add(method, path, Handler::direct(handler));
        self
    }

    /// Register a pre-built handler of either convention.
    pub fn add(&mut self, method: Method, path: &str, handler: Handler) -> &mut Self {
        self.collector.add(method, path, handler);
        self
    }

    /// Register every route in `build` with `prefix` prepended.
    pub fn nest(&mut self, prefix: &str, build: impl FnOnce(&mut Self)) -> &mut Self {
        if let Some(outer) = self.collector.enter(prefix) {
            build(self);
            self.collector.prefix = outer;
        }
        self
    }

    /// Append an existing table at the current prefix.
    pub fn include(&mut self, table: &RouteTable) -> &mut Self {
        self.collector.include(table);
        self
    }

    /// Snapshot the registered routes.
    pub fn build(&self) -> Result<RouteTable, RouteError> {
        self.collector.build()
    }
}

/// Builder for routes whose handlers suspend until a future resolves.
#[derive(Debug, Default)]
pub struct CoRouterBuilder {
    collector: RouteCollector,
}

impl CoRouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    deferred_verbs! {
        get => GET,
        post => POST,
        put => PUT,
        delete => DELETE,
        patch => PATCH,
        head => HEAD,
        options => OPTIONS,
    }

    /// Register a route for an arbitrary method.
    pub fn route<F, Fut, R>(&mut self, method: Method, path: &str, handler: F) -> &mut Self
    where
        F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        self.collector.add(method, path, Handler::deferred(handler));
        self
    }

    /// Register a pre-built handler of either convention.
    pub fn add(&mut self, method: Method, path: &str, handler: Handler) -> &mut Self {
        self.collector.add(method, path, handler);
        self
    }

    /// Register every route in `build` with `prefix` prepended.
    pub fn nest(&mut self, prefix: &str, build: impl FnOnce(&mut Self)) -> &mut Self {
        if let Some(outer) = self.collector.enter(prefix) {
            build(self);
            self.collector.prefix = outer;
        }
        self
    }

    /// Append an existing table at the current prefix.
    pub fn include(&mut self, table: &RouteTable) -> &mut Self {
        self.collector.include(table);
        self
    }

    /// Snapshot the registered routes.
    pub fn build(&self) -> Result<RouteTable, RouteError> {
        self.collector.build()
    }
}

/// Build a table of direct handlers.
pub fn router(build: impl FnOnce(&mut RouterBuilder)) -> Result<RouteTable, RouteError> {
    let mut builder = RouterBuilder::new();
    build(&mut builder);
    builder.build()
}

/// Build a table of suspending handlers.
pub fn co_router(build: impl FnOnce(&mut CoRouterBuilder)) -> Result<RouteTable, RouteError> {
    let mut builder = CoRouterBuilder::new();
    build(&mut builder);
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn patterns(table: &RouteTable) -> Vec<(Method, String)> {
        table
            .entries()
            .iter()
            .map(|e| (e.method().clone(), e.pattern().as_str().to_string()))
            .collect()
    }

    #[test]
    fn test_nested_prefixes_concatenate() {
        let table = router(|r| {
            r.get("/", |_req| StatusCode::OK);
            r.nest("/api", |r| {
                r.get("/", |_req| StatusCode::OK);
                r.nest("/v1", |r| {
                    r.put("/{id}", |_req| StatusCode::OK);
                });
                r.delete("/{id}", |_req| StatusCode::OK);
            });
            r.post("/after", |_req| StatusCode::OK);
        })
        .unwrap();

        assert_eq!(
            patterns(&table),
            vec![
                (Method::GET, "/".to_string()),
                (Method::GET, "/api/".to_string()),
                (Method::PUT, "/api/v1/{id}".to_string()),
                (Method::DELETE, "/api/{id}".to_string()),
                (Method::POST, "/after".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_path_rejected() {
        let result = router(|r| {
            r.get("", |_req| StatusCode::OK);
        });
        assert_eq!(result, Err(RouteError::EmptyPath));

        let result = co_router(|r| {
            r.nest("", |_r| {});
        });
        assert_eq!(result, Err(RouteError::EmptyPrefix));
    }

    #[test]
    fn test_first_error_is_kept() {
        let result = router(|r| {
            r.get("/{a", |_req| StatusCode::OK);
            r.get("", |_req| StatusCode::OK);
        });
        assert!(matches!(result, Err(RouteError::InvalidPattern { .. })));
    }

    #[test]
    fn test_build_twice_gives_equal_snapshots() {
        let mut builder = CoRouterBuilder::new();
        builder.get("/", |_req| async { StatusCode::OK });
        let first = builder.build().unwrap();
        let second = builder.build().unwrap();

        assert_eq!(first, second);
        assert!(first.entries()[0].handler().is_deferred());

        builder.post("/", |_req| async { StatusCode::CREATED });
        assert_eq!(first.len(), 1);
        assert_eq!(builder.build().unwrap().len(), 2);
    }

    #[test]
    fn test_include_under_prefix() {
        let api = router(|r| {
            r.get("/", |_req| StatusCode::OK);
        })
        .unwrap();
        let table = router(|r| {
            r.nest("/api", |r| {
                r.include(&api);
            });
        })
        .unwrap();
        assert_eq!(patterns(&table), vec![(Method::GET, "/api/".to_string())]);
    }
}
