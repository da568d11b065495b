//! Handler calling conventions.
//!
//! A route is bound to either a direct handler, which produces its response
//! synchronously, or a deferred handler, whose response is produced by a
//! future the dispatcher awaits without blocking a worker thread.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

type DirectFn = dyn Fn(Request<Body>) -> Response + Send + Sync;
type DeferredFn = dyn Fn(Request<Body>) -> BoxFuture<'static, Response> + Send + Sync;

/// A route handler, tagged by calling convention.
#[derive(Clone)]
pub enum Handler {
    Direct(Arc<DirectFn>),
    Deferred(Arc<DeferredFn>),
}

impl Handler {
    /// Wrap a handler that must not suspend.
    pub fn direct<F, R>(f: F) -> Self
    where
        F: Fn(Request<Body>) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        Handler::Direct(Arc::new(move |req| f(req).into_response()))
    }

    /// Wrap a handler whose response is awaited.
    pub fn deferred<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        Handler::Deferred(Arc::new(move |req| f(req).map(|res| res.into_response()).boxed()))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Handler::Deferred(_))
    }

    /// Invoke the handler using its calling convention.
    pub async fn call(&self, request: Request<Body>) -> Response {
        match self {
            Handler::Direct(f) => f(request),
            Handler::Deferred(f) => f(request).await,
        }
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Handler::Direct(a), Handler::Direct(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Handler::Deferred(a), Handler::Deferred(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Direct(_) => f.write_str("Handler::Direct"),
            Handler::Deferred(_) => f.write_str("Handler::Deferred"),
        }
    }
}
