//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::response::Response;
use tower::ServiceExt;
use webwire::lifecycle::Realized;
use webwire::RunningApplication;

/// HTTP client that never goes through a proxy and never pools.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Absolute URL of `path` on a running application.
pub fn url(running: &RunningApplication, path: &str) -> String {
    let addr = running.local_addr().expect("application is not listening");
    format!("http://{addr}{path}")
}

/// Dispatch one request through the fully layered router, without a socket.
pub async fn call(realized: &Realized, request: Request<Body>) -> Response {
    realized.router().oneshot(request).await.unwrap()
}

pub async fn get(realized: &Realized, path: &str) -> Response {
    call(realized, Request::get(path).body(Body::empty()).unwrap()).await
}

pub async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
