//! HTTP server setup and dispatch.
//!
//! # Responsibilities
//! - Create the Axum router whose only route is the dispatch fallback
//! - Wire up middleware (tracing, request ID, CORS, timeout, body limit, security)
//! - Dispatch requests to the realized route table
//! - Serve until the shutdown future resolves
//! - Observability (metrics, correlation IDs)

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::server::ServerConfig;
use crate::http::codec::Codecs;
use crate::http::cors::cors_layer;
use crate::http::request::{RequestIdLayer, X_REQUEST_ID};
use crate::observability::metrics;
use crate::routing::{RouteMatch, RouteTable};
use crate::security::{security_filter, SecurityFilterChain};

/// State injected into the dispatcher.
#[derive(Clone)]
pub struct DispatchState {
    pub routes: RouteTable,
    pub codecs: Arc<Codecs>,
}

/// HTTP server bound to one realized route table.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(
        routes: RouteTable,
        config: &ServerConfig,
        codecs: Arc<Codecs>,
        security: Option<Arc<SecurityFilterChain>>,
    ) -> Self {
        let state = DispatchState { routes, codecs };
        Self {
            router: Self::build_router(config, state, security),
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Outermost first: trace, request ID, CORS, timeout, body limit, security.
    #[allow(deprecated)]
    fn build_router(
        config: &ServerConfig,
        state: DispatchState,
        security: Option<Arc<SecurityFilterChain>>,
    ) -> Router {
        let mut router = Router::new().fallback(dispatch).with_state(state);

        if let Some(chain) = security {
            router = router.layer(axum::middleware::from_fn_with_state(chain, security_filter));
        }

        router = router
            .layer(RequestBodyLimitLayer::new(config.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)));

        if let Some(cors) = cors_layer(&config.cors) {
            router = router.layer(cors);
        }

        router
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for in-process use.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve on `listener` until `shutdown` resolves, then drain.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Match the request against the route table and call the bound handler.
/// `HEAD` responses keep status and headers but carry no body.
async fn dispatch(State(state): State<DispatchState>, mut request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let Some(RouteMatch { entry, params }) = state.routes.match_route(&method, &path) else {
        tracing::debug!(request_id = %request_id, method = %method, path = %path, "No route matched");
        metrics::record_request(method.as_str(), 404, "none", start_time);
        return (StatusCode::NOT_FOUND, "No matching route found").into_response();
    };
    let route = entry.pattern().as_str().to_string();

    if !state.codecs.accepts(request.headers()) {
        tracing::debug!(request_id = %request_id, route = %route, "Unsupported content type");
        metrics::record_request(method.as_str(), 415, &route, start_time);
        return (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported content type").into_response();
    }

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        route = %route,
        deferred = entry.handler().is_deferred(),
        "Dispatching request"
    );

    let handler = entry.handler().clone();
    request.extensions_mut().insert(params);
    let mut response = handler.call(request).await;

    metrics::record_request(method.as_str(), response.status().as_u16(), &route, start_time);
    if method == Method::HEAD {
        *response.body_mut() = Body::empty();
    }
    response
}
