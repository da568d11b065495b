//! Request identification and per-request accessors.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) unless the client sent one
//! - Echo the ID on the response
//! - Expose path variables and the request ID to handlers
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Path variables travel in request extensions, not in a side table

use axum::http::{HeaderName, HeaderValue, Request};
use tower::Layer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestId, RequestId, SetRequestId,
};
use uuid::Uuid;

use crate::routing::PathParams;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates `x-request-id` values.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Sets `x-request-id` on the request when missing and copies it to the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = SetRequestId<PropagateRequestId<S>, MakeRequestUuidV4>;

    fn layer(&self, inner: S) -> Self::Service {
        SetRequestId::x_request_id(PropagateRequestId::x_request_id(inner), MakeRequestUuidV4)
    }
}

/// Accessors handlers use on incoming requests.
pub trait RequestExt {
    fn request_id(&self) -> Option<&str>;

    /// A variable captured by the matched route pattern.
    fn path_param(&self, name: &str) -> Option<&str>;
}

impl<B> RequestExt for Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
    }

    fn path_param(&self, name: &str) -> Option<&str> {
        self.extensions().get::<PathParams>()?.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::Response;
    use tower::{service_fn, ServiceExt};

    #[tokio::test]
    async fn test_request_id_generated_and_propagated() {
        let service = RequestIdLayer.layer(service_fn(|req: Request<Body>| async move {
            assert!(req.request_id().is_some());
            Ok::<_, std::convert::Infallible>(Response::new(Body::empty()))
        }));

        let response = service
            .oneshot(Request::new(Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers()[X_REQUEST_ID].to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_client_request_id_kept() {
        let service = RequestIdLayer.layer(service_fn(|req: Request<Body>| async move {
            Ok::<_, std::convert::Infallible>(Response::new(Body::from(
                req.request_id().unwrap_or_default().to_string(),
            )))
        }));

        let request = Request::builder()
            .header(X_REQUEST_ID, "abc-123")
            .body(Body::empty())
            .unwrap();
        let response = service.oneshot(request).await.unwrap();
        assert_eq!(response.headers()[X_REQUEST_ID], "abc-123");
    }
}
