//! Response builders for handlers.
//!
//! # Responsibilities
//! - Fluent construction: status, headers, then a body
//! - JSON bodies through serde, HTML bodies through the template engine
//! - Map encoding and rendering failures to 500 responses
//!
//! # Design Decisions
//! - Builders never panic; invalid header values are logged and skipped
//! - Failures are logged here so handlers can return `Response` directly

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::http::template::TemplateEngine;

/// Entry points mirroring the usual status shortcuts.
pub struct ServerResponse;

impl ServerResponse {
    pub fn ok() -> ResponseBuilder {
        Self::status(StatusCode::OK)
    }

    pub fn created() -> ResponseBuilder {
        Self::status(StatusCode::CREATED)
    }

    pub fn no_content() -> ResponseBuilder {
        Self::status(StatusCode::NO_CONTENT)
    }

    pub fn not_found() -> ResponseBuilder {
        Self::status(StatusCode::NOT_FOUND)
    }

    pub fn status(status: StatusCode) -> ResponseBuilder {
        ResponseBuilder {
            status,
            headers: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl ResponseBuilder {
    pub fn header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => self.headers.push((name, value)),
            Err(e) => tracing::warn!(header = %name, error = %e, "Dropping invalid header value"),
        }
        self
    }

    pub fn content_type(self, value: &str) -> Self {
        self.header(header::CONTENT_TYPE, value)
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        self.content_type("text/plain; charset=utf-8")
            .body(Body::from(body.into()))
    }

    pub fn html(self, body: impl Into<String>) -> Response {
        self.content_type("text/html; charset=utf-8")
            .body(Body::from(body.into()))
    }

    pub fn json<T: Serialize>(self, value: &T) -> Response {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.content_type("application/json").body(Body::from(bytes)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode JSON response");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode response").into_response()
            }
        }
    }

    /// Render `template` with `model` as an HTML page.
    pub fn render<T: Serialize>(self, engine: &TemplateEngine, template: &str, model: &T) -> Response {
        let rendered = serde_json::to_value(model)
            .map_err(|e| e.to_string())
            .and_then(|model| engine.render(template, &model).map_err(|e| e.to_string()));
        match rendered {
            Ok(html) => self.html(html),
            Err(e) => {
                tracing::error!(template, error = %e, "Failed to render template");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render template").into_response()
            }
        }
    }

    pub fn build(self) -> Response {
        self.body(Body::empty())
    }

    fn body(self, body: Body) -> Response {
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        for (name, value) in self.headers {
            response.headers_mut().append(name, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TemplateConfig;

    #[test]
    fn test_json_response() {
        let response = ServerResponse::created().json(&serde_json::json!({ "id": 1 }));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_render_missing_template_is_500() {
        let engine = TemplateEngine::new(TemplateConfig::default());
        let response = ServerResponse::ok().render(&engine, "does-not-exist", &serde_json::json!({}));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_header_skipped() {
        let response = ServerResponse::no_content()
            .header(header::LOCATION, "bad\nvalue")
            .build();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get(header::LOCATION).is_none());
    }
}
