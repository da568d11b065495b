//! Body codecs selected by the server's `codecs { }` block.

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::schema::CodecKind;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("no codec for content type `{0}`")]
    Unsupported(String),

    #[error("failed to read request body: {0}")]
    Body(#[from] axum::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request body is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl IntoResponse for CodecError {
    fn into_response(self) -> Response {
        let status = match self {
            CodecError::Unsupported(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

/// The codecs a server was configured with, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codecs {
    kinds: Vec<CodecKind>,
    max_body_size: usize,
}

impl CodecKind {
    fn supports(self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match self {
            CodecKind::String => essence.starts_with("text/"),
            CodecKind::Json => essence == "application/json" || essence.ends_with("+json"),
        }
    }
}

impl Codecs {
    pub fn new(kinds: Vec<CodecKind>, max_body_size: usize) -> Self {
        Self {
            kinds,
            max_body_size,
        }
    }

    pub fn kinds(&self) -> &[CodecKind] {
        &self.kinds
    }

    /// Whether some codec reads `content_type`. An empty codec list accepts anything.
    pub fn supports(&self, content_type: &str) -> bool {
        self.kinds.is_empty() || self.kinds.iter().any(|kind| kind.supports(content_type))
    }

    /// Requests without a `Content-Type` carry no body to decode and are accepted.
    pub fn accepts(&self, headers: &HeaderMap) -> bool {
        match headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
            Some(content_type) => self.supports(content_type),
            None => true,
        }
    }

    /// Decode a JSON request body into `T`.
    pub async fn read_json<T: DeserializeOwned>(&self, request: Request<Body>) -> Result<T, CodecError> {
        let content_type = content_type(request.headers());
        if !self.enabled(CodecKind::Json) || !CodecKind::Json.supports(&content_type) {
            return Err(CodecError::Unsupported(content_type));
        }
        let bytes = to_bytes(request.into_body(), self.max_body_size).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Decode a text request body.
    pub async fn read_text(&self, request: Request<Body>) -> Result<String, CodecError> {
        let content_type = content_type(request.headers());
        if !self.enabled(CodecKind::String) || !CodecKind::String.supports(&content_type) {
            return Err(CodecError::Unsupported(content_type));
        }
        let bytes = to_bytes(request.into_body(), self.max_body_size).await?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Encode `value` as a JSON response.
    pub fn write_json<T: Serialize>(&self, status: StatusCode, value: &T) -> Result<Response, CodecError> {
        if !self.enabled(CodecKind::Json) {
            return Err(CodecError::Unsupported("application/json".to_string()));
        }
        let body = serde_json::to_vec(value)?;
        Ok((
            status,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            body,
        )
            .into_response())
    }

    fn enabled(&self, kind: CodecKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
