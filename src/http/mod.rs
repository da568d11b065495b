//! HTTP engine glue.
//!
//! # Data Flow
//! ```text
//! TCP connection (tokio listener, axum serve)
//!     → server.rs layers: trace → request ID → CORS → timeout → body limit
//!     → security filter (when a security block is configured)
//!     → server.rs dispatch: RouteTable match, codec check (415), handler call
//!     → handler builds response.rs ServerResponse (JSON, text, template.rs HTML)
//!     → Send to client
//!
//! Outbound:
//!     client.rs WebClient (configured reqwest client, registered as a bean)
//! ```

pub mod client;
pub mod codec;
pub mod cors;
pub mod request;
pub mod response;
pub mod server;
pub mod template;

pub use client::WebClient;
pub use codec::{CodecError, Codecs};
pub use request::{RequestExt, RequestIdLayer, X_REQUEST_ID};
pub use response::{ResponseBuilder, ServerResponse};
pub use server::HttpServer;
pub use template::{TemplateEngine, TemplateError};
