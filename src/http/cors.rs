//! CORS layer built from the server's `cors { }` rules.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};

use crate::config::schema::CorsRule;

/// Build one layer covering every rule, or `None` when no rule is declared.
///
/// Origins are the union of all rules. Methods and headers are the union too;
/// a rule with no header list allows any header. `*` as origin allows any
/// origin and cannot be combined with credentials.
pub fn cors_layer(rules: &[CorsRule]) -> Option<CorsLayer> {
    if rules.is_empty() {
        return None;
    }

    let any_origin = rules.iter().any(|r| r.origin == "*");
    let any_header = rules.iter().any(|r| r.allowed_headers.is_empty());
    let credentials = !any_origin && rules.iter().any(|r| r.allow_credentials);

    let mut methods: Vec<Method> = Vec::new();
    let mut headers: Vec<HeaderName> = Vec::new();
    let mut origins: Vec<HeaderValue> = Vec::new();
    for rule in rules {
        for method in &rule.allowed_methods {
            match Method::from_bytes(method.as_bytes()) {
                Ok(m) if !methods.contains(&m) => methods.push(m),
                Ok(_) => {}
                Err(_) => tracing::warn!(method = %method, "Ignoring invalid CORS method"),
            }
        }
        for header in &rule.allowed_headers {
            match HeaderName::from_bytes(header.as_bytes()) {
                Ok(h) if !headers.contains(&h) => headers.push(h),
                Ok(_) => {}
                Err(_) => tracing::warn!(header = %header, "Ignoring invalid CORS header"),
            }
        }
        if rule.origin != "*" {
            match HeaderValue::from_str(&normalize_origin(&rule.origin)) {
                Ok(origin) => origins.push(origin),
                Err(_) => tracing::warn!(origin = %rule.origin, "Ignoring invalid CORS origin"),
            }
        }
    }

    let allow_headers = if any_header && !credentials {
        AllowHeaders::from(Any)
    } else if any_header {
        AllowHeaders::mirror_request()
    } else {
        AllowHeaders::list(headers)
    };

    let mut layer = CorsLayer::new()
        .allow_methods(AllowMethods::list(methods))
        .allow_headers(allow_headers)
        .allow_origin(if any_origin {
            AllowOrigin::from(Any)
        } else {
            AllowOrigin::list(origins)
        })
        .allow_credentials(credentials);

    if let Some(max_age) = rules.iter().filter_map(|r| r.max_age_secs).max() {
        layer = layer.max_age(Duration::from_secs(max_age));
    }
    Some(layer)
}

/// `example.com` becomes `https://example.com`; explicit schemes are kept.
fn normalize_origin(origin: &str) -> String {
    let origin = origin.trim().trim_end_matches('/');
    if origin.contains("://") {
        origin.to_string()
    } else {
        format!("https://{origin}")
    }
}
