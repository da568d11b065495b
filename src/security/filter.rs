//! Security filter chain: initialization and the request middleware.
//!
//! # Responsibilities
//! - Resolve the configured collaborators against the realized context
//! - Decide per request whether authentication or a role is required
//! - Authenticate HTTP Basic credentials and attach the principal
//!
//! # Design Decisions
//! - Initialization is one-shot; every failure is a [`SecurityError`]
//! - Rejections never reveal whether the user exists

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use data_encoding::BASE64;

use crate::context::ApplicationContext;
use crate::routing::PathPattern;
use crate::security::password::{DelegatingPasswordEncoder, PasswordEncoder};
use crate::security::users::{AuthenticationManager, UserDetailsAuthenticationManager};
use crate::security::{Access, SecurityConfig, SecurityError};

/// The initialized chain shared by every request.
pub struct SecurityFilterChain {
    manager: Arc<dyn AuthenticationManager>,
    rules: Vec<(PathPattern, Access)>,
    challenge: HeaderValue,
}

impl SecurityFilterChain {
    /// Resolve bindings and compile rules.
    ///
    /// An explicit authentication manager wins; otherwise one is derived from
    /// the user details service and the password encoder (delegating by
    /// default).
    pub fn initialize(config: &SecurityConfig, ctx: &ApplicationContext) -> Result<Self, SecurityError> {
        let manager: Arc<dyn AuthenticationManager> = match (
            &config.authentication_manager,
            &config.user_details_service,
        ) {
            (Some(manager), _) => manager.resolve(ctx).map_err(|source| SecurityError::Lookup {
                binding: "authentication manager",
                source,
            })?,
            (None, Some(users)) => {
                let users = users.resolve(ctx).map_err(|source| SecurityError::Lookup {
                    binding: "user details service",
                    source,
                })?;
                let encoder: Arc<dyn PasswordEncoder> = match &config.password_encoder {
                    Some(encoder) => encoder.resolve(ctx).map_err(|source| SecurityError::Lookup {
                        binding: "password encoder",
                        source,
                    })?,
                    None => Arc::new(DelegatingPasswordEncoder::default()),
                };
                Arc::new(UserDetailsAuthenticationManager::new(users, encoder))
            }
            (None, None) => return Err(SecurityError::MissingAuthentication),
        };

        let rules = config
            .rules
            .iter()
            .map(|rule| {
                PathPattern::parse(&rule.pattern)
                    .map(|pattern| (pattern, rule.access.clone()))
                    .map_err(|source| SecurityError::InvalidRule {
                        pattern: rule.pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", config.realm))
            .unwrap_or_else(|_| HeaderValue::from_static("Basic"));

        tracing::info!(rules = rules.len(), "Security filter chain initialized");
        Ok(Self {
            manager,
            rules,
            challenge,
        })
    }

    /// Access required for `path`: first matching rule, else authenticated.
    pub fn access_for(&self, path: &str) -> &Access {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.matches(path).is_some())
            .map(|(_, access)| access)
            .unwrap_or(&Access::Authenticated)
    }

    fn unauthorized(&self) -> Response {
        metrics::counter!("webwire_security_rejections_total", "status" => "401").increment(1);
        let mut response = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, self.challenge.clone());
        response
    }
}

impl std::fmt::Debug for SecurityFilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityFilterChain")
            .field("rules", &self.rules.len())
            .finish_non_exhaustive()
    }
}

/// Decode `Authorization: Basic base64(user:password)`.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64.decode(encoded.trim().as_bytes()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

pub async fn security_filter(
    State(chain): State<Arc<SecurityFilterChain>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let access = chain.access_for(req.uri().path()).clone();
    if access == Access::PermitAll {
        return next.run(req).await;
    }

    let Some((user, password)) = basic_credentials(req.headers()) else {
        return chain.unauthorized();
    };

    let authentication = match chain.manager.authenticate(&user, &password).await {
        Ok(auth) => auth,
        Err(e) => {
            tracing::debug!(error = %e, "Authentication failed");
            return chain.unauthorized();
        }
    };

    if let Access::HasRole(role) = &access {
        if !authentication.has_role(role) {
            tracing::debug!(principal = %authentication.principal, role = %role, "Missing role");
            metrics::counter!("webwire_security_rejections_total", "status" => "403").increment(1);
            return (StatusCode::FORBIDDEN, "Forbidden").into_response();
        }
    }

    req.extensions_mut().insert(authentication);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Profiles, PropertySource};
    use crate::context::ListenerRegistry;
    use crate::security::SecurityDsl;
    use crate::security::users::UserDetails;

    fn context() -> ApplicationContext {
        ApplicationContext::new(
            Vec::new(),
            ListenerRegistry::default(),
            Profiles::default(),
            PropertySource::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_authentication_source() {
        let dsl = SecurityDsl::default();
        let result = SecurityFilterChain::initialize(&dsl.into_config(), &context());
        assert!(matches!(result, Err(SecurityError::MissingAuthentication)));
    }

    #[test]
    fn test_missing_bean_is_fatal() {
        let mut dsl = SecurityDsl::default();
        dsl.user_details_service_bean::<crate::security::InMemoryUserDetailsService>();
        let result = SecurityFilterChain::initialize(&dsl.into_config(), &context());
        assert!(matches!(result, Err(SecurityError::Lookup { .. })));
    }

    #[test]
    fn test_first_matching_rule_decides() {
        let mut dsl = SecurityDsl::default();
        dsl.users([UserDetails::new("u", "{noop}p")])
            .permit_all("/")
            .has_role("/admin/{*rest}", "ADMIN")
            .permit_all("/admin/{*rest}");
        let chain = SecurityFilterChain::initialize(&dsl.into_config(), &context()).unwrap();

        assert_eq!(chain.access_for("/"), &Access::PermitAll);
        assert_eq!(chain.access_for("/admin/users"), &Access::HasRole("ADMIN".into()));
        assert_eq!(chain.access_for("/other"), &Access::Authenticated);
    }

    #[test]
    fn test_basic_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz:d29yZA=="),
        );
        assert_eq!(basic_credentials(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNzd29yZA=="));
        assert_eq!(
            basic_credentials(&headers),
            Some(("user".to_string(), "password".to_string()))
        );
    }
}
