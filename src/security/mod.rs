//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Declaration:
//!     server { security { user details / encoder / manager / rules } }
//!     → SecurityDsl → SecurityConfig (bindings, not instances)
//!
//! Startup (after beans, before the listener binds):
//!     filter.rs SecurityFilterChain::initialize(config, context)
//!     → bindings resolved (instance or bean lookup)
//!     → failure is fatal; the server never binds
//!
//! Incoming request:
//!     → filter.rs (first matching rule decides access)
//!     → HTTP Basic credentials → users.rs AuthenticationManager
//!     → password.rs encoder check
//!     → Pass to dispatch with Authentication in extensions
//! ```
//!
//! # Design Decisions
//! - Fail closed: requests matching no rule must be authenticated
//! - Rules are evaluated in declaration order, first match wins
//! - No trust in client input

pub mod filter;
pub mod password;
pub mod users;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::context::{ApplicationContext, BeanError};
use crate::routing::RouteError;

pub use filter::{security_filter, SecurityFilterChain};
pub use password::{
    DelegatingPasswordEncoder, NoOpPasswordEncoder, PasswordEncoder, Sha256PasswordEncoder,
};
pub use users::{
    Authentication, AuthenticationError, AuthenticationManager, InMemoryUserDetailsService,
    UserDetails, UserDetailsAuthenticationManager, UserDetailsService,
};

/// Security filter-chain initialization failed.
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("security requires an authentication manager or a user details service")]
    MissingAuthentication,

    #[error("failed to resolve {binding}: {source}")]
    Lookup {
        binding: &'static str,
        #[source]
        source: BeanError,
    },

    #[error("invalid authorization rule `{pattern}`: {source}")]
    InvalidRule {
        pattern: String,
        #[source]
        source: RouteError,
    },
}

type Lookup<T> = dyn Fn(&ApplicationContext) -> Result<Arc<T>, BeanError> + Send + Sync;

/// A collaborator given either directly or as a bean to look up.
pub enum Binding<T: ?Sized> {
    Instance(Arc<T>),
    Bean(Arc<Lookup<T>>),
}

impl<T: ?Sized> Binding<T> {
    pub fn resolve(&self, ctx: &ApplicationContext) -> Result<Arc<T>, BeanError> {
        match self {
            Binding::Instance(value) => Ok(value.clone()),
            Binding::Bean(lookup) => lookup(ctx),
        }
    }
}

impl<T: ?Sized> Clone for Binding<T> {
    fn clone(&self) -> Self {
        match self {
            Binding::Instance(value) => Binding::Instance(value.clone()),
            Binding::Bean(lookup) => Binding::Bean(lookup.clone()),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Instance(_) => f.write_str("Instance"),
            Binding::Bean(_) => f.write_str("Bean"),
        }
    }
}

/// What a request needs to proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    PermitAll,
    Authenticated,
    HasRole(String),
}

/// A path pattern (same syntax as routes) and the access it requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRule {
    pub pattern: String,
    pub access: Access,
}

/// Realized security settings, resolved against the context at startup.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub user_details_service: Option<Binding<dyn UserDetailsService>>,
    pub password_encoder: Option<Binding<dyn PasswordEncoder>>,
    pub authentication_manager: Option<Binding<dyn AuthenticationManager>>,
    pub rules: Vec<AuthorizationRule>,
    pub realm: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            user_details_service: None,
            password_encoder: None,
            authentication_manager: None,
            rules: Vec::new(),
            realm: "webwire".to_string(),
        }
    }
}

/// Receiver of `security { }`.
#[derive(Debug, Default)]
pub struct SecurityDsl {
    config: SecurityConfig,
}

impl SecurityDsl {
    pub fn user_details_service(&mut self, service: impl UserDetailsService + 'static) -> &mut Self {
        self.config.user_details_service = Some(Binding::Instance(Arc::new(service)));
        self
    }

    /// Use the bean of type `T` as user details service.
    pub fn user_details_service_bean<T>(&mut self) -> &mut Self
    where
        T: UserDetailsService + Any + 'static,
    {
        self.config.user_details_service = Some(Binding::Bean(Arc::new(|ctx: &ApplicationContext| {
            ctx.get::<T>().map(|bean| bean as Arc<dyn UserDetailsService>)
        })));
        self
    }

    /// Shorthand for an [`InMemoryUserDetailsService`].
    pub fn users(&mut self, users: impl IntoIterator<Item = UserDetails>) -> &mut Self {
        self.user_details_service(InMemoryUserDetailsService::new(users))
    }

    pub fn password_encoder(&mut self, encoder: impl PasswordEncoder + 'static) -> &mut Self {
        self.config.password_encoder = Some(Binding::Instance(Arc::new(encoder)));
        self
    }

    pub fn password_encoder_bean<T>(&mut self) -> &mut Self
    where
        T: PasswordEncoder + Any + 'static,
    {
        self.config.password_encoder = Some(Binding::Bean(Arc::new(|ctx: &ApplicationContext| {
            ctx.get::<T>().map(|bean| bean as Arc<dyn PasswordEncoder>)
        })));
        self
    }

    pub fn authentication_manager(&mut self, manager: impl AuthenticationManager + 'static) -> &mut Self {
        self.config.authentication_manager = Some(Binding::Instance(Arc::new(manager)));
        self
    }

    pub fn authentication_manager_bean<T>(&mut self) -> &mut Self
    where
        T: AuthenticationManager + Any + 'static,
    {
        self.config.authentication_manager = Some(Binding::Bean(Arc::new(|ctx: &ApplicationContext| {
            ctx.get::<T>().map(|bean| bean as Arc<dyn AuthenticationManager>)
        })));
        self
    }

    pub fn permit_all(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.rule(pattern, Access::PermitAll)
    }

    pub fn authenticated(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.rule(pattern, Access::Authenticated)
    }

    pub fn has_role(&mut self, pattern: impl Into<String>, role: impl Into<String>) -> &mut Self {
        self.rule(pattern, Access::HasRole(role.into()))
    }

    /// Realm announced in `WWW-Authenticate`.
    pub fn realm(&mut self, realm: impl Into<String>) -> &mut Self {
        self.config.realm = realm.into();
        self
    }

    fn rule(&mut self, pattern: impl Into<String>, access: Access) -> &mut Self {
        self.config.rules.push(AuthorizationRule {
            pattern: pattern.into(),
            access,
        });
        self
    }

    pub(crate) fn into_config(self) -> SecurityConfig {
        self.config
    }
}
