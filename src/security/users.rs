//! User details and authentication managers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};

use crate::security::password::PasswordEncoder;

/// A user as seen by the security layer. `password` is stored encoded.
#[derive(Clone, PartialEq, Eq)]
pub struct UserDetails {
    pub username: String,
    pub password: String,
    pub roles: Vec<String>,
    pub enabled: bool,
}

impl UserDetails {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            roles: Vec::new(),
            enabled: true,
        }
    }

    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl fmt::Debug for UserDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDetails")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("roles", &self.roles)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Looks users up by name.
pub trait UserDetailsService: Send + Sync {
    fn find_by_username<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Option<UserDetails>>;
}

/// Fixed set of users held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDetailsService {
    users: HashMap<String, UserDetails>,
}

impl InMemoryUserDetailsService {
    pub fn new(users: impl IntoIterator<Item = UserDetails>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|user| (user.username.clone(), user))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserDetailsService for InMemoryUserDetailsService {
    fn find_by_username<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Option<UserDetails>> {
        let user = self.users.get(username).cloned();
        async move { user }.boxed()
    }
}

/// An authenticated principal, attached to request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authentication {
    pub principal: String,
    pub roles: Vec<String>,
}

impl Authentication {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthenticationError {
    #[error("bad credentials")]
    BadCredentials,

    #[error("user `{0}` is disabled")]
    Disabled(String),
}

/// Turns a username/password pair into an [`Authentication`].
pub trait AuthenticationManager: Send + Sync {
    fn authenticate<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<Authentication, AuthenticationError>>;
}

/// Default manager: look the user up, then check the password.
pub struct UserDetailsAuthenticationManager {
    users: Arc<dyn UserDetailsService>,
    encoder: Arc<dyn PasswordEncoder>,
}

impl UserDetailsAuthenticationManager {
    pub fn new(users: Arc<dyn UserDetailsService>, encoder: Arc<dyn PasswordEncoder>) -> Self {
        Self { users, encoder }
    }
}

impl AuthenticationManager for UserDetailsAuthenticationManager {
    fn authenticate<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<Authentication, AuthenticationError>> {
        async move {
            let user = self
                .users
                .find_by_username(username)
                .await
                .ok_or(AuthenticationError::BadCredentials)?;
            if !self.encoder.matches(password, &user.password) {
                return Err(AuthenticationError::BadCredentials);
            }
            if !user.enabled {
                return Err(AuthenticationError::Disabled(user.username));
            }
            Ok(Authentication {
                principal: user.username,
                roles: user.roles,
            })
        }
        .boxed()
    }
}

impl fmt::Debug for UserDetailsAuthenticationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDetailsAuthenticationManager")
            .field("encoder", &self.encoder)
            .finish_non_exhaustive()
    }
}
