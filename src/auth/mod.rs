// src/auth/mod.rs

pub mod cache;
pub mod device;
pub mod jwt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::Result;

pub use cache::{CachedToken, TokenCache};
pub use device::DeviceCodeAuth;

/// Ordered, duplicate-free list of permission names requested for a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Scopes(Vec<String>);

impl Scopes {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if !name.is_empty() && !out.iter().any(|s| s.eq_ignore_ascii_case(&name)) {
                out.push(name);
            }
        }
        Scopes(out)
    }

    pub fn read() -> Self {
        Scopes::new(["Files.Read.All", "Sites.Read.All", "offline_access"])
    }

    pub fn write() -> Self {
        Scopes::new(["Files.ReadWrite.All", "Sites.ReadWrite.All", "offline_access"])
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Union keeping `self`'s order first.
    pub fn union(&self, other: &Scopes) -> Scopes {
        Scopes::new(self.0.iter().chain(other.0.iter()).cloned())
    }

    /// True when every resource scope in `requested` is present here
    /// (case-insensitive). OpenID scopes are never echoed back by the token
    /// endpoint, so they are not compared.
    pub fn covers(&self, requested: &Scopes) -> bool {
        requested
            .iter()
            .filter(|r| !is_oidc_scope(r))
            .all(|r| self.iter().any(|s| s.eq_ignore_ascii_case(r)))
    }

    /// Space-separated form used by the OAuth endpoints.
    pub fn joined(&self) -> String {
        self.0.join(" ")
    }
}

pub(crate) const OIDC_SCOPES: &[&str] = &["openid", "profile", "email", "offline_access"];

fn is_oidc_scope(name: &str) -> bool {
    OIDC_SCOPES.iter().any(|s| s.eq_ignore_ascii_case(name))
}

impl From<Vec<String>> for Scopes {
    fn from(v: Vec<String>) -> Self {
        Scopes::new(v)
    }
}

impl From<Scopes> for Vec<String> {
    fn from(s: Scopes) -> Self {
        s.0
    }
}

impl fmt::Display for Scopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

/// Opaque proof that someone is signed in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub account: Option<String>,
}

/// The identity capability handed to the roster loader and the submission
/// builder.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Make sure a session exists for `scopes`. May run an interactive
    /// sign-in; returns `AuthRequired` when it cannot.
    async fn ensure_signed_in(&self, scopes: &Scopes) -> Result<Session>;

    /// Silently obtain a bearer token for `scopes`. Never interactive.
    async fn bearer_token(&self, scopes: &Scopes) -> Result<String>;
}

/// A pre-issued bearer token, e.g. from `CROSSFORM_TOKEN`.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticToken {
    async fn ensure_signed_in(&self, _scopes: &Scopes) -> Result<Session> {
        Ok(Session {
            account: jwt::account_name(&self.token),
        })
    }

    async fn bearer_token(&self, scopes: &Scopes) -> Result<String> {
        debug!(%scopes, "using static bearer token");
        Ok(self.token.clone())
    }
}
