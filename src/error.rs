// src/error.rs

use thiserror::Error;

/// Failures surfaced by the roster loader, the submission builder and their
/// collaborators. Row-level CSV problems are not errors; see
/// [`crate::roster::ParseIssue`].
#[derive(Debug, Error)]
pub enum FormError {
    /// No usable session or token for the requested scopes.
    #[error("sign-in required for [{scopes}]: {reason}")]
    AuthRequired { scopes: String, reason: String },

    #[error("{what} not found (HTTP {status}): {message}")]
    ResourceNotFound {
        what: String,
        status: u16,
        message: String,
    },

    #[error("{what} failed (HTTP {status}): {message}")]
    Http {
        what: String,
        status: u16,
        message: String,
    },

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed link {link:?}: {reason}")]
    MalformedLink { link: String, reason: String },

    #[error("unexpected response from {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("no {0} configured")]
    NotConfigured(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FormError {
    pub fn auth_required(scopes: impl ToString, reason: impl Into<String>) -> Self {
        FormError::AuthRequired {
            scopes: scopes.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_auth_required(&self) -> bool {
        matches!(self, FormError::AuthRequired { .. })
    }
}

pub type Result<T, E = FormError> = std::result::Result<T, E>;
