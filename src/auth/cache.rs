// src/auth/cache.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use super::Scopes;
use crate::error::Result;

/// Tokens closer than this to expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub scopes: Scopes,
    pub account: Option<String>,
}

impl CachedToken {
    /// Usable as-is for `requested` at `now`.
    pub fn is_fresh_for(&self, requested: &Scopes, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_SKEW_SECS) > now
            && self.scopes.covers(requested)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// JSON file holding the signed-in session between runs.
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable cache means "no session".
    pub fn load(&self) -> Option<CachedToken> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no token cache");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(tok) => Some(tok),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring corrupt token cache");
                None
            }
        }
    }

    pub fn save(&self, token: &CachedToken) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(token).map_err(std::io::Error::from)?;
        fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), "token cache written");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
