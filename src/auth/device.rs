// src/auth/device.rs

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::{sync::Mutex, time::sleep, time::Instant};
use tracing::{debug, info, instrument, warn};

use super::{jwt, Authenticator, CachedToken, Scopes, Session, TokenCache, OIDC_SCOPES};
use crate::{
    error::{FormError, Result},
    graph::client::json_body,
};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const GRAPH_RESOURCE_PREFIX: &str = "https://graph.microsoft.com/";

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    interval: Option<u64>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    scope: Option<String>,
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthError {
    error: String,
    error_description: Option<String>,
}

impl OAuthError {
    fn reason(&self) -> String {
        match &self.error_description {
            Some(d) => format!("{}: {}", self.error, d.lines().next().unwrap_or_default()),
            None => self.error.clone(),
        }
    }
}

/// Delegated sign-in through the OAuth 2.0 device authorization grant, with a
/// file-backed session cache and silent refresh.
pub struct DeviceCodeAuth {
    http: Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    cache: TokenCache,
    interactive: bool,
    state: Mutex<Option<CachedToken>>,
}

impl DeviceCodeAuth {
    pub fn new(
        http: Client,
        authority: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        cache: TokenCache,
        interactive: bool,
    ) -> Self {
        Self {
            http,
            authority: authority.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            cache,
            interactive,
            state: Mutex::new(None),
        }
    }

    fn endpoint(&self, leaf: &str) -> String {
        oauth_endpoint(&self.authority, &self.tenant_id, leaf)
    }

    /// Run the interactive flow unconditionally and persist the result.
    #[instrument(level = "info", skip_all, fields(scopes = %scopes))]
    pub async fn sign_in(&self, scopes: &Scopes) -> Result<Session> {
        let requested = scopes.union(&Scopes::new(OIDC_SCOPES.iter().copied()));
        let dc = self
            .http
            .post(self.endpoint("devicecode"))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", requested.joined().as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let dc: DeviceCodeResponse = json_body(dc, "device code endpoint").await?;

        let prompt = dc.message.clone().unwrap_or_else(|| {
            format!(
                "To sign in, open {} and enter the code {}",
                dc.verification_uri, dc.user_code
            )
        });
        info!(user_code = %dc.user_code, uri = %dc.verification_uri, "waiting for device sign-in");
        eprintln!("{}", prompt);

        let mut interval = Duration::from_secs(dc.interval.unwrap_or(5).max(1));
        let deadline = Instant::now() + Duration::from_secs(dc.expires_in);

        let resp = loop {
            if Instant::now() >= deadline {
                return Err(FormError::auth_required(scopes, "device code expired"));
            }
            sleep(interval).await;

            let r = self
                .http
                .post(self.endpoint("token"))
                .form(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("client_id", self.client_id.as_str()),
                    ("device_code", dc.device_code.as_str()),
                ])
                .send()
                .await?;

            if r.status().is_success() {
                break json_body::<TokenResponse>(r, "token endpoint").await?;
            }
            let err: OAuthError = r.json().await.map_err(|e| FormError::Decode {
                what: "token endpoint".into(),
                reason: e.to_string(),
            })?;
            match err.error.as_str() {
                "authorization_pending" => continue,
                "slow_down" => {
                    interval += Duration::from_secs(5);
                    debug!(?interval, "token endpoint asked to slow down");
                }
                _ => return Err(FormError::auth_required(scopes, err.reason())),
            }
        };

        let token = cached_from_response(resp, &requested, None, None);
        self.cache.save(&token)?;
        info!(account = ?token.account, "signed in");
        let session = Session {
            account: token.account.clone(),
        };
        *self.state.lock().await = Some(token);
        Ok(session)
    }

    async fn refresh(&self, current: &CachedToken, scopes: &Scopes) -> Result<CachedToken> {
        let refresh_token = current.refresh_token.as_deref().unwrap_or_default();
        let requested = scopes.union(&Scopes::new(["offline_access"]));
        let r = self
            .http
            .post(self.endpoint("token"))
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token),
                ("scope", requested.joined().as_str()),
            ])
            .send()
            .await?;

        if !r.status().is_success() {
            let status = r.status();
            let reason = match r.json::<OAuthError>().await {
                Ok(e) => e.reason(),
                Err(_) => format!("token refresh failed with HTTP {}", status),
            };
            warn!(%status, %reason, "silent token refresh failed");
            return Err(FormError::auth_required(scopes, reason));
        }

        let resp: TokenResponse = json_body(r, "token endpoint").await?;
        Ok(cached_from_response(
            resp,
            &requested,
            current.refresh_token.clone(),
            current.account.clone(),
        ))
    }

    async fn current(&self) -> Option<CachedToken> {
        let mut state = self.state.lock().await;
        if state.is_none() {
            *state = self.cache.load();
        }
        state.clone()
    }
}

#[async_trait]
impl Authenticator for DeviceCodeAuth {
    /// A session counts only once a usable token is in hand: a stale cache
    /// entry is refreshed here, and a failed refresh falls through to the
    /// interactive flow when allowed.
    async fn ensure_signed_in(&self, scopes: &Scopes) -> Result<Session> {
        let silent = match self.silent_token(scopes).await {
            Ok(tok) => {
                return Ok(Session {
                    account: tok.account,
                })
            }
            Err(e) => e,
        };
        if !self.interactive {
            warn!(error = %silent, "no usable session and sign-in prompts are off");
            let reason = match silent {
                FormError::AuthRequired { reason, .. } => reason,
                other => other.to_string(),
            };
            return Err(FormError::auth_required(
                scopes,
                format!("{}; run `crossform login`", reason),
            ));
        }
        info!(reason = %silent, "silent sign-in failed; starting device sign-in");
        self.sign_in(scopes).await
    }

    async fn bearer_token(&self, scopes: &Scopes) -> Result<String> {
        Ok(self.silent_token(scopes).await?.access_token)
    }
}

impl DeviceCodeAuth {
    /// Cached token when fresh for `scopes`, else one refresh grant.
    async fn silent_token(&self, scopes: &Scopes) -> Result<CachedToken> {
        let Some(tok) = self.current().await else {
            return Err(FormError::auth_required(scopes, "not signed in"));
        };
        if tok.is_fresh_for(scopes, Utc::now()) {
            return Ok(tok);
        }
        if !tok.can_refresh() {
            return Err(FormError::auth_required(
                scopes,
                "cached token expired and cannot be refreshed",
            ));
        }

        debug!(%scopes, "refreshing access token");
        let fresh = self.refresh(&tok, scopes).await?;
        self.cache.save(&fresh)?;
        *self.state.lock().await = Some(fresh.clone());
        Ok(fresh)
    }
}

fn oauth_endpoint(authority: &str, tenant_id: &str, leaf: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/{}",
        authority.trim_end_matches('/'),
        tenant_id,
        leaf
    )
}

/// Granted scopes come back either bare (`Files.Read`) or resource-qualified
/// (`https://graph.microsoft.com/Files.Read`).
fn granted_scopes(scope: Option<&str>, requested: &Scopes) -> Scopes {
    match scope {
        Some(s) if !s.trim().is_empty() => Scopes::new(
            s.split_whitespace()
                .map(|x| x.strip_prefix(GRAPH_RESOURCE_PREFIX).unwrap_or(x)),
        ),
        _ => requested.clone(),
    }
}

fn cached_from_response(
    resp: TokenResponse,
    requested: &Scopes,
    previous_refresh: Option<String>,
    previous_account: Option<String>,
) -> CachedToken {
    let account = resp
        .id_token
        .as_deref()
        .and_then(jwt::account_name)
        .or_else(|| jwt::account_name(&resp.access_token))
        .or(previous_account);
    CachedToken {
        scopes: granted_scopes(resp.scope.as_deref(), requested),
        expires_at: Utc::now() + ChronoDuration::seconds(resp.expires_in.max(0)),
        refresh_token: resp.refresh_token.or(previous_refresh),
        access_token: resp.access_token,
        account,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve_http;
    use tempfile::tempdir;

    #[test]
    fn test_endpoint_shape() {
        assert_eq!(
            oauth_endpoint("https://login.microsoftonline.com/", "contoso", "devicecode"),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/devicecode"
        );
    }

    #[test]
    fn test_granted_scopes_strip_graph_prefix() {
        let s = granted_scopes(
            Some("https://graph.microsoft.com/Files.Read.All openid profile"),
            &Scopes::write(),
        );
        assert_eq!(
            s.iter().collect::<Vec<_>>(),
            vec!["Files.Read.All", "openid", "profile"]
        );
        assert_eq!(granted_scopes(None, &Scopes::write()), Scopes::write());
    }

    #[test]
    fn test_refresh_keeps_previous_refresh_token() {
        let resp: TokenResponse = serde_json::from_str(
            r#"{"access_token":"new","expires_in":3600,"scope":"Files.Read.All Sites.Read.All"}"#,
        )
        .unwrap();
        let tok = cached_from_response(
            resp,
            &Scopes::read(),
            Some("old-rt".into()),
            Some("ana@contoso.com".into()),
        );
        assert_eq!(tok.access_token, "new");
        assert_eq!(tok.refresh_token.as_deref(), Some("old-rt"));
        assert_eq!(tok.account.as_deref(), Some("ana@contoso.com"));
        assert!(tok.is_fresh_for(&Scopes::read(), Utc::now()));
    }

    fn auth_with_cache(dir: &std::path::Path, interactive: bool) -> DeviceCodeAuth {
        DeviceCodeAuth::new(
            Client::new(),
            "http://127.0.0.1:9",
            "tenant",
            "client",
            TokenCache::new(dir.join("token.json")),
            interactive,
        )
    }

    #[tokio::test]
    async fn test_non_interactive_without_session_requires_auth() {
        let tmp = tempdir().unwrap();
        let auth = auth_with_cache(tmp.path(), false);
        let err = auth.ensure_signed_in(&Scopes::read()).await.unwrap_err();
        assert!(err.is_auth_required());
        let err = auth.bearer_token(&Scopes::read()).await.unwrap_err();
        assert!(err.is_auth_required());
    }

    fn stale_token(refresh: &str) -> CachedToken {
        CachedToken {
            access_token: "stale".into(),
            refresh_token: Some(refresh.into()),
            expires_at: Utc::now() - ChronoDuration::minutes(5),
            scopes: Scopes::read(),
            account: Some("ana@contoso.com".into()),
        }
    }

    fn auth_against(authority: &str, dir: &std::path::Path, interactive: bool) -> DeviceCodeAuth {
        DeviceCodeAuth::new(
            Client::new(),
            authority,
            "t",
            "client",
            TokenCache::new(dir.join("token.json")),
            interactive,
        )
    }

    fn revoked(path: &str) -> (u16, String) {
        if path.ends_with("/token") {
            (
                400,
                r#"{"error":"invalid_grant","error_description":"AADSTS70008: The refresh token has expired."}"#.into(),
            )
        } else {
            (400, r#"{"error":"invalid_client"}"#.into())
        }
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_is_not_a_session() {
        let (authority, log) = serve_http(revoked).await;
        let tmp = tempdir().unwrap();
        TokenCache::new(tmp.path().join("token.json"))
            .save(&stale_token("revoked"))
            .unwrap();

        let auth = auth_against(&authority, tmp.path(), false);
        let err = auth.ensure_signed_in(&Scopes::read()).await.unwrap_err();
        assert!(err.is_auth_required());
        assert!(err.to_string().contains("invalid_grant"));
        assert_eq!(*log.lock().unwrap(), vec!["POST /t/oauth2/v2.0/token"]);
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_device_sign_in() {
        let (authority, log) = serve_http(revoked).await;
        let tmp = tempdir().unwrap();
        TokenCache::new(tmp.path().join("token.json"))
            .save(&stale_token("revoked"))
            .unwrap();

        let auth = auth_against(&authority, tmp.path(), true);
        // the stub refuses the device code request too, ending the flow early
        assert!(auth.ensure_signed_in(&Scopes::read()).await.is_err());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["POST /t/oauth2/v2.0/token", "POST /t/oauth2/v2.0/devicecode"]
        );
    }

    #[tokio::test]
    async fn test_stale_token_is_refreshed_once() {
        let (authority, log) = serve_http(|_| {
            (
                200,
                r#"{"access_token":"fresh","expires_in":3600,"scope":"Files.Read.All Sites.Read.All"}"#
                    .into(),
            )
        })
        .await;
        let tmp = tempdir().unwrap();
        let cache = TokenCache::new(tmp.path().join("token.json"));
        cache.save(&stale_token("rt")).unwrap();

        let auth = auth_against(&authority, tmp.path(), false);
        let session = auth.ensure_signed_in(&Scopes::read()).await.unwrap();
        assert_eq!(session.account.as_deref(), Some("ana@contoso.com"));
        assert_eq!(auth.bearer_token(&Scopes::read()).await.unwrap(), "fresh");
        assert_eq!(log.lock().unwrap().len(), 1);

        let saved = cache.load().unwrap();
        assert_eq!(saved.access_token, "fresh");
        assert_eq!(saved.refresh_token.as_deref(), Some("rt"));
    }

    #[tokio::test]
    async fn test_fresh_cached_token_is_used_silently() {
        let tmp = tempdir().unwrap();
        let cache = TokenCache::new(tmp.path().join("token.json"));
        cache
            .save(&CachedToken {
                access_token: "cached".into(),
                refresh_token: None,
                expires_at: Utc::now() + ChronoDuration::hours(1),
                scopes: Scopes::read(),
                account: Some("ana@contoso.com".into()),
            })
            .unwrap();

        let auth = auth_with_cache(tmp.path(), false);
        let session = auth.ensure_signed_in(&Scopes::read()).await.unwrap();
        assert_eq!(session.account.as_deref(), Some("ana@contoso.com"));
        assert_eq!(auth.bearer_token(&Scopes::read()).await.unwrap(), "cached");

        // no refresh token and scopes not granted: must not go to the network
        let err = auth.bearer_token(&Scopes::write()).await.unwrap_err();
        assert!(err.is_auth_required());
    }
}
