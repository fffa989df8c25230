// src/config.rs

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::{debug, info};

use crate::{
    auth::{Authenticator, DeviceCodeAuth, Scopes, StaticToken, TokenCache},
    form::{cross_selling_bindings, DropdownBinding},
    graph::{client::DEFAULT_GRAPH_URL, GraphClient},
    roster::RosterSource,
    submission::WorkbookTarget,
};

pub const DEFAULT_CONFIG_FILE: &str = "crossform.yaml";
const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const DEFAULT_TOKEN_CACHE: &str = ".crossform/token.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub authority: String,
    pub token_cache: PathBuf,
    /// Pre-issued bearer token; skips sign-in entirely.
    pub token: Option<String>,
    pub read_scopes: Scopes,
    pub write_scopes: Scopes,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            authority: DEFAULT_AUTHORITY.to_string(),
            token_cache: PathBuf::from(DEFAULT_TOKEN_CACHE),
            token: None,
            read_scopes: Scopes::read(),
            write_scopes: Scopes::write(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub base_url: String,
    /// Whole-request limit for Graph and token endpoint calls.
    pub timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GRAPH_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterConfig {
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub source: RosterSource,
    #[serde(default = "cross_selling_bindings")]
    pub bindings: Vec<DropdownBinding>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub identity: IdentityConfig,
    pub graph: GraphConfig,
    pub roster: Option<RosterConfig>,
    pub workbook: Option<WorkbookTarget>,
}

impl Config {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(text).context("parsing configuration YAML")
    }

    /// Load `path` (or `./crossform.yaml` when it exists), then apply
    /// `CROSSFORM_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                Self::from_yaml_str(&text).with_context(|| format!("in {}", p.display()))?
            }
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                return Self::load(Some(Path::new(DEFAULT_CONFIG_FILE)));
            }
            None => {
                debug!("no config file; using defaults");
                Config::default()
            }
        };
        cfg.apply_env(|k| env::var(k).ok());
        Ok(cfg)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let set = |slot: &mut Option<String>, key: &str| {
            if let Some(v) = var(key).filter(|v| !v.trim().is_empty()) {
                debug!(key, "config override from environment");
                *slot = Some(v.trim().to_string());
            }
        };
        set(&mut self.identity.tenant_id, "CROSSFORM_TENANT_ID");
        set(&mut self.identity.client_id, "CROSSFORM_CLIENT_ID");
        set(&mut self.identity.token, "CROSSFORM_TOKEN");
        let mut graph_url = None;
        set(&mut graph_url, "CROSSFORM_GRAPH_URL");
        if let Some(u) = graph_url {
            self.graph.base_url = u;
        }
    }

    pub fn roster(&self) -> Result<&RosterConfig> {
        self.roster
            .as_ref()
            .context("no `roster.source` configured")
    }

    pub fn workbook(&self) -> Result<&WorkbookTarget> {
        let Some(w) = self.workbook.as_ref() else {
            bail!("no `workbook` configured");
        };
        if w.table.trim().is_empty() {
            bail!("`workbook.table` is empty");
        }
        Ok(w)
    }

    /// Shared HTTP client; every request is bounded by `graph.timeout_secs`.
    pub fn http_client(&self) -> Result<Client> {
        let secs = self.graph.timeout_secs.max(1);
        Client::builder()
            .user_agent(concat!("crossform/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(secs))
            .build()
            .context("building HTTP client")
    }

    pub fn graph_client(&self, http: Client) -> Result<GraphClient> {
        GraphClient::new(http, &self.graph.base_url)
            .with_context(|| format!("graph.base_url {:?}", self.graph.base_url))
    }

    /// Static token when one is configured, device-code sign-in otherwise.
    pub fn authenticator(&self, http: Client, interactive: bool) -> Result<Arc<dyn Authenticator>> {
        let id = &self.identity;
        if let Some(token) = id.token.as_deref().filter(|t| !t.is_empty()) {
            info!("using configured bearer token");
            return Ok(Arc::new(StaticToken::new(token)));
        }
        let (Some(tenant), Some(client)) = (id.tenant_id.as_deref(), id.client_id.as_deref())
        else {
            bail!("identity.tenant_id and identity.client_id are required (or set CROSSFORM_TOKEN)");
        };
        Ok(Arc::new(self.device_auth(http, tenant, client, interactive)))
    }

    pub fn device_auth(
        &self,
        http: Client,
        tenant: &str,
        client: &str,
        interactive: bool,
    ) -> DeviceCodeAuth {
        DeviceCodeAuth::new(
            http,
            self.identity.authority.clone(),
            tenant,
            client,
            TokenCache::new(self.identity.token_cache.clone()),
            interactive,
        )
    }
}
