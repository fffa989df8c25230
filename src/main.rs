use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossform::{
    auth::{jwt, TokenCache},
    config::Config,
    form::Form,
    page::FormPage,
    submission::CROSS_SELLING_COLUMNS,
};
use reqwest::Client;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Cross-selling quality evaluation form.
#[derive(Parser, Debug)]
#[command(name = "crossform", version)]
struct Args {
    /// YAML configuration (default: ./crossform.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Never prompt for sign-in; fail instead
    #[arg(long, global = true)]
    no_login: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in for both read and write scopes
    Login,
    /// Forget the cached session
    Logout,
    /// Load the roster and print every dropdown's options as JSON
    Options {
        /// Page query string, e.g. "?fecha_llamada=2024-01-10"
        #[arg(long, default_value = "")]
        query: String,
    },
    /// Fill the form from a JSON object of control values and append the row
    Submit {
        #[arg(long)]
        values: PathBuf,
        #[arg(long, default_value = "")]
        query: String,
    },
    /// Compare the declared column order with the workbook table
    CheckSchema,
    /// Show the signed-in account and granted scopes
    TokenInfo,
}

#[tokio::main]
async fn main() {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!(error = %format!("{:#}", e), "action failed");
        eprintln!("✖ {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    // ─── 2) configuration ────────────────────────────────────────────
    let cfg = Config::load(args.config.as_deref())?;
    let http = cfg.http_client()?;

    match args.command {
        Command::Login => login(&cfg, http).await,
        Command::Logout => {
            TokenCache::new(cfg.identity.token_cache.clone()).clear()?;
            info!("signed out");
            Ok(())
        }
        Command::Options { query } => {
            let bindings = &cfg.roster()?.bindings;
            let mut page = build_page(&cfg, http, !args.no_login)?;
            let report = page.load(&query).await;
            report.roster.context("loading roster")?;
            let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for b in bindings {
                if let Some(opts) = page.form.options(&b.control_id) {
                    out.insert(
                        b.control_id.clone(),
                        opts.iter().map(|o| o.value.clone()).collect(),
                    );
                }
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        Command::Submit { values, query } => {
            let input = read_values(&values)?;
            let mut page = build_page(&cfg, http, !args.no_login)?;

            // ─── 3) page load: pre-fill + roster ─────────────────────────
            let report = page.load(&query).await;
            if let Err(e) = &report.roster {
                // the page stays usable without dropdowns, as in the browser
                warn!(error = %e, "continuing without roster");
                eprintln!("⚠ roster not loaded: {}", e);
            }

            // ─── 4) analyst input ────────────────────────────────────────
            let applied = page.form.apply_values(&input);
            if !applied.is_clean() {
                eprintln!(
                    "⚠ ignored values: rejected {:?}, unknown {:?}",
                    applied.rejected, applied.unknown
                );
            }

            // ─── 5) one write ────────────────────────────────────────────
            let created = page.submit().await.context("saving evaluation")?;
            info!(index = ?created.index, "evaluation saved");
            println!("{}", serde_json::to_string_pretty(&created)?);
            Ok(())
        }
        Command::CheckSchema => {
            let page = build_page(&cfg, http, !args.no_login)?;
            let report = page.verify_table().await?;
            println!("{}", report);
            if !report.is_match() {
                bail!("workbook table does not match the declared columns");
            }
            Ok(())
        }
        Command::TokenInfo => {
            let auth = cfg.authenticator(http, false)?;
            let token = auth.bearer_token(&cfg.identity.read_scopes).await?;
            let out = serde_json::json!({
                "account": jwt::account_name(&token),
                "scopes": jwt::token_scopes(&token),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
    }
}

async fn login(cfg: &Config, http: Client) -> Result<()> {
    if cfg.identity.token.is_some() {
        info!("a bearer token is configured; nothing to sign in");
        return Ok(());
    }
    let (Some(tenant), Some(client)) = (
        cfg.identity.tenant_id.as_deref(),
        cfg.identity.client_id.as_deref(),
    ) else {
        bail!("identity.tenant_id and identity.client_id are required to sign in");
    };
    let scopes = cfg.identity.read_scopes.union(&cfg.identity.write_scopes);
    let session = cfg
        .device_auth(http, tenant, client, true)
        .sign_in(&scopes)
        .await?;
    println!(
        "signed in as {}",
        session.account.as_deref().unwrap_or("(unknown account)")
    );
    Ok(())
}

fn build_page(cfg: &Config, http: Client, interactive: bool) -> Result<FormPage> {
    let auth = cfg.authenticator(http.clone(), interactive)?;
    let store = cfg.graph_client(http)?;
    let (source, bindings) = match &cfg.roster {
        Some(r) => (Some(r.source.clone()), r.bindings.clone()),
        None => (None, Vec::new()),
    };
    Ok(FormPage::new(
        Form::cross_selling(),
        auth,
        std::sync::Arc::new(store),
        source,
        bindings,
        CROSS_SELLING_COLUMNS,
        cfg.workbook.clone(),
        cfg.identity.read_scopes.clone(),
        cfg.identity.write_scopes.clone(),
    ))
}

/// JSON object of control id → value. Numbers and booleans are accepted as
/// their text; null means empty.
fn read_values(path: &Path) -> Result<HashMap<String, String>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let raw: HashMap<String, Value> = serde_json::from_str(&text)
        .with_context(|| format!("{} must be a JSON object", path.display()))?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| {
            let s = match v {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (k, s)
        })
        .collect())
}
