// src/roster/mod.rs

pub mod collate;
pub mod options;
pub mod parse;

use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};
use tracing::{info, instrument};
use url::Url;

use crate::{
    auth::{Authenticator, Scopes},
    error::Result,
    graph::{self, DriveLocation, DriveStore},
};

pub use options::option_set;
pub use parse::{normalize_header, parse_records, IssueKind, ParseIssue, ParsedCsv, Record};

/// Where the staffing roster CSV comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterSource {
    /// Local file shipped next to the form.
    File(PathBuf),
    /// Plain HTTP(S) URL, fetched without credentials.
    Url(Url),
    DrivePath(String),
    ShareLink(String),
}

impl fmt::Display for RosterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterSource::File(p) => write!(f, "file {}", p.display()),
            RosterSource::Url(u) => write!(f, "url {}", u),
            RosterSource::DrivePath(p) => write!(f, "drive path {}", p),
            RosterSource::ShareLink(l) => write!(f, "share link {}", l),
        }
    }
}

/// Parsed roster: records plus any row-level issues met on the way.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
    pub issues: Vec<ParseIssue>,
}

impl From<ParsedCsv> for Roster {
    fn from(p: ParsedCsv) -> Self {
        Roster {
            headers: p.headers,
            records: p.records,
            issues: p.issues,
        }
    }
}

impl Roster {
    pub fn option_set(&self, column: &str, sort: bool) -> Vec<String> {
        option_set(&self.records, column, sort)
    }
}

/// Fetch the raw CSV text. Drive-backed sources sign in first and fail fast
/// on any collaborator error.
pub async fn fetch_roster_text(
    source: &RosterSource,
    auth: &dyn Authenticator,
    store: &dyn DriveStore,
    scopes: &Scopes,
) -> Result<String> {
    let location = match source {
        RosterSource::File(path) => return Ok(tokio::fs::read_to_string(path).await?),
        RosterSource::Url(url) => return store.fetch_public_text(url).await,
        RosterSource::DrivePath(p) => DriveLocation::DrivePath(p.clone()),
        RosterSource::ShareLink(l) => DriveLocation::ShareLink(l.clone()),
    };

    auth.ensure_signed_in(scopes).await?;
    let token = auth.bearer_token(scopes).await?;
    let item = graph::resolve(store, &token, &location).await?;
    info!(drive = %item.drive_id, item = %item.item_id, name = ?item.name, "roster resolved");
    store.download_text(&token, &item).await
}

/// Fetch and parse the roster.
#[instrument(level = "info", skip_all, fields(source = %source))]
pub async fn load_roster(
    source: &RosterSource,
    auth: &dyn Authenticator,
    store: &dyn DriveStore,
    scopes: &Scopes,
) -> Result<Roster> {
    let text = fetch_roster_text(source, auth, store, scopes).await?;
    info!(bytes = text.len(), "roster downloaded");
    let roster = Roster::from(parse_records(&text));
    info!(
        records = roster.records.len(),
        issues = roster.issues.len(),
        "roster parsed"
    );
    Ok(roster)
}
