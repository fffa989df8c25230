// src/graph/mod.rs

pub mod client;
pub mod share;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::Result;

pub use client::GraphClient;
pub use share::{decode_share_id, encode_share_id};

/// A resolved file in a drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveItemRef {
    pub drive_id: String,
    pub item_id: String,
    pub name: Option<String>,
}

/// Where a drive-hosted file lives before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveLocation {
    /// A sharing URL, resolved through `/shares/{shareId}`.
    ShareLink(String),
    /// Path relative to the signed-in user's drive root, e.g.
    /// `/Documents/FORMULARIOS/data/dotacion.csv`.
    DrivePath(String),
}

impl fmt::Display for DriveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveLocation::ShareLink(link) => write!(f, "share link {}", link),
            DriveLocation::DrivePath(path) => write!(f, "drive path {}", path),
        }
    }
}

/// The row representation returned by a table append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedRow {
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub values: serde_json::Value,
}

/// The storage operations the roster loader and the submission builder need.
#[async_trait]
pub trait DriveStore: Send + Sync {
    async fn resolve_share(&self, token: &str, link: &str) -> Result<DriveItemRef>;

    async fn item_by_path(&self, token: &str, path: &str) -> Result<DriveItemRef>;

    async fn download_text(&self, token: &str, item: &DriveItemRef) -> Result<String>;

    /// Unauthenticated GET, for rosters published as plain files.
    async fn fetch_public_text(&self, url: &Url) -> Result<String>;

    async fn add_table_row(
        &self,
        token: &str,
        item: &DriveItemRef,
        table: &str,
        values: &[String],
    ) -> Result<CreatedRow>;

    /// Header names of `table`, in column order.
    async fn table_columns(&self, token: &str, item: &DriveItemRef, table: &str)
        -> Result<Vec<String>>;
}

/// Resolve `location` to a drive item through `store`.
pub async fn resolve(
    store: &dyn DriveStore,
    token: &str,
    location: &DriveLocation,
) -> Result<DriveItemRef> {
    match location {
        DriveLocation::ShareLink(link) => store.resolve_share(token, link).await,
        DriveLocation::DrivePath(path) => store.item_by_path(token, path).await,
    }
}
