// src/graph/client.rs

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use super::{share::encode_share_id, CreatedRow, DriveItemRef, DriveStore};
use crate::error::{FormError, Result};

pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveItem {
    id: String,
    name: Option<String>,
    parent_reference: Option<ParentReference>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParentReference {
    drive_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: GraphErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ColumnList {
    value: Vec<TableColumn>,
}

#[derive(Debug, Deserialize)]
struct TableColumn {
    name: String,
    index: Option<i64>,
}

/// Microsoft Graph implementation of [`DriveStore`].
#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    base: Url,
}

impl GraphClient {
    pub fn new(http: Client, base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            FormError::MalformedLink {
                link: base_url.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { http, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    async fn get(&self, url: Url, token: Option<&str>, what: &str) -> Result<Response> {
        debug!(%url, "GET");
        let mut req = self.http.get(url);
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        check(req.send().await?, what).await
    }

    async fn get_item(&self, url: Url, token: &str, what: &str) -> Result<DriveItemRef> {
        let resp = self.get(url, Some(token), what).await?;
        let item: DriveItem = json_body(resp, what).await?;
        into_item_ref(item, what)
    }
}

#[async_trait]
impl DriveStore for GraphClient {
    #[instrument(level = "info", skip(self, token))]
    async fn resolve_share(&self, token: &str, link: &str) -> Result<DriveItemRef> {
        let share_id = encode_share_id(link)?;
        let url = with_segments(&self.base, &["shares", &share_id, "driveItem"]);
        self.get_item(url, token, "shared link").await
    }

    #[instrument(level = "info", skip(self, token))]
    async fn item_by_path(&self, token: &str, path: &str) -> Result<DriveItemRef> {
        let url = path_item_url(&self.base, path)?;
        self.get_item(url, token, &format!("drive path {}", path))
            .await
    }

    #[instrument(level = "info", skip(self, token, item), fields(item = %item.item_id))]
    async fn download_text(&self, token: &str, item: &DriveItemRef) -> Result<String> {
        let url = item_url(&self.base, item, &["content"]);
        let text = self
            .get(url, Some(token), "file download")
            .await?
            .text()
            .await?;
        debug!(bytes = text.len(), "downloaded");
        Ok(text)
    }

    #[instrument(level = "info", skip(self))]
    async fn fetch_public_text(&self, url: &Url) -> Result<String> {
        Ok(self.get(url.clone(), None, url.as_str()).await?.text().await?)
    }

    #[instrument(level = "info", skip(self, token, item, values), fields(item = %item.item_id, cells = values.len()))]
    async fn add_table_row(
        &self,
        token: &str,
        item: &DriveItemRef,
        table: &str,
        values: &[String],
    ) -> Result<CreatedRow> {
        let url = item_url(&self.base, item, &["workbook", "tables", table, "rows", "add"]);
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&rows_add_body(values))
            .send()
            .await?;
        let resp = check(resp, "row insert").await?;
        json_body(resp, "row insert").await
    }

    #[instrument(level = "info", skip(self, token, item), fields(item = %item.item_id))]
    async fn table_columns(
        &self,
        token: &str,
        item: &DriveItemRef,
        table: &str,
    ) -> Result<Vec<String>> {
        let url = item_url(&self.base, item, &["workbook", "tables", table, "columns"]);
        let what = format!("table {}", table);
        let resp = self.get(url, Some(token), &what).await?;
        let mut list: ColumnList = json_body(resp, &what).await?;
        list.value.sort_by_key(|c| c.index.unwrap_or(i64::MAX));
        Ok(list.value.into_iter().map(|c| c.name).collect())
    }
}

/// Read a success body as JSON. Transport failures stay `Network`; a body
/// of the wrong shape is `Decode`.
pub(crate) async fn json_body<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| FormError::Decode {
        what: what.to_string(),
        reason: e.to_string(),
    })
}

/// Map a non-success response to the error kinds callers distinguish.
async fn check(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(status_error(status, what, &body))
}

fn status_error(status: StatusCode, what: &str, body: &str) -> FormError {
    let message = graph_error_message(status, body);
    if status == StatusCode::NOT_FOUND {
        FormError::ResourceNotFound {
            what: what.to_string(),
            status: status.as_u16(),
            message,
        }
    } else {
        FormError::Http {
            what: what.to_string(),
            status: status.as_u16(),
            message,
        }
    }
}

fn graph_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(GraphErrorBody { error }) = serde_json::from_str::<GraphErrorBody>(body) {
        match (error.code, error.message) {
            (Some(c), Some(m)) => return format!("{}: {}", c, m),
            (None, Some(m)) | (Some(m), None) => return m,
            (None, None) => {}
        }
    }
    let body = body.trim();
    if body.is_empty() {
        status.canonical_reason().unwrap_or("no response body").to_string()
    } else {
        body.to_string()
    }
}

fn into_item_ref(item: DriveItem, what: &str) -> Result<DriveItemRef> {
    let drive_id = item
        .parent_reference
        .and_then(|p| p.drive_id)
        .ok_or_else(|| FormError::Decode {
            what: what.to_string(),
            reason: "drive item has no parentReference.driveId".into(),
        })?;
    Ok(DriveItemRef {
        drive_id,
        item_id: item.id,
        name: item.name,
    })
}

fn with_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn item_url(base: &Url, item: &DriveItemRef, tail: &[&str]) -> Url {
    let mut segments = vec!["drives", item.drive_id.as_str(), "items", item.item_id.as_str()];
    segments.extend_from_slice(tail);
    with_segments(base, &segments)
}

/// `{base}/me/drive/root:{path}`; the path keeps its slashes.
fn path_item_url(base: &Url, path: &str) -> Result<Url> {
    let path = path.trim();
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    let raw = format!("{}/me/drive/root:{}", base.as_str().trim_end_matches('/'), path);
    Url::parse(&raw).map_err(|e| FormError::MalformedLink {
        link: raw.clone(),
        reason: e.to_string(),
    })
}

fn rows_add_body(values: &[String]) -> serde_json::Value {
    json!({ "values": [values] })
}
