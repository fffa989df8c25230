// src/testing.rs
//
// In-memory collaborators shared by the unit tests.

use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use url::Url;

use crate::{
    auth::{Authenticator, Scopes, Session},
    error::{FormError, Result},
    graph::{CreatedRow, DriveItemRef, DriveStore},
};

/// Always signed in; hands out a fixed token and remembers what was asked.
#[derive(Default)]
pub struct OkAuth {
    pub requested: Mutex<Vec<Scopes>>,
}

#[async_trait]
impl Authenticator for OkAuth {
    async fn ensure_signed_in(&self, _scopes: &Scopes) -> Result<Session> {
        Ok(Session {
            account: Some("analyst@contoso.com".into()),
        })
    }

    async fn bearer_token(&self, scopes: &Scopes) -> Result<String> {
        self.requested.lock().unwrap().push(scopes.clone());
        Ok("test-token".into())
    }
}

/// Never signed in, as if an interactive redirect were pending.
#[derive(Default)]
pub struct FailingAuth {
    pub calls: Mutex<usize>,
}

#[async_trait]
impl Authenticator for FailingAuth {
    async fn ensure_signed_in(&self, scopes: &Scopes) -> Result<Session> {
        *self.calls.lock().unwrap() += 1;
        Err(FormError::auth_required(scopes, "interactive sign-in pending"))
    }

    async fn bearer_token(&self, scopes: &Scopes) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        Err(FormError::auth_required(scopes, "interactive sign-in pending"))
    }
}

/// Drive store serving one CSV and one table, counting every call.
#[derive(Default)]
pub struct MockStore {
    csv: String,
    columns: Vec<String>,
    failing: HashSet<&'static str>,
    calls: Mutex<HashMap<&'static str, usize>>,
    pub appended: Mutex<Vec<(String, Vec<String>)>>,
}

impl MockStore {
    pub fn with_csv(csv: &str) -> Self {
        Self {
            csv: csv.to_string(),
            ..Self::default()
        }
    }

    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Make `op` answer 404.
    pub fn failing_on(mut self, op: &'static str) -> Self {
        self.failing.insert(op);
        self
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn hit(&self, op: &'static str) -> Result<()> {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;
        if self.failing.contains(op) {
            return Err(FormError::ResourceNotFound {
                what: op.to_string(),
                status: 404,
                message: "itemNotFound".into(),
            });
        }
        Ok(())
    }

    fn item(name: &str) -> DriveItemRef {
        DriveItemRef {
            drive_id: "drive-1".into(),
            item_id: format!("item-{}", name),
            name: Some(name.to_string()),
        }
    }
}

#[async_trait]
impl DriveStore for MockStore {
    async fn resolve_share(&self, _token: &str, link: &str) -> Result<DriveItemRef> {
        self.hit("resolve_share")?;
        crate::graph::encode_share_id(link)?;
        Ok(Self::item("shared"))
    }

    async fn item_by_path(&self, _token: &str, path: &str) -> Result<DriveItemRef> {
        self.hit("item_by_path")?;
        Ok(Self::item(path))
    }

    async fn download_text(&self, _token: &str, _item: &DriveItemRef) -> Result<String> {
        self.hit("download_text")?;
        Ok(self.csv.clone())
    }

    async fn fetch_public_text(&self, _url: &Url) -> Result<String> {
        self.hit("fetch_public_text")?;
        Ok(self.csv.clone())
    }

    async fn add_table_row(
        &self,
        _token: &str,
        _item: &DriveItemRef,
        table: &str,
        values: &[String],
    ) -> Result<CreatedRow> {
        self.hit("add_table_row")?;
        let mut appended = self.appended.lock().unwrap();
        appended.push((table.to_string(), values.to_vec()));
        Ok(CreatedRow {
            index: Some(appended.len() as i64 - 1),
            values: serde_json::json!([values]),
        })
    }

    async fn table_columns(
        &self,
        _token: &str,
        _item: &DriveItemRef,
        _table: &str,
    ) -> Result<Vec<String>> {
        self.hit("table_columns")?;
        Ok(self.columns.clone())
    }
}

/// Requests seen by [`serve_http`], as `"METHOD /path"`.
pub type RequestLog = Arc<Mutex<Vec<String>>>;

/// Minimal HTTP/1.1 server on a random local port. `reply` maps a request
/// path to a status and JSON body. Returns the base URL and the request log.
pub async fn serve_http<F>(reply: F) -> (String, RequestLog)
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: RequestLog = Arc::default();
    let seen = log.clone();

    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = sock.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if request_complete(&buf) {
                    break;
                }
            }
            let text = String::from_utf8_lossy(&buf).to_string();
            let mut first = text.lines().next().unwrap_or_default().split_whitespace();
            let method = first.next().unwrap_or_default().to_string();
            let path = first.next().unwrap_or_default().to_string();
            seen.lock().unwrap().push(format!("{} {}", method, path));

            let (status, body) = reply(&path);
            let resp = format!(
                "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = sock.write_all(resp.as_bytes()).await;
            let _ = sock.shutdown().await;
        }
    });
    (format!("http://{}", addr), log)
}

fn request_complete(buf: &[u8]) -> bool {
    let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
    let body_len = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    buf.len() >= end + 4 + body_len
}
