use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, header};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{BlobEntry, BlobError, BlobStore, Result, url_key, validate_key};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const LIST_PAGE_SIZE: u32 = 1000;

/// Client for a remote object store with public-URL blobs.
///
/// Wire contract (same shape as Vercel Blob):
/// - `PUT {endpoint}/{key}` with the raw body → `{"url": "..."}`
/// - `POST {endpoint}/delete` with `{"urls": [...]}`
/// - `GET {endpoint}?limit=N&cursor=C` → `{"blobs": [{"url", "uploadedAt"}], "cursor", "hasMore"}`
///
/// Every request carries `Authorization: Bearer {token}`.
pub struct HttpBlobStore {
    client: Client,
    endpoint: String,
    token: String,
}

#[derive(Deserialize)]
struct PutResponse {
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    blobs: Vec<ListedBlob>,
    cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedBlob {
    url: String,
    uploaded_at: DateTime<Utc>,
}

impl HttpBlobStore {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }
}

/// Turn a non-2xx response into `BlobError::Rejected`.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BlobError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String> {
        validate_key(key)?;
        let size = data.len();

        let resp = self
            .client
            .put(format!("{}/{}", self.endpoint, key))
            .bearer_auth(&self.token)
            .header(header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;
        let put: PutResponse = check(resp).await?.json().await?;

        info!("Uploaded blob {} ({} bytes) -> {}", key, size, put.url);
        Ok(put.url)
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/delete", self.endpoint))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "urls": [url] }))
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            warn!("Blob {} already gone", url);
            return Ok(());
        }
        check(resp).await?;
        info!("Deleted blob {}", url);
        Ok(())
    }

    async fn list(&self) -> Result<Option<Vec<BlobEntry>>> {
        let mut blobs = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut req = self
                .client
                .get(&self.endpoint)
                .bearer_auth(&self.token)
                .query(&[("limit", LIST_PAGE_SIZE.to_string())]);
            if let Some(c) = &cursor {
                req = req.query(&[("cursor", c)]);
            }

            let page: ListResponse = check(req.send().await?).await?.json().await?;
            for b in page.blobs {
                let Some(key) = url_key(&b.url).map(str::to_string) else {
                    warn!("Listed blob {} has no usable key, skipping", b.url);
                    continue;
                };
                blobs.push(BlobEntry {
                    key,
                    url: b.url,
                    modified: SystemTime::from(b.uploaded_at),
                });
            }

            match (page.has_more, page.cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(Some(blobs))
    }
}
