//! src/transport/http_client.rs
//! ============================================================================
//! # Transport Client: HTTP Glue for the Vault Backend
//!
//! Five request/response operations against a single base endpoint. The rest
//! of the crate talks to the [`FileTransport`] trait so the cache and
//! mutation layers can be exercised against an in-memory double; the reqwest
//! implementation lives here and is the only place raw HTTP errors are
//! translated into the crate's error taxonomy.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode, multipart};
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::error::{VaultError, VaultResult};
use crate::model::file_record::{FileRecord, ListPayload};
use crate::model::query::QueryKey;

/// Outbound operations against the vault backend.
#[async_trait]
pub trait FileTransport: Send + Sync {
    /// POST the raw content as multipart form data; the server assigns the
    /// record identity and rejects duplicate content with a conflict.
    async fn upload(&self, filename: &str, payload: Bytes) -> VaultResult<FileRecord>;

    /// Fetch the file list for one (search, category) key, server order.
    async fn list(&self, key: &QueryKey) -> VaultResult<Vec<FileRecord>>;

    async fn delete(&self, id: &str) -> VaultResult<()>;

    /// Stream the content at `url` to disk under `filename` inside
    /// `dest_dir`, returning the written path.
    async fn download(&self, url: &str, filename: &str, dest_dir: &Path) -> VaultResult<PathBuf>;

    /// Submit a natural-language edit instruction for a stored image. Success
    /// means the request was accepted, not that editing completed.
    async fn request_edit(&self, id: &str, prompt: &str) -> VaultResult<()>;
}

/// Error body shape used by the backend for non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct EditRequest<'a> {
    prompt: &'a str,
}

/// reqwest-backed [`FileTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new<S: AsRef<str>>(base_url: S, timeout: Duration) -> VaultResult<Self> {
        let client: Client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
        })
    }

    fn files_url(&self) -> String {
        format!("{}/files/", self.base_url)
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}/files/{id}/", self.base_url)
    }

    fn edit_url(&self, id: &str) -> String {
        format!("{}/files/{id}/edit/", self.base_url)
    }

    /// Pass 2xx responses through; translate everything else.
    async fn check(resp: Response, id: Option<&str>) -> VaultResult<Response> {
        let status: StatusCode = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body: String = resp.text().await.unwrap_or_default();
        Err(map_status(status, &parse_error_detail(&body), id))
    }
}

/// Translate a non-success status into the closed taxonomy.
fn map_status(status: StatusCode, detail: &str, id: Option<&str>) -> VaultError {
    match status {
        StatusCode::CONFLICT => {
            let detail = if detail.is_empty() {
                "duplicate content detected"
            } else {
                detail
            };
            VaultError::conflict(detail)
        }
        StatusCode::NOT_FOUND => VaultError::not_found(id.unwrap_or("unknown")),
        _ => {
            let message = if detail.is_empty() {
                status.to_string()
            } else {
                detail.to_string()
            };
            VaultError::transport(Some(status.as_u16()), message)
        }
    }
}

/// Pull the `error` field out of a JSON error body, falling back to the raw
/// text for non-JSON responses.
fn parse_error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Keep only the final path component so a hostile filename cannot escape the
/// destination directory.
fn sanitize_filename(name: &str) -> String {
    let candidate: &str = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();

    if candidate.is_empty() || candidate == "." || candidate == ".." {
        "download".to_string()
    } else {
        candidate.to_string()
    }
}

#[async_trait]
impl FileTransport for HttpTransport {
    #[instrument(skip(self, payload), fields(filename = %filename, bytes = payload.len()))]
    async fn upload(&self, filename: &str, payload: Bytes) -> VaultResult<FileRecord> {
        let mime = mime_guess::from_path(filename).first_or_octet_stream();
        let part = multipart::Part::bytes(payload.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime.essence_str())?;
        let form = multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(self.files_url())
            .multipart(form)
            .send()
            .await?;
        let resp = Self::check(resp, None).await?;

        let record: FileRecord = resp.json().await?;
        debug!(id = %record.id, "upload accepted");
        Ok(record)
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn list(&self, key: &QueryKey) -> VaultResult<Vec<FileRecord>> {
        let mut params: Vec<(&str, &str)> = Vec::new();
        if !key.search.is_empty() {
            params.push(("search", key.search.as_str()));
        }
        if let Some(category) = key.category.as_param() {
            params.push(("type", category));
        }

        let mut req = self.client.get(self.files_url());
        if !params.is_empty() {
            req = req.query(&params);
        }

        let resp = Self::check(req.send().await?, None).await?;
        let payload: ListPayload = resp.json().await?;
        Ok(payload.into_records())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> VaultResult<()> {
        let resp = self.client.delete(self.file_url(id)).send().await?;
        Self::check(resp, Some(id)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(url = %url, filename = %filename))]
    async fn download(&self, url: &str, filename: &str, dest_dir: &Path) -> VaultResult<PathBuf> {
        let resp = Self::check(self.client.get(url).send().await?, None).await?;

        TokioFs::create_dir_all(dest_dir).await?;
        let dest: PathBuf = dest_dir.join(sanitize_filename(filename));

        let mut file = TokioFs::File::create(&dest).await?;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        debug!(path = %dest.display(), "download saved");
        Ok(dest)
    }

    #[instrument(skip(self, prompt))]
    async fn request_edit(&self, id: &str, prompt: &str) -> VaultResult<()> {
        let resp = self
            .client
            .post(self.edit_url(id))
            .json(&EditRequest { prompt })
            .send()
            .await?;
        Self::check(resp, Some(id)).await?;
        Ok(())
    }
}
