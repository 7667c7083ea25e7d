//! src/test_support.rs
//! ============================================================================
//! In-memory [`FileTransport`] double used across unit tests. Mimics the
//! backend's observable behavior: content dedup on upload, case-insensitive
//! substring search, category filtering, and 404s for missing ids.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use compact_str::format_compact;
use tokio::time::sleep;

use crate::error::{VaultError, VaultResult};
use crate::model::file_record::FileRecord;
use crate::model::query::QueryKey;
use crate::transport::http_client::FileTransport;

#[derive(Default)]
struct MockState {
    files: Vec<FileRecord>,
    payloads: Vec<Vec<u8>>,
    list_delays: VecDeque<Duration>,
    upload_delay: Option<Duration>,
    edit_delay: Option<Duration>,
    fail_next_list: Option<VaultError>,
    next_id: u64,
    prompts: Vec<(String, String)>,
}

#[derive(Default)]
pub(crate) struct MockVault {
    state: Mutex<MockState>,
    list_calls: AtomicU64,
    upload_calls: AtomicU64,
    edit_calls: AtomicU64,
}

impl MockVault {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert a record directly, bypassing the upload path.
    pub fn seed_record(&self, filename: &str, size: u64, mime: &str) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.files.push(FileRecord {
            id: format_compact!("{id}"),
            original_filename: filename.to_string(),
            size,
            file_type: mime.to_string(),
            file: format!("http://files.test/{id}/{filename}"),
            uploaded_at: None,
            content_hash: None,
        });
    }

    /// Delay applied to the next list calls, one entry per call.
    pub fn push_list_delay(&self, delay: Duration) {
        self.state.lock().unwrap().list_delays.push_back(delay);
    }

    pub fn set_upload_delay(&self, delay: Duration) {
        self.state.lock().unwrap().upload_delay = Some(delay);
    }

    pub fn set_edit_delay(&self, delay: Duration) {
        self.state.lock().unwrap().edit_delay = Some(delay);
    }

    pub fn fail_next_list(&self, error: VaultError) {
        self.state.lock().unwrap().fail_next_list = Some(error);
    }

    pub fn list_snapshot(&self) -> Vec<FileRecord> {
        self.state.lock().unwrap().files.clone()
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().prompts.clone()
    }

    pub fn list_call_count(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn upload_call_count(&self) -> u64 {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn edit_call_count(&self) -> u64 {
        self.edit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileTransport for MockVault {
    async fn upload(&self, filename: &str, payload: Bytes) -> VaultResult<FileRecord> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.state.lock().unwrap().upload_delay;
        if let Some(d) = delay {
            sleep(d).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.payloads.iter().any(|p| p.as_slice() == payload.as_ref()) {
            return Err(VaultError::conflict("This file has already been uploaded."));
        }

        state.next_id += 1;
        let id = state.next_id;
        let record = FileRecord {
            id: format_compact!("{id}"),
            original_filename: filename.to_string(),
            size: payload.len() as u64,
            file_type: mime_guess::from_path(filename)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
            file: format!("http://files.test/{id}/{filename}"),
            uploaded_at: None,
            content_hash: None,
        };
        state.payloads.push(payload.to_vec());
        state.files.push(record.clone());
        Ok(record)
    }

    async fn list(&self, key: &QueryKey) -> VaultResult<Vec<FileRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        // Snapshot at issue time so overlapping calls observe the state the
        // fetch was issued against, like a server would.
        let (snapshot, delay, failure) = {
            let mut state = self.state.lock().unwrap();
            let failure = state.fail_next_list.take();
            let delay = state.list_delays.pop_front().unwrap_or(Duration::ZERO);
            let needle = key.search.to_ascii_lowercase();
            let snapshot: Vec<FileRecord> = state
                .files
                .iter()
                .filter(|f| {
                    let name_hit = needle.is_empty()
                        || f.original_filename.to_ascii_lowercase().contains(&*needle);
                    let type_hit = key
                        .category
                        .as_param()
                        .is_none_or(|t| f.file_type.contains(t));
                    name_hit && type_hit
                })
                .cloned()
                .collect();
            (snapshot, delay, failure)
        };

        if !delay.is_zero() {
            sleep(delay).await;
        }
        if let Some(error) = failure {
            return Err(error);
        }
        Ok(snapshot)
    }

    async fn delete(&self, id: &str) -> VaultResult<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.files.len();
        state.files.retain(|f| f.id != id);
        if state.files.len() == before {
            return Err(VaultError::not_found(id));
        }
        Ok(())
    }

    async fn download(&self, _url: &str, filename: &str, dest_dir: &Path) -> VaultResult<PathBuf> {
        let dest = dest_dir.join(filename);
        tokio::fs::write(&dest, b"downloaded content").await?;
        Ok(dest)
    }

    async fn request_edit(&self, id: &str, prompt: &str) -> VaultResult<()> {
        self.edit_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.state.lock().unwrap().edit_delay;
        if let Some(d) = delay {
            sleep(d).await;
        }

        let mut state = self.state.lock().unwrap();
        if !state.files.iter().any(|f| f.id == id) {
            return Err(VaultError::not_found(id));
        }
        state.prompts.push((id.to_string(), prompt.to_string()));
        Ok(())
    }
}
