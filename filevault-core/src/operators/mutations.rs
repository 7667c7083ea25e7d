//! src/operators/mutations.rs
//! ============================================================================
//! # Mutation Runner: Sequenced Writes with Pending-State Tracking
//!
//! Wraps every write operation (upload, delete, download, edit request) with
//! a watch-published [`MutationState`] so consumers can disable the matching
//! affordance while a call is pending. A successful write that changes the
//! file set invalidates the whole query cache; a failed one leaves cached
//! data untouched and is never retried automatically.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use compact_str::CompactString;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::cache::query_cache::QueryCache;
use crate::error::{VaultError, VaultResult};
use crate::model::file_record::FileRecord;
use crate::model::mutation::MutationState;
use crate::transport::http_client::FileTransport;
use crate::util::humanize::human_size;

pub struct MutationRunner {
    transport: Arc<dyn FileTransport>,
    cache: QueryCache,
    upload_tx: watch::Sender<MutationState>,
    delete_tx: watch::Sender<MutationState>,
    download_tx: watch::Sender<MutationState>,
    /// Edit state per file id; edits to different files run independently.
    edits: DashMap<CompactString, Arc<watch::Sender<MutationState>>>,
}

impl MutationRunner {
    #[must_use]
    pub fn new(transport: Arc<dyn FileTransport>, cache: QueryCache) -> Self {
        Self {
            transport,
            cache,
            upload_tx: watch::channel(MutationState::idle()).0,
            delete_tx: watch::channel(MutationState::idle()).0,
            download_tx: watch::channel(MutationState::idle()).0,
            edits: DashMap::new(),
        }
    }

    pub fn upload_state(&self) -> watch::Receiver<MutationState> {
        self.upload_tx.subscribe()
    }

    pub fn delete_state(&self) -> watch::Receiver<MutationState> {
        self.delete_tx.subscribe()
    }

    pub fn download_state(&self) -> watch::Receiver<MutationState> {
        self.download_tx.subscribe()
    }

    pub fn edit_state(&self, id: &str) -> watch::Receiver<MutationState> {
        self.edit_entry(id).subscribe()
    }

    /// Upload raw content under its original filename.
    ///
    /// Validation happens before any state transition or network call; the
    /// server answers duplicates with a conflict, surfaced unchanged.
    #[instrument(skip(self, payload), fields(filename = %filename, size = %human_size(payload.len() as u64)))]
    pub async fn upload(&self, filename: &str, payload: Bytes) -> VaultResult<FileRecord> {
        if filename.trim().is_empty() {
            return Err(VaultError::validation("file", "Please select a file"));
        }
        if payload.is_empty() {
            return Err(VaultError::validation("file", "Selected file is empty"));
        }

        let record = self
            .run(&self.upload_tx, self.transport.upload(filename, payload), true)
            .await?;
        info!(id = %record.id, "file uploaded");
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> VaultResult<()> {
        self.run(&self.delete_tx, self.transport.delete(id), true)
            .await
    }

    /// Save the record's content under its original filename in `dest_dir`.
    /// Pure read; does not invalidate the cache.
    #[instrument(skip(self, record), fields(id = %record.id))]
    pub async fn download(&self, record: &FileRecord, dest_dir: &Path) -> VaultResult<PathBuf> {
        self.run(
            &self.download_tx,
            self.transport
                .download(&record.file, &record.original_filename, dest_dir),
            false,
        )
        .await
    }

    /// Submit an AI edit instruction for one file.
    ///
    /// Success is an acknowledgment only; the edited content shows up through
    /// a later refetch. One edit per file id may be pending at a time, while
    /// edits to different ids run in parallel.
    #[instrument(skip(self, prompt))]
    pub async fn request_edit(&self, id: &str, prompt: &str) -> VaultResult<()> {
        if prompt.trim().is_empty() {
            return Err(VaultError::validation("prompt", "Describe the change first"));
        }

        let tx: Arc<watch::Sender<MutationState>> = {
            let entry = self
                .edits
                .entry(CompactString::from(id))
                .or_insert_with(|| Arc::new(watch::channel(MutationState::idle()).0));
            if entry.borrow().is_pending() {
                return Err(VaultError::validation(
                    "edit",
                    "An edit for this file is already in progress",
                ));
            }
            entry.send_replace(MutationState::pending());
            Arc::clone(entry.value())
        };

        match self.transport.request_edit(id, prompt).await {
            Ok(()) => {
                tx.send_replace(MutationState::succeeded());
                self.cache.invalidate_all();
                // The accepted request consumed its prompt; reset the
                // per-file state so the affordance is usable again.
                self.edits.remove(id);
                info!(id, "edit request accepted");
                Ok(())
            }
            Err(e) => {
                warn!(id, error = %e, "edit request failed");
                tx.send_replace(MutationState::failed(e.clone()));
                Err(e)
            }
        }
    }

    fn edit_entry(&self, id: &str) -> Arc<watch::Sender<MutationState>> {
        self.edits
            .entry(CompactString::from(id))
            .or_insert_with(|| Arc::new(watch::channel(MutationState::idle()).0))
            .clone()
    }

    /// Drive one write: pending is published synchronously before the first
    /// suspension point, then the outcome, then (for set-changing writes) the
    /// cache invalidation.
    async fn run<T, F>(
        &self,
        tx: &watch::Sender<MutationState>,
        op: F,
        invalidates: bool,
    ) -> VaultResult<T>
    where
        F: Future<Output = VaultResult<T>>,
    {
        tx.send_replace(MutationState::pending());

        match op.await {
            Ok(value) => {
                tx.send_replace(MutationState::succeeded());
                if invalidates {
                    self.cache.invalidate_all();
                }
                Ok(value)
            }
            Err(e) => {
                warn!(error = %e, "mutation failed");
                tx.send_replace(MutationState::failed(e.clone()));
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for MutationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationRunner")
            .field("pending_edits", &self.edits.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::model::mutation::MutationStatus;
    use crate::model::query::{CategoryFilter, QueryKey};
    use crate::test_support::MockVault;
    use std::time::Duration;
    use tokio::time::sleep;

    fn runner_over(mock: &Arc<MockVault>) -> MutationRunner {
        let transport = Arc::clone(mock) as Arc<dyn FileTransport>;
        let cache = QueryCache::new(Arc::clone(&transport), &CacheConfig::default());
        MutationRunner::new(transport, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_then_search_returns_record_exactly_once() {
        let mock = MockVault::new();
        let runner = runner_over(&mock);

        let record = runner
            .upload("report.pdf", Bytes::from_static(&[7u8; 2048]))
            .await
            .unwrap();
        assert_eq!(record.original_filename, "report.pdf");
        assert_eq!(record.size, 2048);
        assert_eq!(record.file_type, "application/pdf");

        let rx = runner.cache.subscribe(QueryKey::new("report", CategoryFilter::All));
        sleep(Duration::from_millis(10)).await;

        let state = rx.borrow().clone();
        let records = state.records.as_ref().unwrap();
        let matches = records.iter().filter(|r| r.id == record.id).count();
        assert_eq!(matches, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_upload_conflicts_and_leaves_list_unchanged() {
        let mock = MockVault::new();
        let runner = runner_over(&mock);
        let payload = Bytes::from_static(b"identical bytes");

        runner.upload("report.pdf", payload.clone()).await.unwrap();
        let err = runner.upload("report.pdf", payload).await.unwrap_err();

        assert!(err.is_conflict());
        assert!(err.user_message().contains("Duplicate detected"));
        assert_eq!(runner.upload_state().borrow().status, MutationStatus::Error);

        let listed = mock.list_snapshot();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_is_observed_and_second_delete_is_not_found() {
        let mock = MockVault::new();
        let runner = runner_over(&mock);

        let record = runner
            .upload("old.txt", Bytes::from_static(b"bytes"))
            .await
            .unwrap();

        runner.delete(&record.id).await.unwrap();
        assert!(mock.list_snapshot().is_empty());

        let err = runner.delete(&record.id).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(runner.delete_state().borrow().status, MutationStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_short_circuits_before_any_network_call() {
        let mock = MockVault::new();
        let runner = runner_over(&mock);

        let err = runner.upload("", Bytes::from_static(b"x")).await.unwrap_err();
        assert!(matches!(err, VaultError::Validation { .. }));

        let err = runner.upload("a.txt", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, VaultError::Validation { .. }));

        let err = runner.request_edit("1", "   ").await.unwrap_err();
        assert!(matches!(err, VaultError::Validation { .. }));

        assert_eq!(mock.upload_call_count(), 0);
        assert_eq!(mock.edit_call_count(), 0);
        // No state transition happened either: the affordance stays idle.
        assert_eq!(runner.upload_state().borrow().status, MutationStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_is_published_before_the_call_completes() {
        let mock = MockVault::new();
        mock.set_upload_delay(Duration::from_millis(50));
        let runner = runner_over(&mock);

        let (result, ()) = tokio::join!(
            runner.upload("slow.txt", Bytes::from_static(b"payload")),
            async {
                sleep(Duration::from_millis(1)).await;
                assert!(runner.upload_state().borrow().is_pending());
            }
        );

        result.unwrap();
        assert_eq!(
            runner.upload_state().borrow().status,
            MutationStatus::Success
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_acks_without_changing_the_list_synchronously() {
        let mock = MockVault::new();
        let runner = runner_over(&mock);

        let record = runner
            .upload("cat.png", Bytes::from_static(b"png bytes"))
            .await
            .unwrap();
        let rx = runner.cache.subscribe(QueryKey::unfiltered());
        sleep(Duration::from_millis(10)).await;
        let before = mock.list_call_count();

        runner.request_edit(&record.id, "add a hat").await.unwrap();

        assert_eq!(mock.prompts(), vec![(record.id.to_string(), "add a hat".to_string())]);
        assert_eq!(mock.list_snapshot().len(), 1);

        // The acceptance invalidated the cache: the watched key refetches in
        // the background.
        sleep(Duration::from_millis(10)).await;
        assert!(mock.list_call_count() > before);
        assert!(rx.borrow().is_success());

        // Transient per-file state was cleared on success.
        assert_eq!(
            runner.edit_state(&record.id).borrow().status,
            MutationStatus::Idle
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_edits_same_id_rejected_other_ids_independent() {
        let mock = MockVault::new();
        mock.set_edit_delay(Duration::from_millis(50));
        let runner = runner_over(&mock);

        let first = runner
            .upload("a.png", Bytes::from_static(b"a"))
            .await
            .unwrap();
        let second = runner
            .upload("b.png", Bytes::from_static(b"b"))
            .await
            .unwrap();

        let (r1, r2, r3) = tokio::join!(
            runner.request_edit(&first.id, "brighten"),
            async {
                sleep(Duration::from_millis(1)).await;
                runner.request_edit(&first.id, "darken").await
            },
            async {
                sleep(Duration::from_millis(1)).await;
                runner.request_edit(&second.id, "crop").await
            }
        );

        r1.unwrap();
        let err = r2.unwrap_err();
        assert!(matches!(err, VaultError::Validation { .. }));
        r3.unwrap();

        // Only the first and the independent edit reached the transport.
        assert_eq!(mock.edit_call_count(), 2);
    }
}
