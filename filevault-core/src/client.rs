//! src/client.rs
//! ============================================================================
//! # `VaultClient`: Wiring for the Whole Stack
//!
//! Builds the transport from configuration and hands out the query cache,
//! mutation runner, and a search debouncer. Control flow through the layers:
//!
//! input -> debouncer -> query cache (keyed fetch) -> transport
//! action -> mutation runner -> transport -> cache invalidation -> refetch

use std::path::{Path, PathBuf};
use std::sync::Arc;

use directories::UserDirs;
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::cache::query_cache::QueryCache;
use crate::config::Config;
use crate::error::VaultResult;
use crate::model::file_record::FileRecord;
use crate::model::query::{QueryKey, QueryState};
use crate::operators::mutations::MutationRunner;
use crate::transport::http_client::{FileTransport, HttpTransport};
use crate::util::debounce::Debouncer;

pub struct VaultClient {
    config: Config,
    cache: QueryCache,
    mutations: MutationRunner,
}

impl VaultClient {
    /// Build a client talking HTTP to the configured backend.
    pub fn connect(config: Config) -> VaultResult<Self> {
        let transport = HttpTransport::new(&config.api_base_url, config.request_timeout)?;
        info!(base_url = %config.api_base_url, "vault client ready");
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build a client over any transport implementation.
    #[must_use]
    pub fn with_transport(config: Config, transport: Arc<dyn FileTransport>) -> Self {
        let cache = QueryCache::new(Arc::clone(&transport), &config.cache);
        let mutations = MutationRunner::new(transport, cache.clone());

        Self {
            config,
            cache,
            mutations,
        }
    }

    /// Reactive file-list state for one (search, category) key.
    pub fn subscribe(&self, key: QueryKey) -> watch::Receiver<QueryState> {
        self.cache.subscribe(key)
    }

    /// A debouncer pre-configured with this client's quiet period, for
    /// feeding rapidly-changing search input into [`Self::subscribe`].
    #[must_use]
    pub fn search_input(&self) -> (Debouncer<QueryKey>, mpsc::UnboundedReceiver<QueryKey>) {
        Debouncer::new(self.config.debounce.clone())
    }

    /// Save a record's content into the configured download directory.
    pub async fn download(&self, record: &FileRecord) -> VaultResult<PathBuf> {
        let dest: PathBuf = self.download_dir();
        self.mutations.download(record, &dest).await
    }

    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    #[must_use]
    pub fn mutations(&self) -> &MutationRunner {
        &self.mutations
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    fn download_dir(&self) -> PathBuf {
        self.config
            .download_dir
            .clone()
            .or_else(|| {
                UserDirs::new().and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
            })
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("api_base_url", &self.config.api_base_url)
            .field("cache", &self.cache)
            .finish()
    }
}
