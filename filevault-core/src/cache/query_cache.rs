//! src/cache/query_cache.rs
//! ============================================================================
//! # Keyed, Reactive Cache for File-List Queries
//!
//! One entry per (search, category) key. Subscribers get a watch channel and
//! observe every state transition for that key; result pages live in a moka
//! cache with TTL/TTI/capacity eviction. Guarantees:
//! - Request coalescing: identical concurrent subscriptions share one fetch.
//! - Issue-order wins: a response from an older fetch never overwrites state
//!   already applied by a newer fetch for the same key.
//! - Stale-while-revalidate: previous records stay visible while a refetch
//!   is pending; a failed refetch surfaces the error without dropping them.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use moka::future::Cache;
use tokio::sync::{Mutex, watch};
use tracing::{debug, instrument, warn};

use crate::config::CacheConfig;
use crate::model::query::{FilePage, QueryKey, QueryState};
use crate::transport::http_client::FileTransport;

/// Hit/miss statistics for monitoring and debugging.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    coalesced: AtomicU64,
    total_load_time_ns: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    #[expect(clippy::cast_possible_truncation, reason = "Expected accuracy")]
    fn record_load(&self, duration: Duration, success: bool) {
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.total_load_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);

        if !success {
            self.load_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> CacheStatsSnapshot {
        let loads: u64 = self.loads.load(Ordering::Relaxed);
        let total_load_time_ns: u64 = self.total_load_time_ns.load(Ordering::Relaxed);

        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads,
            load_failures: self.load_failures.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            average_load_penalty: if loads > 0 {
                Duration::from_nanos(total_load_time_ns / loads)
            } else {
                Duration::ZERO
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub coalesced: u64,
    pub average_load_penalty: Duration,
}

impl CacheStatsSnapshot {
    #[expect(clippy::cast_precision_loss, reason = "Expected precision loss")]
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Fetch bookkeeping for one key.
///
/// `issued`/`applied` are per-key sequence numbers: every fetch takes the
/// next `issued` value when it starts, and may only publish its outcome if
/// no higher sequence has been applied yet.
#[derive(Debug)]
struct FetchState {
    issued: u64,
    applied: u64,
    inflight: bool,
}

#[derive(Debug)]
struct SubEntry {
    tx: watch::Sender<QueryState>,
    fetch: Mutex<FetchState>,
}

impl SubEntry {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(QueryState::default());

        Self {
            tx,
            fetch: Mutex::new(FetchState {
                issued: 0,
                applied: 0,
                inflight: false,
            }),
        }
    }
}

/// Keyed, debounce-agnostic read cache for the file list.
///
/// Cheap to clone; clones share all state. Lifecycle is owned by whoever
/// constructs it, there is no global instance.
#[derive(Clone)]
pub struct QueryCache {
    transport: Arc<dyn FileTransport>,
    pages: Cache<QueryKey, FilePage>,
    subs: Arc<DashMap<QueryKey, Arc<SubEntry>>>,
    stats: Arc<CacheStats>,
    enable_stats: bool,
}

impl QueryCache {
    #[must_use]
    pub fn new(transport: Arc<dyn FileTransport>, config: &CacheConfig) -> Self {
        let pages: Cache<QueryKey, FilePage> = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl)
            .time_to_idle(config.tti)
            .build();

        Self {
            transport,
            pages,
            subs: Arc::new(DashMap::new()),
            stats: Arc::new(CacheStats::default()),
            enable_stats: config.enable_stats,
        }
    }

    /// Subscribe to the list state for `key`.
    ///
    /// The receiver starts on the current state (pending on first
    /// subscription) and is notified on every transition. Dropping every
    /// receiver for a key unsubscribes it; the entry is pruned lazily.
    pub fn subscribe(&self, key: QueryKey) -> watch::Receiver<QueryState> {
        self.prune_unwatched();

        let entry: Arc<SubEntry> = self
            .subs
            .entry(key.clone())
            .or_insert_with(|| Arc::new(SubEntry::new()))
            .clone();
        let rx = entry.tx.subscribe();

        self.spawn_refresh(key, entry, false);
        rx
    }

    /// Drop every cached page and refetch all currently-watched keys.
    ///
    /// Called by the mutation layer after any successful write: uploads,
    /// deletes, and edits can change any search/filter result, so every key
    /// is affected. Subscribers observe pending (stale data retained), then
    /// success or error.
    #[instrument(skip(self))]
    pub fn invalidate_all(&self) {
        self.pages.invalidate_all();
        self.prune_unwatched();

        let watched: Vec<(QueryKey, Arc<SubEntry>)> = self
            .subs
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        debug!(watched = watched.len(), "invalidated result pages");
        for (key, entry) in watched {
            self.spawn_refresh(key, entry, true);
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of keys with at least one live subscriber.
    #[must_use]
    pub fn watched_keys(&self) -> usize {
        self.subs
            .iter()
            .filter(|e| e.value().tx.receiver_count() > 0)
            .count()
    }

    fn prune_unwatched(&self) {
        self.subs.retain(|_, entry| entry.tx.receiver_count() > 0);
    }

    fn spawn_refresh(&self, key: QueryKey, entry: Arc<SubEntry>, revalidate: bool) {
        let cache: Self = self.clone();
        tokio::spawn(async move {
            cache.refresh(key, entry, revalidate).await;
        });
    }

    /// Fetch the list for one key and publish the outcome.
    ///
    /// `revalidate` forces a network fetch (invalidation path) and is allowed
    /// to supersede an outstanding fetch; a plain subscription attaches to
    /// whatever is already in flight instead of issuing a duplicate call.
    async fn refresh(self, key: QueryKey, entry: Arc<SubEntry>, revalidate: bool) {
        let seq: u64 = {
            let mut fetch = entry.fetch.lock().await;
            if fetch.inflight && !revalidate {
                if self.enable_stats {
                    self.stats.record_coalesced();
                }
                return;
            }
            fetch.inflight = true;
            fetch.issued += 1;
            fetch.issued
        };

        // Fast path: serve a cached page without touching the network.
        if !revalidate {
            if let Some(records) = self.pages.get(&key).await {
                if self.enable_stats {
                    self.stats.record_hit();
                }

                let mut fetch = entry.fetch.lock().await;
                if seq == fetch.issued {
                    fetch.inflight = false;
                }
                if seq > fetch.applied {
                    fetch.applied = seq;
                    let already_published: bool = entry.tx.borrow().is_success();
                    if !already_published {
                        entry.tx.send_replace(QueryState::success(records));
                    }
                }
                return;
            }

            if self.enable_stats {
                self.stats.record_miss();
            }
        }

        let already_pending: bool = entry.tx.borrow().is_pending();
        if !already_pending {
            entry.tx.send_modify(QueryState::begin_revalidate);
        }

        debug!(key = %key, seq, "fetching file list");
        let started: Instant = Instant::now();
        let result = self.transport.list(&key).await;
        if self.enable_stats {
            self.stats.record_load(started.elapsed(), result.is_ok());
        }

        let mut fetch = entry.fetch.lock().await;
        if seq == fetch.issued {
            fetch.inflight = false;
        }
        if seq <= fetch.applied {
            debug!(key = %key, seq, applied = fetch.applied, "discarding superseded response");
            return;
        }
        fetch.applied = seq;

        match result {
            Ok(records) => {
                let records: FilePage = Arc::new(records);
                self.pages.insert(key.clone(), Arc::clone(&records)).await;
                debug!(key = %key, count = records.len(), "list applied");
                entry.tx.send_replace(QueryState::success(records));
            }
            Err(e) => {
                warn!(key = %key, error = %e, "file list fetch failed");
                entry.tx.send_modify(|state| state.fail(e));
            }
        }
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("pages", &self.pages.entry_count())
            .field("watched_keys", &self.watched_keys())
            .finish()
    }
}
