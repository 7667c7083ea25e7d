//! # filevault-core - Client Core for a File Vault Service
//!
//! Typed async client for a deduplicating file vault backend: upload,
//! list/search/filter, download, delete, and server-side AI image edits,
//! plus the client-side state machine around those calls.
//!
//! ## Key Features
//! - Keyed, reactive query cache with request coalescing
//! - Issue-order response application (stale responses never win)
//! - Stale-while-revalidate refetching on mutation-driven invalidation
//! - Trailing-edge search debouncing
//! - Closed error taxonomy with user-facing messages

pub mod error;

pub mod config;

pub mod cache {
    pub mod query_cache;
    pub use query_cache::{CacheStats, CacheStatsSnapshot, QueryCache};
}

pub mod model {
    pub mod file_record;
    pub use file_record::{FileCategory, FileRecord, ListPayload};

    pub mod query;
    pub use query::{CategoryFilter, FilePage, QueryKey, QueryState, QueryStatus};

    pub mod mutation;
    pub use mutation::{MutationState, MutationStatus};
}

pub mod transport {
    pub mod http_client;
    pub use http_client::{FileTransport, HttpTransport};
}

pub mod operators {
    pub mod mutations;
    pub use mutations::MutationRunner;
}

pub mod util {
    pub mod debounce;
    pub use debounce::{DebounceConfig, Debouncer};

    pub mod humanize;
}

pub mod logging;
pub use logging::Logger;

pub mod client;
pub use client::VaultClient;

pub use config::{Config, Theme};
pub use error::{VaultError, VaultResult};

#[cfg(test)]
pub(crate) mod test_support;
