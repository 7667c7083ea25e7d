//! src/model/query.rs
//! ============================================================================
//! # Query Keys and Reactive Read State
//!
//! A `QueryKey` identifies one cached list result: the (search, category)
//! pair. `QueryState` is the value subscribers observe through a watch
//! channel; it is replaced wholesale on every applied fetch, never merged.

use std::fmt;
use std::sync::Arc;

use compact_str::CompactString;

use crate::error::VaultError;
use crate::model::file_record::FileRecord;

/// One cached, ordered result page. Shared so republishing a page to many
/// subscribers never clones the records themselves.
pub type FilePage = Arc<Vec<FileRecord>>;

/// Category filter for list queries; `All` maps to an absent query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CategoryFilter {
    #[default]
    All,

    Image,

    Pdf,

    Text,
}

impl CategoryFilter {
    /// Parse a raw filter value; anything unrecognized (including the empty
    /// string) means unfiltered.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "image" => Self::Image,
            "pdf" => Self::Pdf,
            "text" => Self::Text,
            _ => Self::All,
        }
    }

    /// The `type` query-parameter value, or `None` when unfiltered.
    #[must_use]
    pub const fn as_param(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Image => Some("image"),
            Self::Pdf => Some("pdf"),
            Self::Text => Some("text"),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param().unwrap_or("all"))
    }
}

/// Identity of one cached list result set.
///
/// Two keys are equal iff both components match exactly; the empty search
/// term is a valid value meaning "no filter".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QueryKey {
    pub search: CompactString,
    pub category: CategoryFilter,
}

impl QueryKey {
    pub fn new<S: AsRef<str>>(search: S, category: CategoryFilter) -> Self {
        Self {
            search: CompactString::from(search.as_ref()),
            category,
        }
    }

    /// The key for the unconstrained file list.
    #[must_use]
    pub fn unfiltered() -> Self {
        Self::default()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "search={:?} type={}", self.search.as_str(), self.category)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Pending,
    Success,
    Error,
}

/// Reactive read state for one key.
///
/// While a refetch is in flight the previous records are retained alongside
/// the pending status, so consumers can keep rendering stale data instead of
/// flashing an empty list.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub status: QueryStatus,
    pub records: Option<FilePage>,
    pub error: Option<VaultError>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            status: QueryStatus::Pending,
            records: None,
            error: None,
        }
    }
}

impl QueryState {
    #[must_use]
    pub fn success(records: FilePage) -> Self {
        Self {
            status: QueryStatus::Success,
            records: Some(records),
            error: None,
        }
    }

    /// Transition back to pending, keeping whatever data is already present.
    pub fn begin_revalidate(&mut self) {
        self.status = QueryStatus::Pending;
        self.error = None;
    }

    /// Record a failed fetch. Previously fetched records are left in place.
    pub fn fail(&mut self, error: VaultError) {
        self.status = QueryStatus::Error;
        self.error = Some(error);
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.status, QueryStatus::Pending)
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, QueryStatus::Success)
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.as_ref().map_or(0, |r| r.len())
    }
}
