//! src/model/file_record.rs
//! ============================================================================
//! # `FileRecord`: Client-Visible Metadata for One Stored File
//!
//! Mirrors the server's wire shape exactly. Records are owned by the backend
//! and immutable from the client's perspective; the only way they change is
//! through a delete or a completed edit, both of which are observed via a
//! fresh list fetch.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::util::humanize::human_size;

/// Coarse content category derived from the MIME type.
///
/// The server keeps the authoritative MIME string; this derivation only
/// drives client-side affordances (e.g. whether the AI edit control applies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileCategory {
    Image,

    Pdf,

    Text,

    #[default]
    Other,
}

impl FileCategory {
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        let mime: String = mime.trim().to_ascii_lowercase();

        if mime.starts_with("image/") {
            Self::Image
        } else if mime.contains("pdf") {
            Self::Pdf
        } else if mime.starts_with("text/") {
            Self::Text
        } else {
            Self::Other
        }
    }
}

/// One stored file as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Server-assigned unique identifier.
    pub id: CompactString,

    pub original_filename: String,

    /// Size in bytes.
    pub size: u64,

    /// MIME type string (e.g. `application/pdf`).
    pub file_type: String,

    /// Download URL for the stored content.
    pub file: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl FileRecord {
    #[must_use]
    pub fn category(&self) -> FileCategory {
        FileCategory::from_mime(&self.file_type)
    }

    /// Whether the AI image-edit pipeline accepts this file.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.category() == FileCategory::Image
    }

    #[must_use]
    pub fn human_size(&self) -> String {
        human_size(self.size)
    }
}

/// List response payload: the server may answer with a bare array or with a
/// paginated envelope carrying the array under `results`. Both normalize to
/// the same plain sequence, order preserved.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListPayload {
    Plain(Vec<FileRecord>),
    Paginated { results: Vec<FileRecord> },
}

impl ListPayload {
    #[must_use]
    pub fn into_records(self) -> Vec<FileRecord> {
        match self {
            Self::Plain(records) | Self::Paginated { results: records } => records,
        }
    }
}
