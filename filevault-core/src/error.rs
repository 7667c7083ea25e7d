//! src/error.rs
//! ============================================================================
//! # `VaultError`: Unified Error Type for the Vault Client
//!
//! The closed error taxonomy shared by the transport, cache, and mutation
//! layers. Every variant is cheap to clone so failed states can be published
//! through watch channels, and each variant maps to one user-visible message
//! so rendering code can pattern-match on cause instead of parsing strings.

use std::io;

use compact_str::{CompactString, format_compact};
use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

/// Unified error type for all vault client operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VaultError {
    /// The server detected a duplicate of already-stored content (HTTP 409).
    #[error("duplicate content: {detail}")]
    Conflict { detail: CompactString },

    /// The target resource does not exist on the server (HTTP 404).
    #[error("not found: {id}")]
    NotFound { id: CompactString },

    /// Input rejected client-side, before any network call was made.
    #[error("invalid input: {field}: {message}")]
    Validation {
        field: CompactString,
        message: CompactString,
    },

    /// Any other non-success HTTP status, timeout, or network failure.
    #[error("transport failure: {message}")]
    Transport {
        status: Option<u16>,
        message: CompactString,
    },

    /// Local filesystem error while saving a download.
    #[error("I/O error ({kind:?}): {message}")]
    Io {
        kind: io::ErrorKind,
        message: CompactString,
    },

    /// Payload that could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serde(CompactString),
}

impl VaultError {
    pub fn conflict<S: AsRef<str>>(detail: S) -> Self {
        Self::Conflict {
            detail: CompactString::from(detail.as_ref()),
        }
    }

    pub fn not_found<S: AsRef<str>>(id: S) -> Self {
        Self::NotFound {
            id: CompactString::from(id.as_ref()),
        }
    }

    pub fn validation<S1: AsRef<str>, S2: AsRef<str>>(field: S1, message: S2) -> Self {
        Self::Validation {
            field: CompactString::from(field.as_ref()),
            message: CompactString::from(message.as_ref()),
        }
    }

    pub fn transport<S: AsRef<str>>(status: Option<u16>, message: S) -> Self {
        Self::Transport {
            status,
            message: CompactString::from(message.as_ref()),
        }
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Message suitable for direct display.
    ///
    /// Duplicate uploads get a dedicated message so they are distinguishable
    /// from generic failures; validation failures echo their own reason; all
    /// remaining causes collapse into a retry prompt.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Conflict { .. } => {
                "Duplicate detected: This file has already been uploaded.".to_string()
            }
            Self::Validation { message, .. } => message.to_string(),
            Self::NotFound { .. } => "The requested file no longer exists.".to_string(),
            Self::Transport { .. } | Self::Io { .. } | Self::Serde(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for VaultError {
    fn from(e: reqwest::Error) -> Self {
        let status: Option<u16> = e.status().map(|s| s.as_u16());
        let message: CompactString = if e.is_timeout() {
            CompactString::const_new("request timed out")
        } else if e.is_connect() {
            format_compact!("connection failed: {e}")
        } else {
            format_compact!("{e}")
        };

        Self::Transport { status, message }
    }
}

impl From<io::Error> for VaultError {
    fn from(e: io::Error) -> Self {
        Self::Io {
            kind: e.kind(),
            message: format_compact!("{e}"),
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(format_compact!("{e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_message_is_distinct_from_generic_failure() {
        let conflict = VaultError::conflict("This file has already been uploaded.");
        let transport = VaultError::transport(Some(500), "internal server error");

        assert!(conflict.user_message().contains("Duplicate detected"));
        assert!(!transport.user_message().contains("Duplicate"));
        assert!(transport.user_message().contains("try again"));
    }

    #[test]
    fn test_validation_message_passes_through() {
        let err = VaultError::validation("file", "Please select a file");
        assert_eq!(err.user_message(), "Please select a file");
    }

    #[test]
    fn test_io_errors_convert_without_losing_kind() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: VaultError = io_err.into();
        assert!(matches!(
            err,
            VaultError::Io {
                kind: io::ErrorKind::PermissionDenied,
                ..
            }
        ));
    }
}
