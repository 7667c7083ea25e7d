//! src/model/mutation.rs
//! ============================================================================
//! # Per-Operation Write State
//!
//! `MutationState` tracks one in-flight write (upload, delete, download, or
//! edit request) so consumers can disable the matching affordance while the
//! call is pending. State lives for the duration of one invocation; there is
//! no history.

use crate::error::VaultError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationStatus {
    #[default]
    Idle,

    Pending,

    Success,

    Error,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationState {
    pub status: MutationStatus,
    pub error: Option<VaultError>,
}

impl MutationState {
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: MutationStatus::Pending,
            error: None,
        }
    }

    #[must_use]
    pub fn succeeded() -> Self {
        Self {
            status: MutationStatus::Success,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: VaultError) -> Self {
        Self {
            status: MutationStatus::Error,
            error: Some(error),
        }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.status, MutationStatus::Pending)
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.status, MutationStatus::Error)
    }

    /// Display message for the failure, if any.
    #[must_use]
    pub fn user_message(&self) -> Option<String> {
        self.error.as_ref().map(VaultError::user_message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions_carry_cause() {
        let state = MutationState::idle();
        assert_eq!(state.status, MutationStatus::Idle);
        assert!(state.user_message().is_none());

        let state = MutationState::failed(VaultError::conflict("dup"));
        assert!(state.is_error());
        assert!(state.user_message().unwrap().contains("Duplicate"));
    }
}
