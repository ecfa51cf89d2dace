use thiserror::Error;
use uuid::Uuid;

use crate::workflow::{ProposalState, ProposalTransition};

/// Why a proposal mutation was refused. Every variant means nothing was changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProposalError {
    #[error("invalid state transition: {transition} is not allowed from {from}")]
    InvalidTransition {
        from: ProposalState,
        transition: ProposalTransition,
    },

    #[error("actor {actor_id} is not authorized to {transition} a proposal in {state}")]
    Unauthorized {
        actor_id: Uuid,
        state: ProposalState,
        transition: ProposalTransition,
    },

    #[error("version mismatch: expected {expected}, found {actual} - proposal was modified")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("proposal cannot be edited in state {state}")]
    NotEditable { state: ProposalState },
}

impl ProposalError {
    /// Stable machine-readable code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            ProposalError::InvalidTransition { .. } => "INVALID_TRANSITION",
            ProposalError::Unauthorized { .. } => "UNAUTHORIZED",
            ProposalError::VersionConflict { .. } => "VERSION_MISMATCH",
            ProposalError::NotEditable { .. } => "NOT_EDITABLE",
        }
    }

    /// HTTP status an API layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ProposalError::InvalidTransition { .. } => 400,
            ProposalError::Unauthorized { .. } => 403,
            ProposalError::VersionConflict { .. } | ProposalError::NotEditable { .. } => 409,
        }
    }

    /// The caller should re-fetch the proposal and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProposalError::VersionConflict { .. })
    }
}
