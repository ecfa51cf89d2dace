// Persistence port for proposals
//
// Writes are conditional on the stored version (compare-and-swap); that is what makes
// concurrent transitions on the same proposal safe without an in-process lock.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::proposal::Proposal;
use crate::workflow::ProposalState;

pub use memory::InMemoryProposalRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("proposal {id} was modified concurrently: expected version {expected}, stored {found}")]
    Conflict { id: Uuid, expected: u64, found: u64 },

    #[error("proposal {0} already exists")]
    AlreadyExists(Uuid),

    #[error("proposal {0} not found")]
    NotFound(Uuid),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListFilter {
    pub offset: usize,
    pub limit: usize,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self { offset: 0, limit: 50 }
    }
}

/// Page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProposalRepository: Send + Sync {
    async fn insert(&self, proposal: &Proposal) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Proposal>, RepositoryError>;

    /// Replaces the stored proposal only if its version still equals `expected_version`.
    async fn save(&self, proposal: &Proposal, expected_version: u64) -> Result<(), RepositoryError>;

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<(), RepositoryError>;

    async fn list_by_state(
        &self,
        tenant_id: Uuid,
        state: ProposalState,
        filter: ListFilter,
    ) -> Result<Page<Proposal>, RepositoryError>;

    async fn count_by_state(&self, tenant_id: Uuid) -> Result<BTreeMap<ProposalState, usize>, RepositoryError>;

    /// Non-terminal proposals whose sponsor deadline falls within `[now, until]`.
    async fn upcoming_deadlines(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Proposal>, RepositoryError>;
}
