use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{ListFilter, Page, ProposalRepository, RepositoryError};
use crate::proposal::Proposal;
use crate::workflow::ProposalState;

/// Process-local repository keyed by proposal id. Suitable for tests, demos and
/// single-instance deployments.
#[derive(Debug, Default)]
pub struct InMemoryProposalRepository {
    proposals: RwLock<HashMap<Uuid, Proposal>>,
}

impl InMemoryProposalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.proposals.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.proposals.read().await.is_empty()
    }
}

// Stored copies never carry queued events; those belong to the caller that raised them.
fn stored_copy(proposal: &Proposal) -> Proposal {
    let mut copy = proposal.clone();
    copy.take_pending_events();
    copy
}

#[async_trait]
impl ProposalRepository for InMemoryProposalRepository {
    async fn insert(&self, proposal: &Proposal) -> Result<(), RepositoryError> {
        let mut proposals = self.proposals.write().await;
        if proposals.contains_key(&proposal.id()) {
            return Err(RepositoryError::AlreadyExists(proposal.id()));
        }
        proposals.insert(proposal.id(), stored_copy(proposal));
        debug!(proposal.id = %proposal.id(), "Proposal inserted");
        Ok(())
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Proposal>, RepositoryError> {
        let proposals = self.proposals.read().await;
        Ok(proposals
            .get(&id)
            .filter(|p| p.tenant_id() == tenant_id)
            .cloned())
    }

    async fn save(&self, proposal: &Proposal, expected_version: u64) -> Result<(), RepositoryError> {
        let mut proposals = self.proposals.write().await;
        let stored = proposals
            .get_mut(&proposal.id())
            .filter(|p| p.tenant_id() == proposal.tenant_id())
            .ok_or(RepositoryError::NotFound(proposal.id()))?;

        if stored.version() != expected_version {
            return Err(RepositoryError::Conflict {
                id: proposal.id(),
                expected: expected_version,
                found: stored.version(),
            });
        }

        *stored = stored_copy(proposal);
        debug!(proposal.id = %proposal.id(), version = proposal.version(), "Proposal saved");
        Ok(())
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<(), RepositoryError> {
        let mut proposals = self.proposals.write().await;
        let owned = proposals.get(&id).is_some_and(|p| p.tenant_id() == tenant_id);
        if !owned {
            return Err(RepositoryError::NotFound(id));
        }
        proposals.remove(&id);
        Ok(())
    }

    async fn list_by_state(
        &self,
        tenant_id: Uuid,
        state: ProposalState,
        filter: ListFilter,
    ) -> Result<Page<Proposal>, RepositoryError> {
        let proposals = self.proposals.read().await;
        let mut matches: Vec<&Proposal> = proposals
            .values()
            .filter(|p| p.tenant_id() == tenant_id && p.state() == state)
            .collect();
        // Newest first, matching how listings are presented
        matches.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then(a.id().cmp(&b.id())));

        let total = matches.len();
        let items = matches
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .cloned()
            .collect();
        Ok(Page { items, total })
    }

    async fn count_by_state(&self, tenant_id: Uuid) -> Result<BTreeMap<ProposalState, usize>, RepositoryError> {
        let proposals = self.proposals.read().await;
        let mut counts = BTreeMap::new();
        for proposal in proposals.values().filter(|p| p.tenant_id() == tenant_id) {
            *counts.entry(proposal.state()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn upcoming_deadlines(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Proposal>, RepositoryError> {
        let proposals = self.proposals.read().await;
        let mut upcoming: Vec<Proposal> = proposals
            .values()
            .filter(|p| p.tenant_id() == tenant_id && !p.is_terminal())
            .filter(|p| {
                p.details()
                    .sponsor_deadline
                    .is_some_and(|deadline| deadline >= now && deadline <= until)
            })
            .cloned()
            .collect();
        upcoming.sort_by_key(|p| p.details().sponsor_deadline);
        Ok(upcoming)
    }
}
