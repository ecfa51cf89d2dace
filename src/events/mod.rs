// Domain events raised by the proposal aggregate and the publish port they leave through

pub mod publisher;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::{ProposalState, ProposalTransition};

pub use publisher::{
    spawn_publish, ChannelEventPublisher, EventPublisher, LoggingEventPublisher, PublishError,
};

#[cfg(test)]
pub use publisher::MockEventPublisher;

pub const PROPOSAL_AGGREGATE: &str = "Proposal";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub tenant_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    /// Aggregate version after the change.
    pub version: u64,
    #[serde(flatten)]
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventPayload {
    #[serde(rename = "proposal.created")]
    ProposalCreated {
        title: String,
        principal_investigator_id: Uuid,
        sponsor_id: Uuid,
    },
    #[serde(rename = "proposal.state_changed")]
    ProposalStateChanged {
        from_state: ProposalState,
        to_state: ProposalState,
        transition: ProposalTransition,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl DomainEvent {
    fn new(aggregate_id: Uuid, tenant_id: Uuid, version: u64, payload: EventPayload) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            aggregate_type: PROPOSAL_AGGREGATE.to_string(),
            tenant_id,
            occurred_at: Utc::now(),
            version,
            payload,
        }
    }

    pub fn proposal_created(
        aggregate_id: Uuid,
        tenant_id: Uuid,
        title: &str,
        principal_investigator_id: Uuid,
        sponsor_id: Uuid,
    ) -> Self {
        Self::new(
            aggregate_id,
            tenant_id,
            1,
            EventPayload::ProposalCreated {
                title: title.to_string(),
                principal_investigator_id,
                sponsor_id,
            },
        )
    }

    pub fn proposal_state_changed(
        aggregate_id: Uuid,
        tenant_id: Uuid,
        version: u64,
        from_state: ProposalState,
        to_state: ProposalState,
        transition: ProposalTransition,
        reason: &str,
    ) -> Self {
        let reason = (!reason.is_empty()).then(|| reason.to_string());
        Self::new(
            aggregate_id,
            tenant_id,
            version,
            EventPayload::ProposalStateChanged {
                from_state,
                to_state,
                transition,
                reason,
            },
        )
    }

    pub fn event_type(&self) -> &'static str {
        match self.payload {
            EventPayload::ProposalCreated { .. } => "proposal.created",
            EventPayload::ProposalStateChanged { .. } => "proposal.state_changed",
        }
    }
}
