// Shared builders for the integration tests
#![allow(dead_code)]

use chrono::{Duration, Utc};
use grant_lifecycle::proposal::DateRange;
use grant_lifecycle::{
    roles, ActorContext, CreateProposalInput, ProposalState, ProposalTransition, TransitionInfo,
};
use serde::Deserialize;
use uuid::Uuid;

pub const ALL_ROLES: [&str; 12] = [
    roles::PI,
    roles::PROPOSAL_CREATOR,
    roles::REVIEWER,
    roles::DEPT_ADMIN,
    roles::DEPT_HEAD,
    roles::OSP_OFFICER,
    roles::OSP_DIRECTOR,
    roles::COMPLIANCE_OFFICER,
    roles::BUDGET_OFFICER,
    roles::AUTHORIZED_SIGNATORY,
    roles::GRANTS_ADMIN,
    roles::ADMIN,
];

/// The 15 transitions from Draft to Closed along the successful path.
pub const HAPPY_PATH: [ProposalTransition; 15] = [
    ProposalTransition::Start,
    ProposalTransition::SubmitForReview,
    ProposalTransition::AdvanceReview,
    ProposalTransition::AdvanceReview,
    ProposalTransition::AdvanceReview,
    ProposalTransition::AdvanceReview,
    ProposalTransition::AdvanceReview,
    ProposalTransition::Approve,
    ProposalTransition::SubmitToSponsor,
    ProposalTransition::SubmitToSponsor,
    ProposalTransition::AdvanceReview,
    ProposalTransition::Award,
    ProposalTransition::Activate,
    ProposalTransition::Closeout,
    ProposalTransition::Close,
];

#[derive(Debug, Deserialize)]
struct EdgeFixture {
    from: ProposalState,
    transition: ProposalTransition,
    to: ProposalState,
}

/// Expected workflow edges, loaded from the JSON fixture
pub fn expected_edges() -> Vec<TransitionInfo<ProposalState, ProposalTransition>> {
    let json_data = include_str!("workflow_edges.json");
    let edges: Vec<EdgeFixture> =
        serde_json::from_str(json_data).expect("Failed to parse workflow edge fixture");
    edges
        .into_iter()
        .map(|edge| TransitionInfo {
            from: edge.from,
            transition: edge.transition,
            to: edge.to,
        })
        .collect()
}

pub struct Tenant {
    pub id: Uuid,
}

impl Tenant {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn actor(&self, roles: &[&str]) -> ActorContext {
        ActorContext::new(self.id, Uuid::new_v4(), roles.iter().copied())
    }

    /// An actor holding every known role.
    pub fn administrator(&self) -> ActorContext {
        self.actor(&ALL_ROLES)
    }
}

pub fn create_input(principal_investigator_id: Uuid) -> CreateProposalInput {
    let now = Utc::now();
    CreateProposalInput {
        title: "Deep ocean carbon flux".to_string(),
        short_title: "Carbon flux".to_string(),
        abstract_text: "Measuring particulate carbon export below 1000m.".to_string(),
        principal_investigator_id,
        sponsor_id: Uuid::new_v4(),
        department: "Oceanography".to_string(),
        project_period: DateRange::new(now, now + Duration::days(3 * 365)),
        sponsor_deadline: Some(now + Duration::days(21)),
        internal_deadline: Some(now + Duration::days(14)),
        research_area: "Marine biogeochemistry".to_string(),
        keywords: vec!["carbon".to_string(), "ocean".to_string()],
    }
}
