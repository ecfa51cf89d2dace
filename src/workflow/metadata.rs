use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use super::states::ProposalState;

/// Role names as issued by the authentication layer.
pub mod roles {
    pub const PI: &str = "PI";
    pub const PROPOSAL_CREATOR: &str = "PROPOSAL_CREATOR";
    pub const REVIEWER: &str = "REVIEWER";
    pub const DEPT_ADMIN: &str = "DEPT_ADMIN";
    pub const DEPT_HEAD: &str = "DEPT_HEAD";
    pub const OSP_OFFICER: &str = "OSP_OFFICER";
    pub const OSP_DIRECTOR: &str = "OSP_DIRECTOR";
    pub const COMPLIANCE_OFFICER: &str = "COMPLIANCE_OFFICER";
    pub const BUDGET_OFFICER: &str = "BUDGET_OFFICER";
    pub const AUTHORIZED_SIGNATORY: &str = "AUTHORIZED_SIGNATORY";
    pub const GRANTS_ADMIN: &str = "GRANTS_ADMIN";
    pub const ADMIN: &str = "ADMIN";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMetadata {
    pub state: ProposalState,
    pub display_name: String,
    pub description: String,
    /// Holding any one of these roles authorizes transitions out of the state.
    pub required_roles: BTreeSet<String>,
    pub notified_roles: BTreeSet<String>,
    /// Hours the state may be occupied before escalation. Zero means no SLA.
    pub sla_hours: u32,
}

impl StateMetadata {
    fn new(
        state: ProposalState,
        display_name: &str,
        description: &str,
        required_roles: &[&str],
        notified_roles: &[&str],
        sla_hours: u32,
    ) -> Self {
        Self {
            state,
            display_name: display_name.to_string(),
            description: description.to_string(),
            required_roles: required_roles.iter().map(|r| r.to_string()).collect(),
            notified_roles: notified_roles.iter().map(|r| r.to_string()).collect(),
            sla_hours,
        }
    }

    /// Metadata for a state that has no registry entry.
    pub fn fallback(state: ProposalState) -> Self {
        Self {
            state,
            display_name: state.code().to_string(),
            description: "Unknown state".to_string(),
            required_roles: BTreeSet::new(),
            notified_roles: BTreeSet::new(),
            sla_hours: 0,
        }
    }

    pub fn permits_any<'a, I>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        roles.into_iter().any(|role| self.required_roles.contains(role))
    }
}

/// Static state -> metadata lookup. Only the states that carry an explicit policy are listed;
/// everything else resolves to [`StateMetadata::fallback`].
#[derive(Debug, Clone)]
pub struct StateMetadataRegistry {
    entries: HashMap<ProposalState, StateMetadata>,
}

static BUILTIN: LazyLock<StateMetadataRegistry> = LazyLock::new(StateMetadataRegistry::build);

impl StateMetadataRegistry {
    pub fn builtin() -> &'static StateMetadataRegistry {
        &BUILTIN
    }

    fn build() -> Self {
        use roles::*;
        use ProposalState as S;

        let entries = [
            StateMetadata::new(
                S::Draft,
                "Draft",
                "Proposal is being drafted",
                &[PI, PROPOSAL_CREATOR],
                &[],
                0,
            ),
            StateMetadata::new(
                S::InProgress,
                "In Progress",
                "Proposal is actively being developed",
                &[PI, PROPOSAL_CREATOR],
                &[PI],
                0,
            ),
            StateMetadata::new(
                S::InternalReview,
                "Internal Review",
                "Proposal is under initial internal review",
                &[REVIEWER, DEPT_ADMIN],
                &[PI, DEPT_ADMIN],
                48,
            ),
            StateMetadata::new(
                S::DeptReview,
                "Department Review",
                "Proposal is under department review",
                &[DEPT_HEAD, DEPT_ADMIN],
                &[PI, DEPT_HEAD],
                72,
            ),
            StateMetadata::new(
                S::OspReview,
                "OSP Review",
                "Proposal is under Office of Sponsored Programs review",
                &[OSP_OFFICER],
                &[PI, DEPT_HEAD, OSP_OFFICER],
                96,
            ),
            StateMetadata::new(
                S::Compliance,
                "Compliance Review",
                "Proposal is under compliance review",
                &[COMPLIANCE_OFFICER],
                &[PI, OSP_OFFICER],
                72,
            ),
            StateMetadata::new(
                S::BudgetReview,
                "Budget Review",
                "Proposal budget is under review",
                &[BUDGET_OFFICER, OSP_OFFICER],
                &[PI, OSP_OFFICER],
                48,
            ),
            StateMetadata::new(
                S::PendingApproval,
                "Pending Approval",
                "Proposal is pending final approval",
                &[OSP_DIRECTOR, AUTHORIZED_SIGNATORY],
                &[PI, OSP_DIRECTOR],
                24,
            ),
            StateMetadata::new(
                S::Approved,
                "Approved",
                "Proposal has been approved for submission",
                &[OSP_OFFICER],
                &[PI, OSP_OFFICER],
                0,
            ),
            StateMetadata::new(
                S::Submitted,
                "Submitted",
                "Proposal has been submitted to sponsor",
                &[OSP_OFFICER],
                &[PI, OSP_OFFICER, DEPT_HEAD],
                0,
            ),
            StateMetadata::new(
                S::Awarded,
                "Awarded",
                "Proposal has been awarded",
                &[OSP_OFFICER, GRANTS_ADMIN],
                &[PI, OSP_OFFICER, DEPT_HEAD, GRANTS_ADMIN],
                0,
            ),
            StateMetadata::new(
                S::Active,
                "Active",
                "Award is active and funds are being expended",
                &[PI, GRANTS_ADMIN],
                &[PI, GRANTS_ADMIN],
                0,
            ),
            StateMetadata::new(
                S::Closed,
                "Closed",
                "Award has been closed out",
                &[GRANTS_ADMIN],
                &[],
                0,
            ),
        ];

        Self {
            entries: entries.into_iter().map(|m| (m.state, m)).collect(),
        }
    }

    pub fn get(&self, state: ProposalState) -> StateMetadata {
        self.entries
            .get(&state)
            .cloned()
            .unwrap_or_else(|| StateMetadata::fallback(state))
    }

    pub fn is_listed(&self, state: ProposalState) -> bool {
        self.entries.contains_key(&state)
    }

    pub fn listed_states(&self) -> impl Iterator<Item = ProposalState> + '_ {
        ProposalState::ALL.into_iter().filter(|state| self.is_listed(*state))
    }

    /// When a proposal that entered `state` at `entered_at` breaches its SLA.
    pub fn sla_deadline(&self, state: ProposalState, entered_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.entries.get(&state)?.sla_hours {
            0 => None,
            hours => Some(entered_at + Duration::hours(i64::from(hours))),
        }
    }
}

/// Looks `state` up in the built-in registry.
pub fn state_metadata(state: ProposalState) -> StateMetadata {
    StateMetadataRegistry::builtin().get(state)
}
