use std::collections::BTreeSet;
use std::sync::LazyLock;
use uuid::Uuid;

use super::authorization::{is_authorized, ActorContext, UnlistedStatePolicy};
use super::metadata::{StateMetadata, StateMetadataRegistry};
use super::states::{ProposalState, ProposalTransition};
use crate::engine::{EngineError, TransitionEngine, TransitionInfo};

pub type ProposalEngine = TransitionEngine<ProposalState, ProposalTransition>;

/// States from which a proposal may be withdrawn.
pub const WITHDRAWABLE_STATES: [ProposalState; 11] = [
    ProposalState::Draft,
    ProposalState::InProgress,
    ProposalState::InternalReview,
    ProposalState::DeptReview,
    ProposalState::OspReview,
    ProposalState::Compliance,
    ProposalState::BudgetReview,
    ProposalState::PendingApproval,
    ProposalState::Approved,
    ProposalState::Revisions,
    ProposalState::ReadyToSubmit,
];

/// Review stages in order; each advances to the next and may send the proposal back.
const REVIEW_CHAIN: [ProposalState; 5] = [
    ProposalState::InternalReview,
    ProposalState::DeptReview,
    ProposalState::OspReview,
    ProposalState::Compliance,
    ProposalState::BudgetReview,
];

/// Every edge of the grant proposal lifecycle.
pub fn proposal_edges() -> Vec<(ProposalState, ProposalTransition, ProposalState)> {
    use ProposalState as S;
    use ProposalTransition as T;

    let mut edges = vec![
        (S::Draft, T::Start, S::InProgress),
        (S::InProgress, T::SubmitForReview, S::InternalReview),
    ];

    let next_stages = REVIEW_CHAIN.iter().skip(1).copied().chain([S::PendingApproval]);
    for (stage, next) in REVIEW_CHAIN.into_iter().zip(next_stages) {
        edges.push((stage, T::AdvanceReview, next));
        edges.push((stage, T::RequestRevisions, S::Revisions));
    }

    edges.extend([
        (S::PendingApproval, T::Approve, S::Approved),
        (S::PendingApproval, T::Reject, S::Rejected),
        (S::PendingApproval, T::RequestRevisions, S::Revisions),
        // Revisions restart the whole review chain
        (S::Revisions, T::SubmitForReview, S::InternalReview),
        (S::Approved, T::SubmitToSponsor, S::ReadyToSubmit),
        (S::ReadyToSubmit, T::SubmitToSponsor, S::Submitted),
        (S::Submitted, T::AdvanceReview, S::UnderReview),
        (S::UnderReview, T::Award, S::Awarded),
        (S::UnderReview, T::Negotiate, S::Negotiation),
        (S::UnderReview, T::Decline, S::Declined),
        (S::UnderReview, T::NotFund, S::NotFunded),
        (S::Negotiation, T::Award, S::Awarded),
        (S::Negotiation, T::Decline, S::Declined),
        (S::Awarded, T::Activate, S::Active),
        (S::Active, T::Closeout, S::Closeout),
        (S::Closeout, T::Close, S::Closed),
    ]);

    edges.extend(
        WITHDRAWABLE_STATES
            .into_iter()
            .map(|state| (state, T::Withdraw, S::Withdrawn)),
    );

    edges.push((S::Rejected, T::Reopen, S::Draft));
    edges
}

/// The grant proposal lifecycle: one engine instance, the state metadata registry and the
/// authorization policy. Transition checks and listings both go through the same engine.
#[derive(Debug)]
pub struct ProposalWorkflow {
    engine: ProposalEngine,
    registry: &'static StateMetadataRegistry,
    unlisted_state_policy: UnlistedStatePolicy,
}

static SHARED: LazyLock<ProposalWorkflow> = LazyLock::new(ProposalWorkflow::new);

impl ProposalWorkflow {
    pub fn new() -> Self {
        Self::with_policy(UnlistedStatePolicy::default())
    }

    pub fn with_policy(unlisted_state_policy: UnlistedStatePolicy) -> Self {
        let engine = TransitionEngine::new(ProposalState::INITIAL);
        engine.add_transitions(proposal_edges());
        tracing::debug!(
            edges = engine.edge_count(),
            policy = ?unlisted_state_policy,
            "Proposal workflow initialized"
        );

        Self {
            engine,
            registry: StateMetadataRegistry::builtin(),
            unlisted_state_policy,
        }
    }

    /// Process-wide workflow with the default policy.
    pub fn shared() -> &'static ProposalWorkflow {
        &SHARED
    }

    /// Underlying engine, for registering guards during start-up.
    ///
    /// Guards apply to proposal transitions. Enter/exit hooks do not: `Proposal::transition_to`
    /// resolves through `next_state`, so hooks registered here only fire for callers that use
    /// `execute_transition` on the engine directly.
    pub fn engine(&self) -> &ProposalEngine {
        &self.engine
    }

    pub fn unlisted_state_policy(&self) -> UnlistedStatePolicy {
        self.unlisted_state_policy
    }

    pub fn initial_state(&self) -> ProposalState {
        self.engine.initial_state()
    }

    pub fn can_transition(&self, from: ProposalState, transition: ProposalTransition) -> bool {
        self.engine.can_transition(from, transition)
    }

    pub fn next_state(
        &self,
        from: ProposalState,
        transition: ProposalTransition,
    ) -> Result<ProposalState, EngineError> {
        self.engine.next_state(from, transition)
    }

    pub fn available_transitions(&self, from: ProposalState) -> BTreeSet<ProposalTransition> {
        self.engine.available_transitions(from)
    }

    pub fn all_transitions(&self) -> Vec<TransitionInfo<ProposalState, ProposalTransition>> {
        self.engine.all_transitions()
    }

    pub fn state_metadata(&self, state: ProposalState) -> StateMetadata {
        self.registry.get(state)
    }

    pub fn registry(&self) -> &StateMetadataRegistry {
        self.registry
    }

    pub fn is_authorized(
        &self,
        actor: &ActorContext,
        owner_id: Uuid,
        state: ProposalState,
        transition: ProposalTransition,
    ) -> bool {
        is_authorized(
            self.registry,
            self.unlisted_state_policy,
            actor,
            owner_id,
            state,
            transition,
        )
    }

    /// Ok when a single transition leads from `from` to `to`.
    pub fn validate_state_change(
        &self,
        from: ProposalState,
        to: ProposalState,
    ) -> Result<ProposalTransition, EngineError> {
        self.available_transitions(from)
            .into_iter()
            .find(|transition| self.next_state(from, *transition).ok() == Some(to))
            .ok_or_else(|| EngineError::InvalidTransition {
                from: from.to_string(),
                transition: format!("-> {to}"),
            })
    }
}

impl Default for ProposalWorkflow {
    fn default() -> Self {
        Self::new()
    }
}
