// Grant proposal workflow - the concrete lifecycle built on the transition engine
// States, edges, per-state policy metadata and role checks.

pub mod authorization;
pub mod definition;
pub mod metadata;
pub mod states;

pub use authorization::{ActorContext, UnlistedStatePolicy};
pub use definition::{proposal_edges, ProposalEngine, ProposalWorkflow, WITHDRAWABLE_STATES};
pub use metadata::{roles, state_metadata, StateMetadata, StateMetadataRegistry};
pub use states::{ParseCodeError, Phase, ProposalState, ProposalTransition};
