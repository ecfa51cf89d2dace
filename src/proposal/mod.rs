// Proposal aggregate - identity, lifecycle state, version and audit trail
//
// The only lifecycle mutation is `Proposal::transition_to`; descriptive edits are gated on
// the editable states and never touch the version or history.

pub mod aggregate;
pub mod errors;


pub use aggregate::{
    Attachment, ComplianceFlags, DateRange, KeyPerson, NewAttachment, NewProposal, Proposal,
    ProposalDetails, ProposalUpdates, TransitionOutcome, TransitionRecord, TransitionRequest,
};
pub use errors::ProposalError;
