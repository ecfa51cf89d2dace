use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle phase a proposal occupies. Codes are stable and used for display and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProposalState {
    // Initial
    #[serde(rename = "DRAFT")]
    Draft,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,

    // Internal review
    #[serde(rename = "INTERNAL_REVIEW")]
    InternalReview,
    #[serde(rename = "DEPT_REVIEW")]
    DeptReview,
    #[serde(rename = "OSP_REVIEW")]
    OspReview,
    #[serde(rename = "COMPLIANCE_REVIEW")]
    Compliance,
    #[serde(rename = "BUDGET_REVIEW")]
    BudgetReview,

    // Approval
    #[serde(rename = "PENDING_APPROVAL")]
    PendingApproval,
    #[serde(rename = "APPROVED")]
    Approved,
    #[serde(rename = "REJECTED")]
    Rejected,
    #[serde(rename = "REVISIONS_REQUESTED")]
    Revisions,

    // Submission
    #[serde(rename = "READY_TO_SUBMIT")]
    ReadyToSubmit,
    #[serde(rename = "SUBMITTED")]
    Submitted,
    #[serde(rename = "UNDER_SPONSOR_REVIEW")]
    UnderReview,

    // Award
    #[serde(rename = "AWARDED")]
    Awarded,
    #[serde(rename = "NEGOTIATION")]
    Negotiation,
    #[serde(rename = "DECLINED")]
    Declined,
    #[serde(rename = "NOT_FUNDED")]
    NotFunded,

    // Post-award
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "CLOSEOUT")]
    Closeout,
    #[serde(rename = "CLOSED")]
    Closed,

    #[serde(rename = "WITHDRAWN")]
    Withdrawn,
}

/// Coarse grouping of states, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initial,
    InternalReview,
    Approval,
    Submission,
    Award,
    PostAward,
    Special,
}

impl ProposalState {
    pub const ALL: [ProposalState; 22] = [
        ProposalState::Draft,
        ProposalState::InProgress,
        ProposalState::InternalReview,
        ProposalState::DeptReview,
        ProposalState::OspReview,
        ProposalState::Compliance,
        ProposalState::BudgetReview,
        ProposalState::PendingApproval,
        ProposalState::Approved,
        ProposalState::Rejected,
        ProposalState::Revisions,
        ProposalState::ReadyToSubmit,
        ProposalState::Submitted,
        ProposalState::UnderReview,
        ProposalState::Awarded,
        ProposalState::Negotiation,
        ProposalState::Declined,
        ProposalState::NotFunded,
        ProposalState::Active,
        ProposalState::Closeout,
        ProposalState::Closed,
        ProposalState::Withdrawn,
    ];

    pub const INITIAL: ProposalState = ProposalState::Draft;

    pub fn code(self) -> &'static str {
        match self {
            ProposalState::Draft => "DRAFT",
            ProposalState::InProgress => "IN_PROGRESS",
            ProposalState::InternalReview => "INTERNAL_REVIEW",
            ProposalState::DeptReview => "DEPT_REVIEW",
            ProposalState::OspReview => "OSP_REVIEW",
            ProposalState::Compliance => "COMPLIANCE_REVIEW",
            ProposalState::BudgetReview => "BUDGET_REVIEW",
            ProposalState::PendingApproval => "PENDING_APPROVAL",
            ProposalState::Approved => "APPROVED",
            ProposalState::Rejected => "REJECTED",
            ProposalState::Revisions => "REVISIONS_REQUESTED",
            ProposalState::ReadyToSubmit => "READY_TO_SUBMIT",
            ProposalState::Submitted => "SUBMITTED",
            ProposalState::UnderReview => "UNDER_SPONSOR_REVIEW",
            ProposalState::Awarded => "AWARDED",
            ProposalState::Negotiation => "NEGOTIATION",
            ProposalState::Declined => "DECLINED",
            ProposalState::NotFunded => "NOT_FUNDED",
            ProposalState::Active => "ACTIVE",
            ProposalState::Closeout => "CLOSEOUT",
            ProposalState::Closed => "CLOSED",
            ProposalState::Withdrawn => "WITHDRAWN",
        }
    }

    pub fn phase(self) -> Phase {
        use ProposalState::*;
        match self {
            Draft | InProgress => Phase::Initial,
            InternalReview | DeptReview | OspReview | Compliance | BudgetReview => {
                Phase::InternalReview
            }
            PendingApproval | Approved | Rejected | Revisions => Phase::Approval,
            ReadyToSubmit | Submitted | UnderReview => Phase::Submission,
            Awarded | Negotiation | Declined | NotFunded => Phase::Award,
            Active | Closeout | Closed => Phase::PostAward,
            Withdrawn => Phase::Special,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProposalState::Closed
                | ProposalState::Withdrawn
                | ProposalState::Declined
                | ProposalState::NotFunded
        )
    }

    /// Award is live and funds are being spent.
    pub fn is_active(self) -> bool {
        matches!(self, ProposalState::Active | ProposalState::Closeout)
    }

    pub fn can_edit(self) -> bool {
        matches!(
            self,
            ProposalState::Draft | ProposalState::InProgress | ProposalState::Revisions
        )
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Named action moving a proposal between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalTransition {
    Start,
    SubmitForReview,
    AdvanceReview,
    RequestRevisions,
    Approve,
    Reject,
    SubmitToSponsor,
    Award,
    Negotiate,
    Decline,
    NotFund,
    Activate,
    Closeout,
    Close,
    Withdraw,
    Reopen,
}

impl ProposalTransition {
    pub const ALL: [ProposalTransition; 16] = [
        ProposalTransition::Start,
        ProposalTransition::SubmitForReview,
        ProposalTransition::AdvanceReview,
        ProposalTransition::RequestRevisions,
        ProposalTransition::Approve,
        ProposalTransition::Reject,
        ProposalTransition::SubmitToSponsor,
        ProposalTransition::Award,
        ProposalTransition::Negotiate,
        ProposalTransition::Decline,
        ProposalTransition::NotFund,
        ProposalTransition::Activate,
        ProposalTransition::Closeout,
        ProposalTransition::Close,
        ProposalTransition::Withdraw,
        ProposalTransition::Reopen,
    ];

    pub fn code(self) -> &'static str {
        match self {
            ProposalTransition::Start => "START",
            ProposalTransition::SubmitForReview => "SUBMIT_FOR_REVIEW",
            ProposalTransition::AdvanceReview => "ADVANCE_REVIEW",
            ProposalTransition::RequestRevisions => "REQUEST_REVISIONS",
            ProposalTransition::Approve => "APPROVE",
            ProposalTransition::Reject => "REJECT",
            ProposalTransition::SubmitToSponsor => "SUBMIT_TO_SPONSOR",
            ProposalTransition::Award => "AWARD",
            ProposalTransition::Negotiate => "NEGOTIATE",
            ProposalTransition::Decline => "DECLINE",
            ProposalTransition::NotFund => "NOT_FUND",
            ProposalTransition::Activate => "ACTIVATE",
            ProposalTransition::Closeout => "CLOSEOUT",
            ProposalTransition::Close => "CLOSE",
            ProposalTransition::Withdraw => "WITHDRAW",
            ProposalTransition::Reopen => "REOPEN",
        }
    }
}

impl fmt::Display for ProposalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} code: {code}")]
pub struct ParseCodeError {
    kind: &'static str,
    code: String,
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_uppercase().replace(['-', ' '], "_")
}

impl FromStr for ProposalState {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = normalize(s);
        ProposalState::ALL
            .into_iter()
            .find(|state| state.code() == code)
            .ok_or(ParseCodeError { kind: "state", code })
    }
}

impl FromStr for ProposalTransition {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = normalize(s);
        ProposalTransition::ALL
            .into_iter()
            .find(|transition| transition.code() == code)
            .ok_or(ParseCodeError { kind: "transition", code })
    }
}
