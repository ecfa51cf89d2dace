use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::errors::ProposalError;
use crate::events::DomainEvent;
use crate::workflow::{ActorContext, ProposalState, ProposalTransition, ProposalWorkflow, StateMetadata};

/// One committed state change. Entries are appended and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from_state: ProposalState,
    pub to_state: ProposalState,
    pub transition: ProposalTransition,
    pub actor_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.end >= self.start
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceFlags {
    pub irb_required: bool,
    pub iacuc_required: bool,
    pub ibc_required: bool,
    pub export_control: bool,
    pub conflict_of_interest: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPerson {
    pub person_id: Uuid,
    pub role: String,
    /// Effort as a percentage.
    pub effort: f64,
    #[serde(default)]
    pub calendar_months: f64,
    #[serde(default)]
    pub academic_months: f64,
    #[serde(default)]
    pub summer_months: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub file_size_bytes: u64,
    pub storage_path: String,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
    /// e.g. "narrative", "budget", "bio_sketch"
    pub category: String,
}

/// Attachment as supplied by the uploader; identity and upload stamps are assigned on add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub file_name: String,
    pub file_type: String,
    pub file_size_bytes: u64,
    pub storage_path: String,
    pub category: String,
}

/// Descriptive fields. Only changeable while the proposal is editable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalDetails {
    pub title: String,
    #[serde(default)]
    pub short_title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub external_id: Option<String>,
    pub sponsor_id: Uuid,
    #[serde(default)]
    pub opportunity_id: Option<Uuid>,
    #[serde(default)]
    pub sponsor_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub internal_deadline: Option<DateTime<Utc>>,
    pub project_period: DateRange,
    pub department: String,
    #[serde(default)]
    pub research_area: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub budget_id: Option<Uuid>,
    #[serde(default)]
    pub compliance: ComplianceFlags,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalUpdates {
    pub title: Option<String>,
    pub short_title: Option<String>,
    pub abstract_text: Option<String>,
    pub research_area: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub sponsor_deadline: Option<DateTime<Utc>>,
    pub internal_deadline: Option<DateTime<Utc>>,
    pub irb_required: Option<bool>,
    pub iacuc_required: Option<bool>,
    pub ibc_required: Option<bool>,
    pub export_control: Option<bool>,
    pub conflict_of_interest: Option<bool>,
}

/// Everything needed to open a new proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProposal {
    pub tenant_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub principal_investigator_id: Uuid,
    pub sponsor_id: Uuid,
    pub department: String,
    pub project_period: DateRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub transition: ProposalTransition,
    pub comment: String,
    /// Version the caller last observed. `0` skips the check.
    pub expected_version: u64,
}

impl TransitionRequest {
    pub fn new(transition: ProposalTransition) -> Self {
        Self {
            transition,
            comment: String::new(),
            expected_version: 0,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = version;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub from: ProposalState,
    pub to: ProposalState,
    pub version: u64,
    pub event: DomainEvent,
}

/// Aggregate root for a grant proposal.
///
/// The lifecycle state only changes through [`Proposal::transition_to`], which bumps the
/// version by one and appends to the history, so `history().len() == version() - 1` holds
/// for every proposal built through this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    id: Uuid,
    tenant_id: Uuid,
    proposal_number: String,
    principal_investigator_id: Uuid,
    co_investigator_ids: Vec<Uuid>,
    key_personnel: Vec<KeyPerson>,
    attachments: Vec<Attachment>,
    state: ProposalState,
    version: u64,
    history: Vec<TransitionRecord>,
    details: ProposalDetails,
    created_at: DateTime<Utc>,
    created_by: Uuid,
    updated_at: DateTime<Utc>,
    updated_by: Uuid,
    #[serde(skip)]
    pending_events: Vec<DomainEvent>,
}

impl Proposal {
    pub fn new(input: NewProposal) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let proposal_number = proposal_number(id, now);

        let created = DomainEvent::proposal_created(
            id,
            input.tenant_id,
            &input.title,
            input.principal_investigator_id,
            input.sponsor_id,
        );

        Self {
            id,
            tenant_id: input.tenant_id,
            proposal_number,
            principal_investigator_id: input.principal_investigator_id,
            co_investigator_ids: Vec::new(),
            key_personnel: Vec::new(),
            attachments: Vec::new(),
            state: ProposalState::INITIAL,
            version: 1,
            history: Vec::new(),
            details: ProposalDetails {
                title: input.title,
                short_title: String::new(),
                abstract_text: String::new(),
                external_id: None,
                sponsor_id: input.sponsor_id,
                opportunity_id: None,
                sponsor_deadline: None,
                internal_deadline: None,
                project_period: input.project_period,
                department: input.department,
                research_area: String::new(),
                keywords: Vec::new(),
                budget_id: None,
                compliance: ComplianceFlags::default(),
            },
            created_at: now,
            created_by: input.created_by,
            updated_at: now,
            updated_by: input.created_by,
            pending_events: vec![created],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub fn proposal_number(&self) -> &str {
        &self.proposal_number
    }

    pub fn principal_investigator_id(&self) -> Uuid {
        self.principal_investigator_id
    }

    pub fn co_investigator_ids(&self) -> &[Uuid] {
        &self.co_investigator_ids
    }

    pub fn key_personnel(&self) -> &[KeyPerson] {
        &self.key_personnel
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn state(&self) -> ProposalState {
        self.state
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    pub fn details(&self) -> &ProposalDetails {
        &self.details
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn created_by(&self) -> Uuid {
        self.created_by
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn updated_by(&self) -> Uuid {
        self.updated_by
    }

    /// Events raised since the last [`take_pending_events`](Self::take_pending_events).
    pub fn pending_events(&self) -> &[DomainEvent] {
        &self.pending_events
    }

    pub fn take_pending_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Moves the proposal along `request.transition`.
    ///
    /// Checks run in a fixed order and stop at the first failure, leaving the proposal
    /// untouched:
    /// 1. `expected_version` (when non-zero) must equal the current version;
    /// 2. the actor must be authorized for the *current* state;
    /// 3. the workflow must have an edge for `(state, transition)`.
    ///
    /// On success the history grows by one entry, the version by one, and a
    /// `proposal.state_changed` event is queued and returned.
    pub fn transition_to(
        &mut self,
        workflow: &ProposalWorkflow,
        actor: &ActorContext,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, ProposalError> {
        let TransitionRequest {
            transition,
            comment,
            expected_version,
        } = request;

        if expected_version > 0 && expected_version != self.version {
            return Err(ProposalError::VersionConflict {
                expected: expected_version,
                actual: self.version,
            });
        }

        let authorized = actor.tenant_id == self.tenant_id
            && workflow.is_authorized(actor, self.principal_investigator_id, self.state, transition);
        if !authorized {
            return Err(ProposalError::Unauthorized {
                actor_id: actor.actor_id,
                state: self.state,
                transition,
            });
        }

        let from = self.state;
        let to = workflow
            .next_state(from, transition)
            .map_err(|_| ProposalError::InvalidTransition { from, transition })?;

        let now = Utc::now();
        self.history.push(TransitionRecord {
            from_state: from,
            to_state: to,
            transition,
            actor_id: actor.actor_id,
            timestamp: now,
            comment: comment.clone(),
        });
        self.state = to;
        self.version += 1;
        self.updated_at = now;
        self.updated_by = actor.actor_id;

        let event = DomainEvent::proposal_state_changed(
            self.id,
            self.tenant_id,
            self.version,
            from,
            to,
            transition,
            &comment,
        );
        self.pending_events.push(event.clone());

        tracing::info!(
            proposal.id = %self.id,
            from = %from,
            to = %to,
            transition = %transition,
            actor.id = %actor.actor_id,
            version = self.version,
            "Proposal transitioned"
        );

        Ok(TransitionOutcome {
            from,
            to,
            version: self.version,
            event,
        })
    }

    /// Transitions currently possible from this proposal's state, ignoring authorization.
    pub fn available_transitions(&self, workflow: &ProposalWorkflow) -> BTreeSet<ProposalTransition> {
        workflow.available_transitions(self.state)
    }

    /// Transitions `actor` may perform right now.
    pub fn permitted_transitions(
        &self,
        workflow: &ProposalWorkflow,
        actor: &ActorContext,
    ) -> BTreeSet<ProposalTransition> {
        if actor.tenant_id != self.tenant_id {
            return BTreeSet::new();
        }
        self.available_transitions(workflow)
            .into_iter()
            .filter(|t| workflow.is_authorized(actor, self.principal_investigator_id, self.state, *t))
            .collect()
    }

    pub fn state_metadata(&self, workflow: &ProposalWorkflow) -> StateMetadata {
        workflow.state_metadata(self.state)
    }

    pub fn can_edit(&self) -> bool {
        self.state.can_edit()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn ensure_editable(&self) -> Result<(), ProposalError> {
        if self.can_edit() {
            Ok(())
        } else {
            Err(ProposalError::NotEditable { state: self.state })
        }
    }

    // Edits record who touched the proposal but leave version and history alone.
    fn touch(&mut self, actor_id: Uuid) {
        self.updated_at = Utc::now();
        self.updated_by = actor_id;
    }

    pub fn update(&mut self, actor_id: Uuid, updates: ProposalUpdates) -> Result<(), ProposalError> {
        self.ensure_editable()?;

        let details = &mut self.details;
        if let Some(title) = updates.title {
            details.title = title;
        }
        if let Some(short_title) = updates.short_title {
            details.short_title = short_title;
        }
        if let Some(abstract_text) = updates.abstract_text {
            details.abstract_text = abstract_text;
        }
        if let Some(research_area) = updates.research_area {
            details.research_area = research_area;
        }
        if let Some(keywords) = updates.keywords {
            details.keywords = keywords;
        }
        if let Some(deadline) = updates.sponsor_deadline {
            details.sponsor_deadline = Some(deadline);
        }
        if let Some(deadline) = updates.internal_deadline {
            details.internal_deadline = Some(deadline);
        }

        let flags = &mut details.compliance;
        if let Some(value) = updates.irb_required {
            flags.irb_required = value;
        }
        if let Some(value) = updates.iacuc_required {
            flags.iacuc_required = value;
        }
        if let Some(value) = updates.ibc_required {
            flags.ibc_required = value;
        }
        if let Some(value) = updates.export_control {
            flags.export_control = value;
        }
        if let Some(value) = updates.conflict_of_interest {
            flags.conflict_of_interest = value;
        }

        self.touch(actor_id);
        Ok(())
    }

    /// Adding someone already listed is a no-op.
    pub fn add_co_investigator(&mut self, actor_id: Uuid, investigator_id: Uuid) -> Result<(), ProposalError> {
        self.ensure_editable()?;
        if !self.co_investigator_ids.contains(&investigator_id) {
            self.co_investigator_ids.push(investigator_id);
            self.touch(actor_id);
        }
        Ok(())
    }

    pub fn remove_co_investigator(&mut self, actor_id: Uuid, investigator_id: Uuid) -> Result<(), ProposalError> {
        self.ensure_editable()?;
        let before = self.co_investigator_ids.len();
        self.co_investigator_ids.retain(|id| *id != investigator_id);
        if self.co_investigator_ids.len() != before {
            self.touch(actor_id);
        }
        Ok(())
    }

    pub fn add_key_person(&mut self, actor_id: Uuid, person: KeyPerson) -> Result<(), ProposalError> {
        self.ensure_editable()?;
        self.key_personnel.push(person);
        self.touch(actor_id);
        Ok(())
    }

    /// Returns the id assigned to the stored attachment.
    pub fn add_attachment(&mut self, actor_id: Uuid, attachment: NewAttachment) -> Result<Uuid, ProposalError> {
        self.ensure_editable()?;
        let id = Uuid::new_v4();
        self.attachments.push(Attachment {
            id,
            file_name: attachment.file_name,
            file_type: attachment.file_type,
            file_size_bytes: attachment.file_size_bytes,
            storage_path: attachment.storage_path,
            uploaded_by: actor_id,
            uploaded_at: Utc::now(),
            category: attachment.category,
        });
        self.touch(actor_id);
        Ok(id)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.details.sponsor_deadline.is_some_and(|deadline| now > deadline)
    }

    /// Whole days until the sponsor deadline; negative once it has passed.
    pub fn days_until_deadline(&self, now: DateTime<Utc>) -> Option<i64> {
        self.details
            .sponsor_deadline
            .map(|deadline| (deadline - now).num_days())
    }

    /// When the proposal entered its current state.
    pub fn state_entered_at(&self) -> DateTime<Utc> {
        self.history.last().map_or(self.created_at, |record| record.timestamp)
    }

    pub fn sla_deadline(&self, workflow: &ProposalWorkflow) -> Option<DateTime<Utc>> {
        workflow
            .registry()
            .sla_deadline(self.state, self.state_entered_at())
    }

    pub fn is_sla_breached(&self, workflow: &ProposalWorkflow, now: DateTime<Utc>) -> bool {
        self.sla_deadline(workflow).is_some_and(|deadline| now > deadline)
    }
}

fn proposal_number(id: Uuid, created_at: DateTime<Utc>) -> String {
    let short_id = id.simple().to_string();
    format!("PROP-{}-{}", created_at.year(), &short_id[..6].to_ascii_uppercase())
}
