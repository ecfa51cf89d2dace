// Proposal application service
//
// Loads aggregates through the repository port, runs the transition protocol, persists with a
// version check and hands raised events to the publisher without waiting on delivery.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::config::GrantLifecycleConfig;
use crate::events::{spawn_publish, DomainEvent, EventPublisher};
use crate::observability::{transition_metrics, OperationTimer};
use crate::persistence::{ListFilter, Page, ProposalRepository, RepositoryError};
use crate::proposal::{
    DateRange, KeyPerson, NewProposal, Proposal, ProposalError, ProposalUpdates, TransitionRequest,
};
use crate::telemetry::{create_proposal_span, generate_correlation_id};
use crate::workflow::{roles, ActorContext, ProposalState, ProposalTransition, ProposalWorkflow};

pub const DEFAULT_DEADLINE_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Proposal(#[from] ProposalError),

    #[error("proposal {0} not found")]
    NotFound(Uuid),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("actor {actor_id} may not {action} this proposal")]
    Forbidden { actor_id: Uuid, action: &'static str },

    #[error("repository failure: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ServiceError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Conflict { expected, found, .. } => {
                ServiceError::Proposal(ProposalError::VersionConflict {
                    expected,
                    actual: found,
                })
            }
            RepositoryError::NotFound(id) => ServiceError::NotFound(id),
            other => ServiceError::Repository(other),
        }
    }
}

impl ServiceError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Proposal(e) => e.error_code(),
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::InvalidInput(_) => "INVALID_INPUT",
            ServiceError::Forbidden { .. } => "UNAUTHORIZED",
            ServiceError::Repository(_) => "INTERNAL",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Proposal(e) => e.status_code(),
            ServiceError::NotFound(_) => 404,
            ServiceError::InvalidInput(_) => 400,
            ServiceError::Forbidden { .. } => 403,
            ServiceError::Repository(_) => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateProposalInput {
    pub title: String,
    pub short_title: String,
    pub abstract_text: String,
    pub principal_investigator_id: Uuid,
    pub sponsor_id: Uuid,
    pub department: String,
    pub project_period: DateRange,
    pub sponsor_deadline: Option<DateTime<Utc>>,
    pub internal_deadline: Option<DateTime<Utc>>,
    pub research_area: String,
    pub keywords: Vec<String>,
}

impl CreateProposalInput {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.title.trim().is_empty() {
            return Err(ServiceError::InvalidInput("title is required".into()));
        }
        if self.principal_investigator_id.is_nil() {
            return Err(ServiceError::InvalidInput(
                "principal investigator is required".into(),
            ));
        }
        if self.sponsor_id.is_nil() {
            return Err(ServiceError::InvalidInput("sponsor is required".into()));
        }
        if !self.project_period.is_valid() {
            return Err(ServiceError::InvalidInput(
                "project end date must not precede start date".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionProposalInput {
    pub proposal_id: Uuid,
    pub transition: ProposalTransition,
    pub comment: String,
    /// 0 skips the version check.
    pub expected_version: u64,
}

impl TransitionProposalInput {
    pub fn new(proposal_id: Uuid, transition: ProposalTransition) -> Self {
        Self {
            proposal_id,
            transition,
            comment: String::new(),
            expected_version: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub admin_role: String,
    pub publish_enabled: bool,
    pub metrics_enabled: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            admin_role: roles::ADMIN.to_string(),
            publish_enabled: true,
            metrics_enabled: true,
        }
    }
}

impl From<&GrantLifecycleConfig> for ServiceSettings {
    fn from(config: &GrantLifecycleConfig) -> Self {
        Self {
            admin_role: config.authorization.admin_role.clone(),
            publish_enabled: config.events.publish_enabled,
            metrics_enabled: config.observability.metrics_enabled,
        }
    }
}

pub struct ProposalService<R, P> {
    repository: Arc<R>,
    publisher: Arc<P>,
    workflow: Arc<ProposalWorkflow>,
    settings: ServiceSettings,
}

impl<R, P> ProposalService<R, P>
where
    R: ProposalRepository,
    P: EventPublisher + 'static,
{
    pub fn new(repository: Arc<R>, publisher: Arc<P>, workflow: Arc<ProposalWorkflow>) -> Self {
        Self {
            repository,
            publisher,
            workflow,
            settings: ServiceSettings::default(),
        }
    }

    /// Builds the workflow and settings from loaded configuration.
    pub fn from_config(repository: Arc<R>, publisher: Arc<P>, config: &GrantLifecycleConfig) -> Self {
        let workflow = ProposalWorkflow::with_policy(config.authorization.unlisted_state_policy);
        Self::new(repository, publisher, Arc::new(workflow)).with_settings(ServiceSettings::from(config))
    }

    pub fn with_settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn workflow(&self) -> &ProposalWorkflow {
        &self.workflow
    }

    pub async fn create_proposal(
        &self,
        actor: &ActorContext,
        input: CreateProposalInput,
    ) -> Result<Proposal, ServiceError> {
        let span = self.span("create_proposal", actor, None);
        async move {
            input.validate()?;

            let mut proposal = Proposal::new(NewProposal {
                tenant_id: actor.tenant_id,
                created_by: actor.actor_id,
                title: input.title,
                principal_investigator_id: input.principal_investigator_id,
                sponsor_id: input.sponsor_id,
                department: input.department,
                project_period: input.project_period,
            });
            proposal.update(
                actor.actor_id,
                ProposalUpdates {
                    short_title: Some(input.short_title),
                    abstract_text: Some(input.abstract_text),
                    research_area: Some(input.research_area),
                    keywords: Some(input.keywords),
                    sponsor_deadline: input.sponsor_deadline,
                    internal_deadline: input.internal_deadline,
                    ..Default::default()
                },
            )?;

            self.repository.insert(&proposal).await?;
            info!(
                proposal.id = %proposal.id(),
                proposal.number = proposal.proposal_number(),
                "Proposal created"
            );

            let events = proposal.take_pending_events();
            self.publish(events);
            Ok::<_, ServiceError>(proposal)
        }
        .instrument(span)
        .await
    }

    /// Another tenant's proposal is reported as not found.
    pub async fn get_proposal(&self, actor: &ActorContext, id: Uuid) -> Result<Proposal, ServiceError> {
        self.repository
            .find_by_id(actor.tenant_id, id)
            .await?
            .ok_or(ServiceError::NotFound(id))
    }

    pub async fn update_proposal(
        &self,
        actor: &ActorContext,
        id: Uuid,
        updates: ProposalUpdates,
        expected_version: u64,
    ) -> Result<Proposal, ServiceError> {
        let span = self.span("update_proposal", actor, Some(id));
        async move {
            let mut proposal = self.get_proposal(actor, id).await?;
            let stored_version = proposal.version();
            if expected_version > 0 && expected_version != stored_version {
                return Err(self.rejected(ProposalError::VersionConflict {
                    expected: expected_version,
                    actual: stored_version,
                }));
            }

            proposal.update(actor.actor_id, updates).map_err(|e| self.rejected(e))?;
            self.save(&proposal, stored_version).await?;
            Ok::<_, ServiceError>(proposal)
        }
        .instrument(span)
        .await
    }

    pub async fn add_key_personnel(
        &self,
        actor: &ActorContext,
        id: Uuid,
        person: KeyPerson,
    ) -> Result<Proposal, ServiceError> {
        let span = self.span("add_key_personnel", actor, Some(id));
        async move {
            let mut proposal = self.get_proposal(actor, id).await?;
            let stored_version = proposal.version();
            proposal
                .add_key_person(actor.actor_id, person)
                .map_err(|e| self.rejected(e))?;
            self.save(&proposal, stored_version).await?;
            info!(proposal.id = %id, key_personnel = proposal.key_personnel().len(), "Key person added");
            Ok::<_, ServiceError>(proposal)
        }
        .instrument(span)
        .await
    }

    /// Load, run the transition protocol, persist against the loaded version, then publish.
    pub async fn transition_proposal(
        &self,
        actor: &ActorContext,
        input: TransitionProposalInput,
    ) -> Result<Proposal, ServiceError> {
        let span = self.span("transition_proposal", actor, Some(input.proposal_id));
        async move {
            let timer = OperationTimer::new("transition_proposal");
            let mut proposal = self.get_proposal(actor, input.proposal_id).await?;
            let stored_version = proposal.version();

            let request = TransitionRequest::new(input.transition)
                .with_comment(input.comment)
                .expecting_version(input.expected_version);
            proposal
                .transition_to(&self.workflow, actor, request)
                .map_err(|e| self.rejected(e))?;

            self.save(&proposal, stored_version).await?;
            if self.settings.metrics_enabled {
                transition_metrics().record_committed();
            }

            let events = proposal.take_pending_events();
            self.publish(events);
            timer.finish();
            Ok::<_, ServiceError>(proposal)
        }
        .instrument(span)
        .await
    }

    /// Only drafts can be deleted, by their PI or an administrator.
    pub async fn delete_proposal(&self, actor: &ActorContext, id: Uuid) -> Result<(), ServiceError> {
        let proposal = self.get_proposal(actor, id).await?;
        if proposal.state() != ProposalState::Draft {
            return Err(ServiceError::InvalidInput(
                "only draft proposals can be deleted".into(),
            ));
        }
        if proposal.principal_investigator_id() != actor.actor_id
            && !actor.has_role(&self.settings.admin_role)
        {
            return Err(ServiceError::Forbidden {
                actor_id: actor.actor_id,
                action: "delete",
            });
        }

        self.repository.delete(actor.tenant_id, id).await?;
        info!(proposal.id = %id, actor.id = %actor.actor_id, "Proposal deleted");
        Ok(())
    }

    pub async fn list_by_state(
        &self,
        actor: &ActorContext,
        state: ProposalState,
        filter: ListFilter,
    ) -> Result<Page<Proposal>, ServiceError> {
        Ok(self
            .repository
            .list_by_state(actor.tenant_id, state, filter)
            .await?)
    }

    pub async fn count_by_state(
        &self,
        actor: &ActorContext,
    ) -> Result<BTreeMap<ProposalState, usize>, ServiceError> {
        Ok(self.repository.count_by_state(actor.tenant_id).await?)
    }

    /// Non-terminal proposals due within `days` (7 when `days` is not positive).
    pub async fn upcoming_deadlines(
        &self,
        actor: &ActorContext,
        days: i64,
    ) -> Result<Vec<Proposal>, ServiceError> {
        let days = if days > 0 { days } else { DEFAULT_DEADLINE_WINDOW_DAYS };
        let now = Utc::now();
        Ok(self
            .repository
            .upcoming_deadlines(actor.tenant_id, now, now + Duration::days(days))
            .await?)
    }

    /// Transitions the actor could perform on the proposal right now.
    pub async fn available_transitions(
        &self,
        actor: &ActorContext,
        id: Uuid,
    ) -> Result<BTreeSet<ProposalTransition>, ServiceError> {
        let proposal = self.get_proposal(actor, id).await?;
        Ok(proposal.permitted_transitions(&self.workflow, actor))
    }

    async fn save(&self, proposal: &Proposal, expected_version: u64) -> Result<(), ServiceError> {
        match self.repository.save(proposal, expected_version).await {
            Ok(()) => Ok(()),
            Err(e) => match ServiceError::from(e) {
                ServiceError::Proposal(conflict) => Err(self.rejected(conflict)),
                other => Err(other),
            },
        }
    }

    fn rejected(&self, error: ProposalError) -> ServiceError {
        if self.settings.metrics_enabled {
            transition_metrics().record_rejection(&error);
        }
        warn!(code = error.error_code(), error = %error, "Proposal change rejected");
        ServiceError::Proposal(error)
    }

    fn publish(&self, events: Vec<DomainEvent>) {
        if self.settings.publish_enabled {
            spawn_publish(Arc::clone(&self.publisher), events);
        }
    }

    fn span(&self, operation: &str, actor: &ActorContext, proposal_id: Option<Uuid>) -> tracing::Span {
        create_proposal_span(
            operation,
            actor.tenant_id,
            proposal_id,
            actor.actor_id,
            &generate_correlation_id(),
        )
    }
}
