// Grant Lifecycle Library - grant proposal workflow engine
// This exposes the core components for testing and integration

pub mod config;
pub mod engine;
pub mod events;
pub mod observability;
pub mod persistence;
pub mod proposal;
pub mod service;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use config::{config, init_config, GrantLifecycleConfig};
pub use engine::{EngineError, TransitionEngine, TransitionInfo};
pub use events::{
    spawn_publish, ChannelEventPublisher, DomainEvent, EventPayload, EventPublisher,
    LoggingEventPublisher, PublishError,
};
pub use observability::{transition_metrics, OperationTimer, TransitionMetrics, TransitionStats};
pub use persistence::{InMemoryProposalRepository, ListFilter, Page, ProposalRepository, RepositoryError};
pub use proposal::{Proposal, ProposalError, TransitionOutcome, TransitionRecord, TransitionRequest};
pub use service::{CreateProposalInput, ProposalService, ServiceError, TransitionProposalInput};
pub use telemetry::{create_proposal_span, generate_correlation_id, init_telemetry};
pub use workflow::{
    roles, ActorContext, ProposalState, ProposalTransition, ProposalWorkflow, StateMetadata,
    StateMetadataRegistry, UnlistedStatePolicy,
};
