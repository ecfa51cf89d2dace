use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::DomainEvent;
use crate::observability::transition_metrics;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event channel is full (capacity {capacity})")]
    ChannelFull { capacity: usize },

    #[error("event channel is closed")]
    ChannelClosed,

    #[error("publish failed: {reason}")]
    Delivery { reason: String },
}

/// Outbound port for domain events. Delivery is best effort; callers never wait on it
/// for correctness.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError>;
}

/// Hands events to `publisher` on a background task and returns immediately.
/// Failures are logged and counted, never reported back.
pub fn spawn_publish<P>(publisher: Arc<P>, events: Vec<DomainEvent>)
where
    P: EventPublisher + ?Sized + 'static,
{
    if events.is_empty() {
        return;
    }
    tokio::spawn(async move {
        for event in events {
            let event_id = event.event_id;
            let event_type = event.event_type();
            if let Err(e) = publisher.publish(event).await {
                transition_metrics().record_publish_failure();
                warn!(
                    event.id = %event_id,
                    event.kind = event_type,
                    error = %e,
                    "Failed to publish domain event"
                );
            }
        }
    });
}

/// Publishes into a bounded tokio channel. Never blocks: a full channel is an error.
#[derive(Debug, Clone)]
pub struct ChannelEventPublisher {
    sender: mpsc::Sender<DomainEvent>,
    capacity: usize,
}

impl ChannelEventPublisher {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DomainEvent>) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender, capacity }, receiver)
    }
}

#[async_trait]
impl EventPublisher for ChannelEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PublishError::ChannelFull {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => PublishError::ChannelClosed,
        })
    }
}

/// Writes events to the log. Used when no broker is configured.
#[derive(Debug, Clone, Default)]
pub struct LoggingEventPublisher;

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        info!(
            event.id = %event.event_id,
            event.kind = event.event_type(),
            aggregate.id = %event.aggregate_id,
            tenant.id = %event.tenant_id,
            version = event.version,
            "Domain event"
        );
        match serde_json::to_string(&event) {
            Ok(body) => debug!(body = %body, "Domain event payload"),
            Err(e) => debug!(error = %e, "Domain event payload not serializable"),
        }
        Ok(())
    }
}
