use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Install the global tracing subscriber. Logs go to stderr so command output stays parseable.
/// RUST_LOG wins over `log_level` when both are set.
pub fn init_telemetry(settings: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if settings.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    tracing::info!(
        json = settings.json_logs,
        metrics = settings.metrics_enabled,
        "Grant lifecycle telemetry initialized"
    );
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span carrying the common attributes of a proposal operation
pub fn create_proposal_span(
    operation: &str,
    tenant_id: Uuid,
    proposal_id: Option<Uuid>,
    actor_id: Uuid,
    correlation_id: &str,
) -> tracing::Span {
    tracing::info_span!(
        "proposal_operation",
        operation = operation,
        tenant.id = %tenant_id,
        proposal.id = proposal_id.map(tracing::field::display),
        actor.id = %actor_id,
        correlation.id = correlation_id,
        otel.kind = "internal"
    )
}
