use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Initialize structured logging on stderr, leaving stdout to command output.
/// RUST_LOG wins over the configured level when set.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
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

    tracing::info!(json = config.json_logs, "bidflow telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span for a realtime sync session
pub fn create_sync_span(operation: &str) -> tracing::Span {
    tracing::info_span!(
        "realtime_sync",
        operation = operation,
        correlation.id = %generate_correlation_id(),
    )
}

/// Span for one bid status change, from confirmation to commit
pub fn create_transition_span(bid_id: &str, from: &str, to: &str) -> tracing::Span {
    tracing::info_span!(
        "bid_transition",
        bid.id = bid_id,
        transition.from = from,
        transition.to = to,
        correlation.id = %generate_correlation_id(),
    )
}

/// Shutdown telemetry gracefully
pub fn shutdown_telemetry() {
    // For structured logging, no explicit shutdown needed
    tracing::info!("bidflow telemetry shutdown complete");
}
