//! # Structured Logging Module
//!
//! Environment-aware structured logging for the fulfillment core. Batch runs
//! interleave many concurrent carrier calls, so every log line carries the
//! order/shipment identifiers needed to reconstruct one job's path through
//! the system.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; only the first call installs the subscriber.
/// `RUST_LOG` overrides the environment-derived default level.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},fulfillment_core={log_level}")));

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(filter),
        );

        // A host application may have installed its own subscriber already.
        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            environment = %environment,
            "📦 STRUCTURED LOGGING: initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("FULFILLMENT_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
        .to_lowercase()
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for shipment operations
pub fn log_shipment_operation(
    operation: &str,
    shipment_id: Option<uuid::Uuid>,
    order_id: Option<uuid::Uuid>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        shipment_id = shipment_id.map(|id| id.to_string()),
        order_id = order_id.map(|id| id.to_string()),
        status = %status,
        details = details,
        "🚚 SHIPMENT_OPERATION"
    );
}

/// Log structured data for batch label runs
pub fn log_batch_operation(
    operation: &str,
    selected: usize,
    succeeded: usize,
    failed: usize,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        selected = selected,
        succeeded = succeeded,
        failed = failed,
        details = details,
        "🏷️ BATCH_OPERATION"
    );
}
