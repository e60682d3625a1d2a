use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::stream::ExchangeMetrics;

/// Initialize the tracing subscriber with the configured log level.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (DEBUG, INFO, ERROR)
pub fn init_tracing(log_level: &str) {
    let Some(directive) = tracing_directive(log_level) else {
        return;
    };

    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("INFO"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// `EnvFilter` directive for a configured level, `None` when logging is off.
#[must_use]
pub fn tracing_directive(log_level: &str) -> Option<String> {
    let level = log_level.trim().to_uppercase();
    match level.as_str() {
        "DISABLED" => None,
        "WARNING" => Some("WARN".to_string()),
        "CRITICAL" => Some("ERROR".to_string()),
        _ => Some(level),
    }
}

/// Log token usage for a finished exchange.
///
/// `completed` is false when the stream ended before the terminal signal
/// (client disconnect or upstream failure).
pub fn log_exchange_complete(metrics: &ExchangeMetrics, elapsed: Duration, completed: bool) {
    info!(
        id = %metrics.client_facing_id,
        model = %metrics.model,
        input_tokens = metrics.input_tokens,
        output_tokens = metrics.output_tokens,
        cache_creation_input_tokens = metrics.cache_creation_input_tokens,
        cache_read_input_tokens = metrics.cache_read_input_tokens,
        stop_reason = metrics.stop_reason.as_deref().unwrap_or("none"),
        completed,
        duration_seconds = elapsed.as_secs_f64(),
        "exchange completed"
    );
}
