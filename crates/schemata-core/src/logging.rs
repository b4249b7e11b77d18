//! Logging integration.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-operation spans.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The filter is read from `settings.log_level` (e.g. "debug", "info",
/// "schemata_schema=debug"). In debug mode a pretty, human-readable format is
/// used; otherwise a structured JSON format is used. Events go to stderr so
/// stdout stays free for command output. Calling this more than once is
/// harmless: later calls leave the first subscriber in place.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for one core operation.
///
/// # Examples
///
/// ```
/// use schemata_core::logging::operation_span;
///
/// let span = operation_span("register_object", "customer");
/// let _guard = span.enter();
/// tracing::info!("provisioning");
/// ```
pub fn operation_span(operation: &str, target: &str) -> tracing::Span {
    tracing::info_span!("schemata", op = operation, target = target)
}
