//! Logging configuration using tracing

use crate::error::ServerError;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set. Otherwise the filter is `info`, or `debug`
/// when `verbose` is true, which also logs every command and reply.
///
/// # Errors
/// Returns an error if a subscriber has already been installed
pub fn init(verbose: bool) -> Result<(), ServerError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_thread_names(true))
        .try_init()
        .map_err(|e| ServerError::Logging(e.to_string()))
}

fn default_level(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}
