//! Logging setup for applications embedding the pipeline

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,mm_tx=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Human-readable logs; `RUST_LOG` overrides the default filter.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init()
        .is_ok()
}

/// JSON logs with span fields, for log shippers
pub fn init_json_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json().with_current_span(true))
        .try_init()
        .is_ok()
}
