//! Tracing subscriber setup
//!
//! JSON output to stdout, filtered by `RUST_LOG` when set.

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default directives used when `RUST_LOG` is not set
pub const DEFAULT_DIRECTIVES: &str = "vrs_backend=info,sqlx=warn";

/// Build the filter from `RUST_LOG`, falling back to `default_directives`
pub fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Install the global subscriber
///
/// Fails if a global subscriber is already set.
pub fn init(default_directives: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(default_directives))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize tracing: {}", e))
}
