// src/utils/logging.rs
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global tracing subscriber.
/// Filters come from `RUST_LOG`; without it, `default_level` applies to this crate
/// and everything else stays at `warn`.
pub fn setup_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,gig_scout={}", default_level)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::debug!("Logging setup complete.");
}
