//! Structured tracing for flowgraph.
//!
//! Logging is controlled by the `RUST_LOG` environment variable. Default
//! level is `warn`. Each pipeline phase (`parse`, `build_pe`, `build_cfg`,
//! `build_pdg`, `emit`) is wrapped in an `info_span!` so `RUST_LOG=info`
//! shows phase-level progress and `RUST_LOG=debug` shows per-method detail.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber using `RUST_LOG`, defaulting to `warn`.
///
/// # Panics
///
/// Panics if a subscriber has already been installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

/// Initialize tracing with an explicit filter string, for tests.
pub fn init_tracing_with_filter(filter: &str) {
    let filter = EnvFilter::new(filter);
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init();
}
