//! Diagnostic tracing for the housekeeper binary.
//!
//! Operator-facing output (change summaries, diffs, MR links) is printed by
//! the CLI; this module only covers `RUST_LOG`-controlled diagnostics.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. Output goes to stderr in compact
/// format, e.g. `RUST_LOG=housekeeper=debug housekeeper --dry-run`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
