//! Diagnostic tracing for pippy.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: progress and debug diagnostics via `RUST_LOG`,
//!   output to stderr.
//!
//! - **Reporting (`io/report`)**: output the user must see whatever the
//!   filter says (a failing command's stderr, fallback warnings).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `info` if unset so progress lines show.
/// Output: stderr, compact format, no timestamps.
///
/// # Example
/// ```bash
/// RUST_LOG=pippy=debug pippy install
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_target(false)
                .compact(),
        )
        .init();
}
