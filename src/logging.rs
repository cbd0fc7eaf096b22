//! Logging initialisation.
//!
//! Build steps log through `tracing`; this installs the stderr subscriber the
//! binary uses. Filtering follows `RUST_LOG` and defaults to `info`, so the
//! step summaries and patch warnings are visible without configuration.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

/// Initialise the global tracing subscriber.
///
/// Call once from `main`. A second call (or a subscriber installed by a test
/// harness) is ignored.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
