//! # Logging
//!
//! Log events from the binary and from the instrumented library entry points
//! (`validate`, `detect`) are written to stderr, keeping stdout for command
//! output. The level is taken from `RUST_LOG` and defaults to `info`:
//!
//! ```bash
//! RUST_LOG=aweme_id=debug aweme-id validate --corpus samples.json
//! ```

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339()),
        )
        .try_init()?;
    Ok(())
}
