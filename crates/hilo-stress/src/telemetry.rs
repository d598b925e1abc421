//! Console logging for the stress driver.
//!
//! Events are filtered through `RUST_LOG` (default `info`) and printed by the
//! `tracing_subscriber::fmt` layer. Set `RUST_LOG=hilo=debug` to see key
//! registration and registry growth, or `hilo=trace` for every batch
//! reservation.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_file(true),
        )
        .try_init()?;
    Ok(())
}
