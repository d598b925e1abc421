mod config;
mod driver;
mod telemetry;

use clap::Parser;
use config::{CliArgs, StressConfig};
use telemetry::init_telemetry;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = StressConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let report = driver::run(&config)?;

    for key in &report.keys {
        tracing::debug!(
            key = %key.key,
            issued = key.issued,
            last = ?key.last,
            duplicates = key.duplicates,
            gaps = key.gaps,
            "key summary"
        );
    }
    tracing::info!(
        issued = report.issued(),
        reservations = report.reservations,
        registry_capacity = report.registry_capacity,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "run finished at {:.0} increments/s",
        report.throughput()
    );

    if report.duplicates() > 0 {
        tracing::error!(duplicates = report.duplicates(), "duplicate values handed out");
        anyhow::bail!("{} duplicate values detected", report.duplicates());
    }
    if report.gaps() > 0 {
        tracing::warn!(gaps = report.gaps(), "sequences have gaps");
    }
    Ok(())
}

fn log_startup_info(config: &StressConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting stress run with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting stress run: {} threads x {} increments ({} total) over {} keys",
            config.threads,
            config.increments,
            config.total_increments(),
            config.keys
        );
    }
}
