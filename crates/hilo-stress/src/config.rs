use anyhow::bail;
use clap::Parser;
use hilo::{AllocatorConfig, MIN_CAPACITY};

/// Runtime configuration for the `hilo-stress` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file in the working directory is loaded first).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "hilo-stress",
    version,
    about = "Hammers a hilo allocator from many threads and checks every key stays duplicate-free"
)]
pub struct CliArgs {
    /// Number of OS threads incrementing concurrently.
    ///
    /// Environment variable: `HILO_THREADS`
    #[arg(long, env = "HILO_THREADS", default_value_t = 8)]
    pub threads: usize,

    /// Number of distinct sequence keys the threads spread over.
    ///
    /// Keys beyond the initial capacity force the registry to grow while the
    /// workload runs.
    ///
    /// Environment variable: `HILO_KEYS`
    #[arg(long, env = "HILO_KEYS", default_value_t = 16)]
    pub keys: usize,

    /// Increments performed by each thread.
    ///
    /// Environment variable: `HILO_INCREMENTS`
    #[arg(long, env = "HILO_INCREMENTS", default_value_t = 100_000)]
    pub increments: usize,

    /// Initial registry capacity of the allocator (minimum 8).
    ///
    /// Environment variable: `HILO_INITIAL_CAPACITY`
    #[arg(long, env = "HILO_INITIAL_CAPACITY", default_value_t = 64)]
    pub initial_capacity: usize,

    /// Seed handed to the backend when a key reserves its first batch.
    ///
    /// Environment variable: `HILO_SEED`
    #[arg(long, env = "HILO_SEED", default_value_t = 0)]
    pub seed: i32,
}

#[derive(Debug, Clone)]
pub struct StressConfig {
    pub threads: usize,
    pub keys: usize,
    pub increments: usize,
    pub seed: i32,
    pub allocator: AllocatorConfig,
}

impl StressConfig {
    /// Total number of values the run hands out across all keys.
    pub fn total_increments(&self) -> usize {
        self.threads * self.increments
    }
}

impl TryFrom<CliArgs> for StressConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.threads == 0 {
            bail!("HILO_THREADS must be greater than 0");
        }
        if args.keys == 0 {
            bail!("HILO_KEYS must be greater than 0");
        }
        if args.initial_capacity < MIN_CAPACITY {
            bail!(
                "HILO_INITIAL_CAPACITY ({}) is below the minimum of {}",
                args.initial_capacity,
                MIN_CAPACITY
            );
        }
        args.threads
            .checked_mul(args.increments)
            .ok_or_else(|| anyhow::anyhow!("Overflow in total increment computation"))?;

        let allocator = AllocatorConfig::with_initial_capacity(args.initial_capacity);
        allocator.validate()?;

        Ok(Self {
            threads: args.threads,
            keys: args.keys,
            increments: args.increments,
            seed: args.seed,
            allocator,
        })
    }
}
