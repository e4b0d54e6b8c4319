//! # Prefetch Benchmark Library
//!
//! A read-throughput benchmark for large files, implemented in Rust. It
//! measures how fast a file can be read back under controlled cache states
//! and prefetch strategies, on local filesystems and on Lustre clients where
//! a second, server-side cache sits behind the client page cache.
//!
//! ## Measured Strategies
//!
//! - **Baseline**: cold cache, buffered and with `O_DIRECT`
//! - **Extended baseline**: cold cache with sequential or random access advice
//! - **Offline prefetch**: file read once before the timed pass, optionally
//!   evicted from one of the two cache tiers afterwards
//! - **JIT prefetch**: whole-file prefetch a fixed lead time before the pass
//! - **Online prefetch**: range prefetch issued as the timed pass advances
//!
//! ## Architecture Overview
//!
//! - `cli`: Command-line parsing and the validated run configuration
//! - `plan`: Expansion of the configuration into the ordered experiment list
//! - `strategy`: The table of measured strategies
//! - `benchmark`: Experiment lifecycle (precondition, prefetch, timed pass)
//! - `io_loop`: The timed read loop and its aligned buffer
//! - `cache`: Cache-control surface over `drop_caches`, `fadvise`, `ladvise`
//!   and async reads
//! - `pattern`: Sequential and seeded random offset sequences
//! - `metrics` / `results`: Aggregation and the line-oriented output file
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use prefetch_bench::{
//!     cache::{CacheTier, PageCacheControl},
//!     cli::{Args, HarnessConfig},
//!     plan::build_plan,
//!     ExperimentRunner, ResultsManager,
//! };
//! use clap::Parser;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = HarnessConfig::from_args(&Args::parse())?;
//!     let mut cache = PageCacheControl::new(
//!         CacheTier::LocalOnly,
//!         &config.drop_caches_path,
//!         None,
//!         config.max_file_size() as usize,
//!     );
//!     let runner = ExperimentRunner::new(config.duration);
//!     let mut results = ResultsManager::new(&config.output)?;
//!
//!     for experiment in build_plan(&config) {
//!         let aggregate = runner.run(&experiment.config, &mut cache)?;
//!         results.add_record(experiment.record(&aggregate, false))?;
//!     }
//!     results.finalize()
//! }
//! ```

/// Experiment lifecycle
///
/// Establishes the cache precondition, issues the prefetch, runs the timed
/// pass and repeats until the wall-clock budget is spent.
pub mod benchmark;

/// Cache-control surface for both cache tiers
pub mod cache;

/// Command-line interface and configuration
///
/// Size and duration lists accept human-readable suffixes ("4K", "1G",
/// "15s") and are validated before any experiment is planned.
pub mod cli;

pub mod clock;

/// Typed errors that decide whether a run aborts or skips an experiment
pub mod error;

pub mod io_loop;

pub mod logging;

/// Per-pass measurements and their aggregation into a throughput figure
pub mod metrics;

pub mod pattern;

/// Ordered experiment list derived from the run configuration
pub mod plan;

/// Output line formatting and the optional JSON summary
pub mod results;

pub mod strategy;

pub mod utils;

/// Main experiment execution engine
pub use benchmark::{ExperimentConfig, ExperimentRunner};

/// Command-line interface types
pub use cli::{Args, HarnessConfig};

/// Cache-control capability used by the engine
pub use cache::{CacheControl, CacheTier};

pub use error::HarnessError;

/// Result collection and management
pub use results::{MeasurementRecord, ResultsManager};

/// The current version of the prefetch benchmark
///
/// Populated from Cargo.toml and written into the JSON summary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
///
/// Together these reproduce the historical fixed campaign: a 1 GiB region of
/// the target read with six I/O sizes, unpaced, sequential and random.
pub mod defaults {
    use std::time::Duration;

    /// Default target file
    pub const TARGET_FILE: &str = "/mnt/disk/random_file.bin";

    /// Default output file name
    pub const OUTPUT_FILE: &str = "output.csv";

    /// Wall-clock budget per experiment
    ///
    /// Passes repeat until this much time has elapsed since the first
    /// precondition; at least one pass always runs.
    pub const DURATION: Duration = Duration::from_secs(15);

    /// Seed of the random offset generator
    pub const RANDOM_SEED: u64 = 154645134;

    /// Share of the file requested by one random pass
    pub const RANDOM_PASS_FRACTION: f64 = 0.1;

    pub const FILE_SIZES: [u64; 1] = [1 << 30];

    pub const IO_SIZES: [u64; 6] = [
        4 << 10,
        16 << 10,
        64 << 10,
        1 << 20,
        16 << 20,
        256 << 20,
    ];

    /// Lead times of the JIT strategies, in microseconds
    pub const PREFETCH_DELAYS_US: [u64; 5] = [0, 1_000, 10_000, 100_000, 1_000_000];

    pub const INTERARRIVAL_TIMES_NS: [u64; 1] = [0];

    pub const DROP_CACHES_PATH: &str = "/proc/sys/vm/drop_caches";

    /// Read size of the eviction-pressure read
    pub const PRESSURE_IO_SIZE: usize = 4 << 20;

    /// Bytes read for eviction pressure after each cache drop
    pub const PRESSURE_VOLUME: u64 = 4 << 30;
}
