use crate::cache::{CacheTier, EvictionPressure, PressureSource};
use crate::error::HarnessError;
use crate::pattern::AccessPattern;
use crate::strategy::Suite;
use crate::utils::{
    format_bytes, format_duration, target_len, validate_file_size, validate_io_size,
    validate_random_fraction,
};
use anyhow::{bail, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

/// Prefetch Benchmark - read throughput of a large file across cache states
/// and prefetch strategies
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// File to read from; must be at least as large as the largest file size
    #[clap(short = 't', long, default_value = crate::defaults::TARGET_FILE, help_heading = "Core Options")]
    pub target: PathBuf,

    /// Output file, one line per measured configuration
    #[clap(short = 'o', long, default_value = crate::defaults::OUTPUT_FILE, help_heading = "Core Options")]
    pub output: PathBuf,

    /// Wall-clock budget per configuration (e.g. 15s, 500ms, 2m)
    #[clap(short = 'd', long, value_parser = parse_duration, default_value = "15s", help_heading = "Core Options")]
    pub duration: Duration,

    /// Leading bytes of the target covered by each experiment (K/M/G suffixes)
    #[clap(long, value_parser = parse_size, value_delimiter = ',', default_values_t = crate::defaults::FILE_SIZES.to_vec(), help_heading = "Matrix")]
    pub file_sizes: Vec<u64>,

    /// Bytes requested per read (K/M/G suffixes)
    #[clap(long, value_parser = parse_size, value_delimiter = ',', default_values_t = crate::defaults::IO_SIZES.to_vec(), help_heading = "Matrix")]
    pub io_sizes: Vec<u64>,

    /// Delay after every read, in nanoseconds (0 = unpaced)
    #[clap(long, value_delimiter = ',', default_values_t = crate::defaults::INTERARRIVAL_TIMES_NS.to_vec(), help_heading = "Matrix")]
    pub interarrival_ns: Vec<u64>,

    /// Lead times of the just-in-time prefetch strategies, in microseconds
    #[clap(long, value_delimiter = ',', default_values_t = crate::defaults::PREFETCH_DELAYS_US.to_vec(), help_heading = "Matrix")]
    pub prefetch_delays_us: Vec<u64>,

    /// Access patterns to measure
    #[clap(long, value_enum, value_delimiter = ',', default_values_t = vec![AccessPattern::Sequential, AccessPattern::Random], help_heading = "Matrix")]
    pub patterns: Vec<AccessPattern>,

    /// Strategy suites to measure
    #[clap(long, value_enum, value_delimiter = ',', default_values_t = vec![Suite::Baseline, Suite::ExtendedBaseline, Suite::Offline, Suite::JustInTime, Suite::Online], help_heading = "Matrix")]
    pub suites: Vec<Suite>,

    /// The target lives on Lustre: control the server-side cache too and run
    /// the ladvise strategies
    #[clap(long, default_value_t = false, help_heading = "Cache Control")]
    pub remote_tier: bool,

    /// Control file written to drop the client page cache
    #[clap(long, default_value = crate::defaults::DROP_CACHES_PATH, help_heading = "Cache Control")]
    pub drop_caches_path: PathBuf,

    /// File read after every cache drop to force eviction by memory pressure,
    /// instead of the target past the largest file size (local filesystems only)
    #[clap(long, conflicts_with = "remote_tier", help_heading = "Cache Control")]
    pub pressure_file: Option<PathBuf>,

    /// Rely on drop_caches alone, without the eviction-pressure read
    #[clap(long, default_value_t = false, conflicts_with_all = ["pressure_file", "remote_tier"], help_heading = "Cache Control")]
    pub no_pressure: bool,

    /// Bytes of eviction pressure read per cache drop (K/M/G suffixes)
    #[clap(long, value_parser = parse_size, default_value_t = crate::defaults::PRESSURE_VOLUME, help_heading = "Cache Control")]
    pub pressure_volume: u64,

    /// Share of the file requested by a random pass
    #[clap(long, default_value_t = crate::defaults::RANDOM_PASS_FRACTION, help_heading = "Matrix")]
    pub random_fraction: f64,

    /// Seed of the random offset generator
    #[clap(long, default_value_t = crate::defaults::RANDOM_SEED, help_heading = "Matrix")]
    pub seed: u64,

    /// Add a free-text desc column to every output line
    #[clap(long, default_value_t = false, help_heading = "Output")]
    pub describe: bool,

    /// Write a JSON summary of the run to this file
    #[clap(long, help_heading = "Output")]
    pub summary_json: Option<PathBuf>,

    /// Pin the measurement thread to this CPU core
    #[clap(long, help_heading = "Core Options")]
    pub cpu_affinity: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short = 'v', long, action = ArgAction::Count, help_heading = "Output")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[clap(short = 'q', long, default_value_t = false, conflicts_with = "verbose", help_heading = "Output")]
    pub quiet: bool,

    /// Also write log lines to this file
    #[clap(long, help_heading = "Output")]
    pub log_file: Option<PathBuf>,
}

/// Validated run configuration
///
/// Converts the command line into what the planner and the cache-control
/// surface need. Lists are deduplicated in order of first appearance.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    pub target: PathBuf,
    pub output: PathBuf,
    pub duration: Duration,
    pub file_sizes: Vec<u64>,
    pub io_sizes: Vec<u64>,
    pub interarrival_ns: Vec<u64>,
    pub prefetch_delays_us: Vec<u64>,
    pub patterns: Vec<AccessPattern>,
    pub suites: Vec<Suite>,
    pub tier: CacheTier,
    pub drop_caches_path: PathBuf,
    pub pressure: Option<EvictionPressure>,
    pub random_fraction: f64,
    pub seed: u64,
    pub describe: bool,
    pub summary_json: Option<PathBuf>,
    pub cpu_affinity: Option<usize>,
}

impl HarnessConfig {
    /// Create the run configuration from CLI arguments
    ///
    /// ## Returns
    /// - `Ok(HarnessConfig)`: Valid configuration ready for planning
    /// - `Err(anyhow::Error)`: A list is empty or a value is out of range
    pub fn from_args(args: &Args) -> Result<Self> {
        let file_sizes = dedup(&args.file_sizes);
        let io_sizes = dedup(&args.io_sizes);
        let interarrival_ns = dedup(&args.interarrival_ns);
        let prefetch_delays_us = dedup(&args.prefetch_delays_us);
        let patterns = dedup(&args.patterns);
        let suites = dedup(&args.suites);

        if file_sizes.is_empty() || io_sizes.is_empty() || interarrival_ns.is_empty() {
            bail!("File sizes, I/O sizes and inter-arrival times must not be empty");
        }
        if patterns.is_empty() || suites.is_empty() {
            bail!("At least one pattern and one suite must be selected");
        }
        if suites.contains(&Suite::JustInTime) && prefetch_delays_us.is_empty() {
            bail!("The jit suite needs at least one prefetch delay");
        }
        if file_sizes.contains(&0) {
            bail!("File size must be greater than 0");
        }
        for &io_size in &io_sizes {
            validate_io_size(io_size)?;
        }
        validate_random_fraction(args.random_fraction)?;

        let tier = if args.remote_tier {
            CacheTier::LocalPlusRemote
        } else {
            CacheTier::LocalOnly
        };

        // Remote filesystems manage the client cache well enough on their own.
        let pressure = if tier == CacheTier::LocalPlusRemote || args.no_pressure {
            None
        } else {
            let source = match &args.pressure_file {
                Some(path) if *path == args.target => {
                    bail!("The pressure file must not be the target file")
                }
                Some(path) => PressureSource::File(path.clone()),
                None => PressureSource::Target {
                    offset: file_sizes.iter().copied().max().unwrap_or(0),
                },
            };
            Some(EvictionPressure {
                source,
                volume: args.pressure_volume,
                chunk: crate::defaults::PRESSURE_IO_SIZE,
            })
        };

        Ok(Self {
            target: args.target.clone(),
            output: args.output.clone(),
            duration: args.duration,
            file_sizes,
            io_sizes,
            interarrival_ns,
            prefetch_delays_us,
            patterns,
            suites,
            tier,
            drop_caches_path: args.drop_caches_path.clone(),
            pressure,
            random_fraction: args.random_fraction,
            seed: args.seed,
            describe: args.describe,
            summary_json: args.summary_json.clone(),
            cpu_affinity: args.cpu_affinity,
        })
    }

    pub fn max_file_size(&self) -> u64 {
        self.file_sizes.iter().copied().max().unwrap_or(0)
    }

    /// Check that the target exists and covers the largest file size.
    pub fn check_target(&self) -> Result<()> {
        let len = target_len(&self.target).map_err(|e| HarnessError::configuration(&self.target, e))?;
        validate_file_size(self.max_file_size(), len)
            .map_err(|e| HarnessError::InvalidConfig(e.to_string()))?;
        Ok(())
    }
}

impl std::fmt::Display for HarnessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sizes = |values: &[u64]| {
            values
                .iter()
                .map(|&v| format_bytes(v))
                .collect::<Vec<_>>()
                .join(", ")
        };
        writeln!(f, "  Target:             {}", self.target.display())?;
        writeln!(f, "  Output:             {}", self.output.display())?;
        writeln!(f, "  Budget:             {}", format_duration(self.duration))?;
        writeln!(f, "  File Sizes:         {}", sizes(&self.file_sizes))?;
        writeln!(f, "  I/O Sizes:          {}", sizes(&self.io_sizes))?;
        writeln!(f, "  Inter-arrival (ns): {:?}", self.interarrival_ns)?;
        writeln!(f, "  Cache Tiers:        {}", self.tier)?;
        match &self.pressure {
            Some(p) => writeln!(
                f,
                "  Eviction Pressure:  {} from {}",
                format_bytes(p.volume),
                p.source
            )?,
            None => writeln!(f, "  Eviction Pressure:  Disabled")?,
        }
        let affinity = self
            .cpu_affinity
            .map_or("Not set".to_string(), |c| c.to_string());
        write!(f, "  CPU Affinity:       {}", affinity)
    }
}

fn dedup<T: PartialEq + Copy>(values: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(values.len());
    for &v in values {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

/// Parse duration from string (e.g., "10s", "5m", "1h")
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s") // Default to seconds
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;
    if !num.is_finite() || num < 0.0 {
        return Err(format!("Duration must be a non-negative number: {}", s));
    }

    let duration = match unit {
        "ms" => Duration::from_secs_f64(num / 1000.0),
        "s" => Duration::from_secs_f64(num),
        "m" => Duration::from_secs_f64(num * 60.0),
        "h" => Duration::from_secs_f64(num * 3600.0),
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Ok(duration)
}

/// Parse a byte count with an optional binary suffix ("4K", "16M", "1G", "4096")
fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let upper = s.to_ascii_uppercase();
    let trimmed = upper
        .strip_suffix("IB")
        .or_else(|| upper.strip_suffix('B'))
        .unwrap_or(&upper);

    let (num_str, shift) = match trimmed.chars().last() {
        Some('K') => (&trimmed[..trimmed.len() - 1], 10),
        Some('M') => (&trimmed[..trimmed.len() - 1], 20),
        Some('G') => (&trimmed[..trimmed.len() - 1], 30),
        Some('T') => (&trimmed[..trimmed.len() - 1], 40),
        _ => (trimmed, 0),
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid size: {}", s))?;
    num.checked_mul(1u64 << shift)
        .ok_or_else(|| format!("Size is too large: {}", s))
}
