//! # Experiment Runner
//!
//! This module contains the measurement engine. Given one fully-resolved
//! [`ExperimentConfig`] it repeatedly establishes a cache precondition, drives
//! a timed pass over the target, and folds the pass into an aggregate until the
//! duration budget is spent.
//!
//! ## Experiment Lifecycle
//!
//! 1. **Open**: The target is opened once per experiment, buffered or with
//!    `O_DIRECT` depending on the open mode.
//! 2. **Precondition**: Outstanding forced reads are settled, caches are
//!    dropped, and the file is optionally re-read and partially evicted. Nothing
//!    in this phase is billed.
//! 3. **Measuring**: Access advice and just-in-time prefetch (plus its lead
//!    sleep) are applied, then one timed pass runs over a fresh offset sequence.
//! 4. **Repeat or finalize**: Once at least one pass has run and the wall-clock
//!    time since the first precondition reaches the budget, the loop stops and
//!    forced reads are settled a final time.
//!
//! ## Budget Semantics
//!
//! The budget covers preconditions and sleeps as well as billed I/O, so an
//! experiment with an expensive precondition runs fewer passes. A pass that
//! starts before the budget is spent always completes; there is no per-pass
//! timeout.

use crate::cache::{AccessAdvice, CacheControl, PrefetchPolicy};
use crate::clock::{elapsed_us, timestamp_us};
use crate::error::{HarnessError, Result};
use crate::io_loop::{OnlinePrefetch, ReadBuffer, TimedLoop, BUFFER_ALIGNMENT};
use crate::metrics::ExperimentAggregate;
use crate::pattern::{AccessPattern, OffsetSequence};
use crate::utils::{format_bytes, format_duration};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// How the target file descriptor is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenMode {
    /// Regular buffered reads through the page cache
    Buffered,
    /// `O_DIRECT`: reads bypass the page cache and readahead
    Direct,
}

/// How the client tier is emptied after the warming read of a
/// [`CachePrecondition::WarmServer`] precondition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEviction {
    /// Drop the whole client page cache
    DropCaches,
    /// `DONTNEED` advisory over the file range
    RangeAdvice,
}

/// Cache state established before every timed pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachePrecondition {
    /// Nothing cached in either tier
    Cold,
    /// Read once, then evicted from the server tier only
    WarmClient,
    /// Read once, then evicted from the client tier only
    WarmServer { client_eviction: ClientEviction },
    /// Read once, nothing evicted
    FullyWarm,
}

impl CachePrecondition {
    pub fn requires_remote(self) -> bool {
        matches!(self, CachePrecondition::WarmClient)
    }

    fn needs_warming_read(self) -> bool {
        !matches!(self, CachePrecondition::Cold)
    }
}

/// Prefetching performed as part of the strategy under test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefetchPlan {
    None,
    /// Whole-file prefetch, then a lead sleep, before the timed pass
    JustInTime { policy: PrefetchPolicy, lead: Duration },
    /// Range prefetch during the pass, whenever an offset is a stride multiple
    Online { policy: PrefetchPolicy, stride: u64 },
}

/// One fully-resolved measurement.
///
/// Built by the planner from a strategy and a point in the parameter matrix.
/// Immutable once built; one instance drives exactly one measurement.
#[derive(Clone, Debug)]
pub struct ExperimentConfig {
    /// File under test; must be at least `file_size` bytes long
    pub target: PathBuf,

    /// Bytes of the target covered by the experiment
    pub file_size: u64,

    /// Bytes requested per read; never larger than `file_size`
    pub io_size: u64,

    /// Delay after each read in nanoseconds (0 = unpaced)
    pub interarrival_ns: u64,

    pub pattern: AccessPattern,

    pub open_mode: OpenMode,

    /// Access hint applied over the file range before each pass
    pub access_advice: Option<AccessAdvice>,

    pub precondition: CachePrecondition,

    pub prefetch: PrefetchPlan,

    /// Seed for random offsets; every pass reuses it
    pub seed: u64,

    /// Share of the file requested by a random pass
    pub random_fraction: f64,
}

impl ExperimentConfig {
    pub fn prefetch_policy(&self) -> Option<PrefetchPolicy> {
        match self.prefetch {
            PrefetchPlan::None => None,
            PrefetchPlan::JustInTime { policy, .. } | PrefetchPlan::Online { policy, .. } => {
                Some(policy)
            }
        }
    }

    pub fn prefetch_lead(&self) -> Option<Duration> {
        match self.prefetch {
            PrefetchPlan::JustInTime { lead, .. } => Some(lead),
            _ => None,
        }
    }

    pub fn prefetch_stride(&self) -> Option<u64> {
        match self.prefetch {
            PrefetchPlan::Online { stride, .. } => Some(stride),
            _ => None,
        }
    }

    /// Whether any part of the experiment only makes sense with a remote tier.
    pub fn requires_remote(&self) -> bool {
        self.precondition.requires_remote()
            || self.prefetch_policy().map_or(false, |p| p.requires_remote())
    }

    /// Check the structural constraints of the experiment.
    ///
    /// ## Returns
    /// - `Ok(())`: The experiment can run
    /// - `Err(HarnessError::InvalidConfig)`: A size or parameter is out of range
    pub fn validate(&self) -> Result<()> {
        if self.file_size == 0 {
            return Err(HarnessError::InvalidConfig("file size must be non-zero".into()));
        }
        if self.io_size == 0 {
            return Err(HarnessError::InvalidConfig("I/O size must be non-zero".into()));
        }
        if self.io_size > self.file_size {
            return Err(HarnessError::InvalidConfig(format!(
                "I/O size {} exceeds file size {}",
                self.io_size, self.file_size
            )));
        }
        if usize::try_from(self.io_size).is_err() {
            return Err(HarnessError::InvalidConfig(format!(
                "I/O size {} does not fit in memory",
                self.io_size
            )));
        }
        if !(self.random_fraction > 0.0 && self.random_fraction <= 1.0) {
            return Err(HarnessError::InvalidConfig(format!(
                "random pass fraction {} must be in (0, 1]",
                self.random_fraction
            )));
        }
        if self.open_mode == OpenMode::Direct && self.io_size % BUFFER_ALIGNMENT as u64 != 0 {
            return Err(HarnessError::InvalidConfig(format!(
                "direct I/O needs reads aligned to {} bytes, got {}",
                BUFFER_ALIGNMENT, self.io_size
            )));
        }
        if let PrefetchPlan::Online { stride, .. } = self.prefetch {
            if stride == 0 {
                return Err(HarnessError::InvalidConfig(
                    "online prefetch stride must be non-zero".into(),
                ));
            }
        }
        Ok(())
    }

    fn open_target(&self) -> Result<File> {
        let mut options = OpenOptions::new();
        options.read(true);
        match self.open_mode {
            OpenMode::Buffered => options
                .open(&self.target)
                .map_err(|e| HarnessError::configuration(&self.target, e)),
            OpenMode::Direct => {
                options.custom_flags(libc::O_DIRECT);
                options.open(&self.target).map_err(|source| HarnessError::DirectIo {
                    path: self.target.clone(),
                    source,
                })
            }
        }
    }

    fn timed_loop(&self) -> TimedLoop {
        TimedLoop {
            io_size: self.io_size as usize,
            interarrival_ns: self.interarrival_ns,
            online: match self.prefetch {
                PrefetchPlan::Online { policy, stride } => Some(OnlinePrefetch { policy, stride }),
                _ => None,
            },
        }
    }

    /// Offsets of one timed pass. Direct I/O needs block-aligned offsets, so
    /// random draws are rounded down to the buffer alignment.
    fn offsets(&self) -> impl Iterator<Item = u64> {
        let align = match self.open_mode {
            OpenMode::Buffered => 1,
            OpenMode::Direct => BUFFER_ALIGNMENT as u64,
        };
        OffsetSequence::new(
            self.file_size,
            self.io_size,
            self.pattern,
            self.seed,
            self.random_fraction,
        )
        .map(move |offset| offset - offset % align)
    }
}

/// A helper struct to provide a consistent, single source of truth for
/// displaying the configuration of one experiment.
pub struct ExperimentDisplay<'a> {
    pub label: &'a str,
    pub config: &'a ExperimentConfig,
}

impl<'a> std::fmt::Display for ExperimentDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = self.config;
        writeln!(
            f,
            "-----------------------------------------------------------------"
        )?;
        writeln!(f, "Starting Experiment: {}", self.label)?;
        writeln!(f, "  File Size:          {}", format_bytes(config.file_size))?;
        writeln!(f, "  I/O Size:           {}", format_bytes(config.io_size))?;
        writeln!(f, "  Pattern:            {}", config.pattern)?;
        if config.interarrival_ns == 0 {
            writeln!(f, "  Inter-arrival:      Unpaced")?;
        } else {
            writeln!(
                f,
                "  Inter-arrival:      {}",
                format_duration(Duration::from_nanos(config.interarrival_ns))
            )?;
        }
        writeln!(f, "  Precondition:       {:?}", config.precondition)?;
        if config.open_mode == OpenMode::Direct {
            writeln!(f, "  Open Mode:          O_DIRECT")?;
        }
        if let Some(advice) = config.access_advice {
            writeln!(f, "  Access Advice:      {:?}", advice)?;
        }
        match config.prefetch {
            PrefetchPlan::None => {}
            PrefetchPlan::JustInTime { policy, lead } => {
                writeln!(f, "  Prefetch:           {:?}, whole file", policy)?;
                writeln!(f, "  Lead Time:          {}", format_duration(lead))?;
            }
            PrefetchPlan::Online { policy, stride } => {
                writeln!(f, "  Prefetch:           {:?}, online", policy)?;
                writeln!(f, "  Stride:             {}", format_bytes(stride))?;
            }
        }
        write!(
            f,
            "-----------------------------------------------------------------"
        )
    }
}

/// Drives experiments against a cache-control surface.
///
/// The runner itself holds no per-experiment state; the same runner measures
/// every planned experiment of a run.
pub struct ExperimentRunner {
    budget: Duration,
}

impl ExperimentRunner {
    /// Create a runner that spends roughly `budget` of wall-clock time per
    /// experiment.
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Measure one experiment.
    ///
    /// ## Returns
    /// - `Ok(ExperimentAggregate)`: Totals over at least one pass
    /// - `Err(HarnessError)`: The target or a cache control file could not be
    ///   used, or a read failed; the measurement is void
    pub fn run<C: CacheControl + ?Sized>(
        &self,
        config: &ExperimentConfig,
        cache: &mut C,
    ) -> Result<ExperimentAggregate> {
        config.validate()?;
        if config.requires_remote() && !cache.remote_available() {
            return Err(HarnessError::InvalidConfig(
                "experiment needs a remote cache tier, but only the local tier is available"
                    .into(),
            ));
        }

        let file = config.open_target()?;
        let mut buffer = ReadBuffer::new(config.io_size as usize)?;

        // Forced reads may still target `file`; settle them on every exit path
        // before the descriptor is closed.
        let measured = self.measure(config, &file, &mut buffer, cache);
        cache.quiesce();
        let aggregate = measured?;

        info!(
            "Completed {} pass(es): {} in {}",
            aggregate.passes,
            format_bytes(aggregate.total_bytes),
            format_duration(Duration::from_micros(aggregate.total_us))
        );
        Ok(aggregate)
    }

    /// Repeat passes until the budget is spent.
    fn measure<C: CacheControl + ?Sized>(
        &self,
        config: &ExperimentConfig,
        file: &File,
        buffer: &mut ReadBuffer,
        cache: &mut C,
    ) -> Result<ExperimentAggregate> {
        let timed = config.timed_loop();
        let budget_us = self.budget.as_micros().min(u64::MAX as u128) as u64;

        let mut aggregate = ExperimentAggregate::new();
        let t0 = timestamp_us();
        loop {
            cache.quiesce();
            self.establish(config, file, buffer, cache)?;

            if let Some(advice) = config.access_advice {
                cache.advise_access(file, 0, config.file_size, advice);
            }
            if let PrefetchPlan::JustInTime { policy, lead } = config.prefetch {
                policy.issue(cache, file, 0, config.file_size);
                if !lead.is_zero() {
                    std::thread::sleep(lead);
                }
            }

            let pass = timed.run(file, &config.target, buffer, config.offsets(), cache)?;
            debug!(
                "Pass {}: {} reads, {} bytes in {} us",
                aggregate.passes + 1,
                pass.reads,
                pass.bytes,
                pass.billable_us
            );
            aggregate.fold(pass);

            if elapsed_us(t0) >= budget_us {
                break;
            }
        }
        Ok(aggregate)
    }

    /// Establish the precondition. Nothing here is billed.
    fn establish<C: CacheControl + ?Sized>(
        &self,
        config: &ExperimentConfig,
        file: &File,
        buffer: &mut ReadBuffer,
        cache: &mut C,
    ) -> Result<()> {
        let precondition = config.precondition;

        cache.evict_server_range(file, 0, config.file_size);
        cache.drop_client_cache(file)?;

        if precondition.needs_warming_read() {
            let warming = TimedLoop {
                io_size: config.io_size as usize,
                interarrival_ns: 0,
                online: None,
            };
            let sequential = OffsetSequence::new(
                config.file_size,
                config.io_size,
                AccessPattern::Sequential,
                config.seed,
                config.random_fraction,
            );
            warming.run(file, &config.target, buffer, sequential, cache)?;
        }

        match precondition {
            CachePrecondition::Cold | CachePrecondition::FullyWarm => {}
            CachePrecondition::WarmClient => {
                cache.evict_server_range(file, 0, config.file_size);
            }
            CachePrecondition::WarmServer {
                client_eviction: ClientEviction::DropCaches,
            } => {
                cache.drop_client_cache(file)?;
            }
            CachePrecondition::WarmServer {
                client_eviction: ClientEviction::RangeAdvice,
            } => {
                cache.evict_client_range(file, 0, config.file_size);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheTier;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Op {
        DropClient,
        EvictClient(u64, u64),
        PrefetchClient(u64, u64),
        EvictServer(u64, u64),
        PrefetchServer(u64, u64),
        Force(u64, u64),
        Advise(AccessAdvice),
        Quiesce,
    }

    struct Recorder {
        tier: CacheTier,
        ops: Vec<Op>,
        fail_drop: bool,
    }

    impl Recorder {
        fn new(tier: CacheTier) -> Self {
            Self {
                tier,
                ops: Vec::new(),
                fail_drop: false,
            }
        }

        fn count(&self, op: &Op) -> usize {
            self.ops.iter().filter(|o| *o == op).count()
        }
    }

    impl CacheControl for Recorder {
        fn tier(&self) -> CacheTier {
            self.tier
        }
        fn drop_client_cache(&mut self, _file: &File) -> Result<()> {
            self.ops.push(Op::DropClient);
            if self.fail_drop {
                return Err(HarnessError::configuration(
                    "/proc/sys/vm/drop_caches",
                    std::io::Error::from_raw_os_error(libc::EACCES),
                ));
            }
            Ok(())
        }
        fn evict_client_range(&mut self, _file: &File, offset: u64, length: u64) {
            self.ops.push(Op::EvictClient(offset, length));
        }
        fn prefetch_client_range(&mut self, _file: &File, offset: u64, length: u64) {
            self.ops.push(Op::PrefetchClient(offset, length));
        }
        fn evict_server_range(&mut self, _file: &File, offset: u64, length: u64) {
            if self.remote_available() {
                self.ops.push(Op::EvictServer(offset, length));
            }
        }
        fn prefetch_server_range(&mut self, _file: &File, offset: u64, length: u64) {
            if self.remote_available() {
                self.ops.push(Op::PrefetchServer(offset, length));
            }
        }
        fn force_prefetch(&mut self, _file: &File, offset: u64, length: u64) {
            self.ops.push(Op::Force(offset, length));
        }
        fn advise_access(&mut self, _file: &File, _o: u64, _l: u64, advice: AccessAdvice) {
            self.ops.push(Op::Advise(advice));
        }
        fn quiesce(&mut self) {
            self.ops.push(Op::Quiesce);
        }
    }

    fn target(len: usize) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&vec![0x5Au8; len]).unwrap();
        file.flush().unwrap();
        file
    }

    fn config(target: &NamedTempFile, file_size: u64, io_size: u64) -> ExperimentConfig {
        ExperimentConfig {
            target: target.path().to_path_buf(),
            file_size,
            io_size,
            interarrival_ns: 0,
            pattern: AccessPattern::Sequential,
            open_mode: OpenMode::Buffered,
            access_advice: None,
            precondition: CachePrecondition::Cold,
            prefetch: PrefetchPlan::None,
            seed: crate::defaults::RANDOM_SEED,
            random_fraction: 0.1,
        }
    }

    #[test]
    fn test_zero_budget_runs_exactly_one_pass() {
        let file = target(64 * 1024);
        let runner = ExperimentRunner::new(Duration::ZERO);
        let mut cache = Recorder::new(CacheTier::LocalOnly);

        let aggregate = runner
            .run(&config(&file, 64 * 1024, 4096), &mut cache)
            .unwrap();

        assert_eq!(aggregate.passes, 1);
        assert_eq!(aggregate.total_bytes, 64 * 1024);
        assert_eq!(cache.count(&Op::DropClient), 1);
    }

    #[test]
    fn test_budget_bounds_pass_count() {
        let file = target(16 * 1024);
        let runner = ExperimentRunner::new(Duration::from_millis(50));
        let mut cache = Recorder::new(CacheTier::LocalOnly);
        let mut cfg = config(&file, 16 * 1024, 4096);
        cfg.interarrival_ns = 1_000_000;

        let started = timestamp_us();
        let aggregate = runner.run(&cfg, &mut cache).unwrap();
        let wall_us = elapsed_us(started);

        assert!(aggregate.passes >= 1);
        assert!(wall_us >= 50_000);
        assert_eq!(aggregate.total_bytes, aggregate.passes * 16 * 1024);
        // Four 1 ms sleeps per pass never reach the billable total.
        assert!(aggregate.total_us < wall_us);
    }

    #[test]
    fn test_quiesce_surrounds_every_pass() {
        let file = target(8192);
        let runner = ExperimentRunner::new(Duration::ZERO);
        let mut cache = Recorder::new(CacheTier::LocalOnly);
        runner.run(&config(&file, 8192, 4096), &mut cache).unwrap();

        assert_eq!(cache.ops.first(), Some(&Op::Quiesce));
        assert_eq!(cache.ops.last(), Some(&Op::Quiesce));
    }

    #[test]
    fn test_failed_pass_still_settles_forced_reads() {
        let file = target(8192);
        let runner = ExperimentRunner::new(Duration::ZERO);
        let mut cache = Recorder::new(CacheTier::LocalOnly);
        cache.fail_drop = true;

        let err = runner.run(&config(&file, 8192, 4096), &mut cache).unwrap_err();

        assert!(matches!(err, HarnessError::Configuration { .. }));
        assert_eq!(cache.ops, vec![Op::Quiesce, Op::DropClient, Op::Quiesce]);
    }

    #[test]
    fn test_cold_precondition_evicts_both_tiers() {
        let file = target(8192);
        let runner = ExperimentRunner::new(Duration::ZERO);
        let mut cache = Recorder::new(CacheTier::LocalPlusRemote);
        runner.run(&config(&file, 8192, 4096), &mut cache).unwrap();

        assert_eq!(
            cache.ops,
            vec![
                Op::Quiesce,
                Op::EvictServer(0, 8192),
                Op::DropClient,
                Op::Quiesce
            ]
        );
    }

    #[test]
    fn test_warm_client_evicts_server_after_warming() {
        let file = target(8192);
        let runner = ExperimentRunner::new(Duration::ZERO);
        let mut cache = Recorder::new(CacheTier::LocalPlusRemote);
        let mut cfg = config(&file, 8192, 4096);
        cfg.precondition = CachePrecondition::WarmClient;
        runner.run(&cfg, &mut cache).unwrap();

        assert_eq!(cache.count(&Op::EvictServer(0, 8192)), 2);
        assert_eq!(cache.count(&Op::DropClient), 1);
    }

    #[test]
    fn test_warm_client_requires_remote_tier() {
        let file = target(8192);
        let runner = ExperimentRunner::new(Duration::ZERO);
        let mut cache = Recorder::new(CacheTier::LocalOnly);
        let mut cfg = config(&file, 8192, 4096);
        cfg.precondition = CachePrecondition::WarmClient;

        let err = runner.run(&cfg, &mut cache).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfig(_)));
        assert!(cache.ops.is_empty());
    }

    #[test]
    fn test_warm_server_evictions() {
        let file = target(8192);
        let runner = ExperimentRunner::new(Duration::ZERO);

        let mut cache = Recorder::new(CacheTier::LocalOnly);
        let mut cfg = config(&file, 8192, 4096);
        cfg.precondition = CachePrecondition::WarmServer {
            client_eviction: ClientEviction::DropCaches,
        };
        runner.run(&cfg, &mut cache).unwrap();
        assert_eq!(cache.count(&Op::DropClient), 2);

        let mut cache = Recorder::new(CacheTier::LocalOnly);
        cfg.precondition = CachePrecondition::WarmServer {
            client_eviction: ClientEviction::RangeAdvice,
        };
        runner.run(&cfg, &mut cache).unwrap();
        assert_eq!(cache.count(&Op::DropClient), 1);
        assert_eq!(cache.count(&Op::EvictClient(0, 8192)), 1);
    }

    #[test]
    fn test_access_advice_applied_each_pass() {
        let file = target(8192);
        let runner = ExperimentRunner::new(Duration::ZERO);
        let mut cache = Recorder::new(CacheTier::LocalOnly);
        let mut cfg = config(&file, 8192, 4096);
        cfg.access_advice = Some(AccessAdvice::Random);
        runner.run(&cfg, &mut cache).unwrap();
        assert_eq!(cache.count(&Op::Advise(AccessAdvice::Random)), 1);
    }

    #[test]
    fn test_just_in_time_prefetch_and_lead_are_unbilled() {
        let file = target(8192);
        let runner = ExperimentRunner::new(Duration::ZERO);
        let mut cache = Recorder::new(CacheTier::LocalOnly);
        let mut cfg = config(&file, 8192, 4096);
        cfg.prefetch = PrefetchPlan::JustInTime {
            policy: PrefetchPolicy::ForcedAsync,
            lead: Duration::from_millis(100),
        };

        let aggregate = runner.run(&cfg, &mut cache).unwrap();
        assert_eq!(cache.count(&Op::Force(0, 8192)), 1);
        assert!(aggregate.total_us < 100_000);
    }

    #[test]
    fn test_online_prefetch_reaches_cache() {
        let file = target(32 * 1024);
        let runner = ExperimentRunner::new(Duration::ZERO);
        let mut cache = Recorder::new(CacheTier::LocalOnly);
        let mut cfg = config(&file, 32 * 1024, 4096);
        cfg.prefetch = PrefetchPlan::Online {
            policy: PrefetchPolicy::ClientAdvise,
            stride: 16 * 1024,
        };
        runner.run(&cfg, &mut cache).unwrap();
        assert_eq!(cache.count(&Op::PrefetchClient(0, 16 * 1024)), 1);
        assert_eq!(cache.count(&Op::PrefetchClient(16 * 1024, 16 * 1024)), 1);
    }

    #[test]
    fn test_random_pass_reads_a_tenth() {
        let file = target(1 << 20);
        let runner = ExperimentRunner::new(Duration::ZERO);
        let mut cache = Recorder::new(CacheTier::LocalOnly);
        let mut cfg = config(&file, 1 << 20, 4096);
        cfg.pattern = AccessPattern::Random;
        let aggregate = runner.run(&cfg, &mut cache).unwrap();

        // ceil(0.1 * 1 MiB / 4 KiB) reads; offsets near the end may come back short.
        assert!(aggregate.total_bytes <= 26 * 4096);
        assert!(aggregate.total_bytes > 20 * 4096);
    }

    #[test]
    fn test_validate_rejects_oversized_io() {
        let file = target(4096);
        let cfg = config(&file, 4096, 8192);
        assert!(matches!(cfg.validate(), Err(HarnessError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_unaligned_direct_io() {
        let file = target(8192);
        let mut cfg = config(&file, 8192, 1000);
        cfg.open_mode = OpenMode::Direct;
        assert!(cfg.validate().is_err());
        cfg.io_size = 4096;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_direct_random_offsets_are_aligned() {
        let file = target(1 << 20);
        let mut cfg = config(&file, 1 << 20, 4096);
        cfg.pattern = AccessPattern::Random;
        let buffered: Vec<u64> = cfg.offsets().collect();
        assert!(buffered.iter().any(|o| o % 4096 != 0));

        cfg.open_mode = OpenMode::Direct;
        let direct: Vec<u64> = cfg.offsets().collect();
        assert_eq!(direct.len(), buffered.len());
        assert!(direct.iter().all(|o| o % 4096 == 0));
    }

    #[test]
    fn test_missing_target_is_configuration_error() {
        let file = target(4096);
        let mut cfg = config(&file, 4096, 4096);
        cfg.target = file.path().with_extension("missing");
        let err = ExperimentRunner::new(Duration::ZERO)
            .run(&cfg, &mut Recorder::new(CacheTier::LocalOnly))
            .unwrap_err();
        assert!(matches!(err, HarnessError::Configuration { .. }));
    }

    #[test]
    fn test_prefetch_accessors() {
        let file = target(4096);
        let mut cfg = config(&file, 4096, 4096);
        assert_eq!(cfg.prefetch_policy(), None);

        cfg.prefetch = PrefetchPlan::Online {
            policy: PrefetchPolicy::ServerAdvise,
            stride: 1 << 20,
        };
        assert_eq!(cfg.prefetch_policy(), Some(PrefetchPolicy::ServerAdvise));
        assert_eq!(cfg.prefetch_stride(), Some(1 << 20));
        assert_eq!(cfg.prefetch_lead(), None);
        assert!(cfg.requires_remote());
    }

    #[test]
    fn test_display_lists_parameters() {
        let file = target(4096);
        let mut cfg = config(&file, 4096, 4096);
        cfg.interarrival_ns = 10_000;
        let text = ExperimentDisplay {
            label: "Not cached",
            config: &cfg,
        }
        .to_string();
        assert!(text.contains("Starting Experiment: Not cached"));
        assert!(text.contains("Pattern:            sequential"));
        assert!(!text.contains("Unpaced"));
    }
}
