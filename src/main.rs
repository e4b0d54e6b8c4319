//! # Prefetch Benchmark - Main Entry Point
//!
//! Measures read throughput of a large file under controlled cache states and
//! prefetch strategies, and writes one line per measured configuration.
//!
//! ## Flow
//!
//! 1. **Parse arguments** and initialize logging
//! 2. **Validate the configuration** and the target file
//! 3. **Build the cache-control surface** for the configured tiers
//! 4. **Plan** the experiments in their historical order
//! 5. **Run** each experiment and append its record to the output file
//! 6. **Finalize** the output, and the JSON summary if requested
//!
//! ## Error Handling
//!
//! Any failure of the apparatus (a control file that cannot be written, a read
//! that fails) ends the run with a message on stdout and exit status 1. A
//! target that cannot be opened with `O_DIRECT` only skips the direct-I/O
//! experiments.

use anyhow::Result;
use clap::Parser;
use prefetch_bench::{
    benchmark::ExperimentDisplay,
    cache::{EvictionPressure, PageCacheControl, PressureSource},
    cli::{Args, HarnessConfig},
    logging::init_logging,
    plan::build_plan,
    utils::{format_bytes, format_throughput, pin_current_thread, target_len},
    ExperimentRunner, HarnessError, ResultsManager,
};
use tracing::{info, warn};

fn main() {
    let args = Args::parse();

    // The guard flushes the log file on drop and must outlive the run.
    let _guard = match init_logging(args.verbose, args.quiet, args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            println!("{:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&args) {
        match e.downcast_ref::<HarnessError>() {
            Some(harness) => println!("{}", harness),
            None => println!("{:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = HarnessConfig::from_args(args)?;
    info!("Starting Prefetch Benchmark");
    info!("Configuration:\n{}", config);

    if let Some(core) = config.cpu_affinity {
        pin_current_thread(core)?;
        info!("Measurement thread pinned to CPU core {}", core);
    }

    config.check_target()?;
    if let Some(EvictionPressure {
        source: PressureSource::Target { offset },
        volume,
        ..
    }) = &config.pressure
    {
        let spare = target_len(&config.target)?.saturating_sub(*offset);
        if spare < *volume {
            warn!(
                "Only {} of the target lies past the measured region; eviction pressure will read less than {}",
                format_bytes(spare),
                format_bytes(*volume)
            );
        }
    }

    let scratch = usize::try_from(config.max_file_size())?;
    let mut cache = PageCacheControl::new(
        config.tier,
        &config.drop_caches_path,
        config.pressure.clone(),
        scratch,
    );

    let mut results = ResultsManager::new(&config.output)?;
    if let Some(summary) = &config.summary_json {
        results.enable_summary(summary);
    }

    let plan = build_plan(&config);
    info!("Planned {} experiment(s)", plan.len());

    let runner = ExperimentRunner::new(config.duration);
    let mut skipped = 0usize;
    for (i, experiment) in plan.iter().enumerate() {
        info!(
            "[{}/{}]\n{}",
            i + 1,
            plan.len(),
            ExperimentDisplay {
                label: experiment.strategy.label,
                config: &experiment.config,
            }
        );

        let aggregate = match runner.run(&experiment.config, &mut cache) {
            Ok(aggregate) => aggregate,
            Err(e) if e.is_skippable() => {
                warn!("Skipping '{}': {}", experiment.strategy.label, e);
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let record = experiment.record(&aggregate, config.describe);
        info!(
            "Throughput: {}",
            format_throughput(record.throughput_gib_per_sec)
        );
        results.add_record(record)?;
    }

    results.finalize()?;

    if skipped > 0 {
        warn!("{} experiment(s) skipped", skipped);
    }
    info!(
        "Prefetch Benchmark completed: {} measurement(s) written to {}",
        results.records().len(),
        config.output.display()
    );
    Ok(())
}
