//! Expansion of the run configuration into the ordered list of experiments.
//!
//! Order follows the historical campaign: pattern, then inter-arrival time,
//! then strategy, then file size and I/O size, then the swept prefetch
//! parameter. Combinations that cannot run are left out here rather than
//! failing later:
//!
//! - I/O sizes larger than the file size
//! - strategies that need the remote tier when only the local tier is present
//! - JIT and online prefetching for non-sequential patterns
//! - direct I/O with sizes that are not block multiples
//! - online strides that are not larger than the I/O size

use crate::benchmark::{ExperimentConfig, OpenMode, PrefetchPlan};
use crate::cli::HarnessConfig;
use crate::io_loop::BUFFER_ALIGNMENT;
use crate::metrics::ExperimentAggregate;
use crate::pattern::AccessPattern;
use crate::results::{MeasurementRecord, PrefetchParam};
use crate::strategy::{PrefetchKind, Strategy, STRATEGIES};
use std::time::Duration;
use tracing::debug;

/// One experiment of the run, with the strategy it came from.
#[derive(Clone, Debug)]
pub struct PlannedExperiment {
    pub strategy: &'static Strategy,
    pub config: ExperimentConfig,
    pub parameter: Option<PrefetchParam>,
}

impl PlannedExperiment {
    pub fn record(&self, aggregate: &ExperimentAggregate, describe: bool) -> MeasurementRecord {
        MeasurementRecord::new(
            self.strategy,
            &self.config,
            self.parameter,
            aggregate,
            describe,
        )
    }
}

/// Build every experiment of the run, in execution order.
pub fn build_plan(config: &HarnessConfig) -> Vec<PlannedExperiment> {
    let mut plan = Vec::new();
    let remote = config.tier == crate::cache::CacheTier::LocalPlusRemote;

    for &pattern in &config.patterns {
        for &interarrival_ns in &config.interarrival_ns {
            for strategy in STRATEGIES {
                if !config.suites.contains(&strategy.suite) {
                    continue;
                }
                if strategy.requires_remote() && !remote {
                    debug!("Skipping '{}': no remote cache tier", strategy.label);
                    continue;
                }
                if strategy.suite.sequential_only() && pattern != AccessPattern::Sequential {
                    continue;
                }

                for &file_size in &config.file_sizes {
                    for &io_size in &config.io_sizes {
                        if io_size > file_size {
                            continue;
                        }
                        if strategy.open_mode == OpenMode::Direct
                            && io_size % BUFFER_ALIGNMENT as u64 != 0
                        {
                            debug!(
                                "Skipping '{}' at {} byte reads: not a block multiple",
                                strategy.label, io_size
                            );
                            continue;
                        }

                        let base = ExperimentConfig {
                            target: config.target.clone(),
                            file_size,
                            io_size,
                            interarrival_ns,
                            pattern,
                            open_mode: strategy.open_mode,
                            access_advice: strategy.access_advice,
                            precondition: strategy.precondition,
                            prefetch: PrefetchPlan::None,
                            seed: config.seed,
                            random_fraction: config.random_fraction,
                        };

                        match strategy.prefetch {
                            PrefetchKind::None => plan.push(PlannedExperiment {
                                strategy,
                                config: base,
                                parameter: None,
                            }),
                            PrefetchKind::JustInTime(policy) => {
                                for &delay_us in &config.prefetch_delays_us {
                                    plan.push(PlannedExperiment {
                                        strategy,
                                        config: ExperimentConfig {
                                            prefetch: PrefetchPlan::JustInTime {
                                                policy,
                                                lead: Duration::from_micros(delay_us),
                                            },
                                            ..base.clone()
                                        },
                                        parameter: Some(PrefetchParam::Delay(delay_us)),
                                    });
                                }
                            }
                            PrefetchKind::Online(policy) => {
                                for &stride in config.io_sizes.iter().filter(|&&s| s > io_size) {
                                    plan.push(PlannedExperiment {
                                        strategy,
                                        config: ExperimentConfig {
                                            prefetch: PrefetchPlan::Online { policy, stride },
                                            ..base.clone()
                                        },
                                        parameter: Some(PrefetchParam::Size(stride)),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    plan
}
