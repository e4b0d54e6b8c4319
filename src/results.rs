use crate::benchmark::ExperimentConfig;
use crate::error::HarnessError;
use crate::metrics::ExperimentAggregate;
use crate::strategy::Strategy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prefetch parameter swept by the JIT and online strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrefetchParam {
    /// Lead time between the whole-file prefetch and the timed pass, in µs
    Delay(u64),
    /// Online prefetch stride in bytes
    Size(u64),
}

impl PrefetchParam {
    pub fn value(self) -> u64 {
        match self {
            PrefetchParam::Delay(v) | PrefetchParam::Size(v) => v,
        }
    }
}

/// One measured configuration, ready to be written out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub target: String,
    pub category: String,
    pub label: String,
    pub description: Option<String>,
    pub file_size: u64,
    /// Delay between reads in nanoseconds. Written to the
    /// `interarrival_time_us` column unchanged, which is what existing result
    /// sets contain.
    pub interarrival: u64,
    pub io_size: u64,
    pub prefetch: Option<PrefetchParam>,
    pub throughput_gib_per_sec: f64,
    pub passes: u64,
    pub total_bytes: u64,
    pub total_us: u64,
}

impl MeasurementRecord {
    pub fn new(
        strategy: &Strategy,
        config: &ExperimentConfig,
        prefetch: Option<PrefetchParam>,
        aggregate: &ExperimentAggregate,
        describe: bool,
    ) -> Self {
        Self {
            target: config.target.display().to_string(),
            category: strategy.suite.category().to_string(),
            label: strategy.label.to_string(),
            description: describe.then(|| strategy.describe(prefetch.map(PrefetchParam::value))),
            file_size: config.file_size,
            interarrival: config.interarrival_ns,
            io_size: config.io_size,
            prefetch,
            throughput_gib_per_sec: aggregate.throughput_gib_per_sec(),
            passes: aggregate.passes,
            total_bytes: aggregate.total_bytes,
            total_us: aggregate.total_us,
        }
    }

    /// Render the record as one output line, without the trailing newline.
    pub fn to_csv_line(&self) -> String {
        let mut line = format!(
            "target='{}', category='{}', label='{}', ",
            self.target, self.category, self.label
        );
        if let Some(desc) = &self.description {
            line.push_str(&format!("desc='{}', ", desc));
        }
        line.push_str(&format!(
            "file_size={}, interarrival_time_us={}, io_size={}, ",
            self.file_size, self.interarrival, self.io_size
        ));
        match self.prefetch {
            Some(PrefetchParam::Delay(us)) => line.push_str(&format!("prefetch_delay={}, ", us)),
            Some(PrefetchParam::Size(bytes)) => {
                line.push_str(&format!("prefetch_size={}, ", bytes))
            }
            None => {}
        }
        line.push_str(&format!(
            "throughput_gb_per_second={:.3}",
            self.throughput_gib_per_sec
        ));
        line
    }
}

/// System information for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
    pub rust_version: String,
    pub benchmark_version: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: num_cpus::get(),
            rust_version: env!("CARGO_PKG_RUST_VERSION").to_string(),
            benchmark_version: crate::VERSION.to_string(),
        }
    }
}

/// Run metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct RunMetadata {
    pub version: String,
    pub run_id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub total_experiments: usize,
    pub system_info: SystemInfo,
}

/// JSON summary written at the end of a run
#[derive(Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub metadata: RunMetadata,
    pub records: Vec<MeasurementRecord>,
}

/// Results manager for the line output and the optional JSON summary
///
/// Each record is appended to the output file and flushed immediately, so a
/// run that is interrupted after hours still leaves every completed
/// measurement on disk.
pub struct ResultsManager {
    output_file: PathBuf,
    output: File,
    summary_file: Option<PathBuf>,
    records: Vec<MeasurementRecord>,
    run_id: String,
    started_at: chrono::DateTime<chrono::Utc>,
}

impl ResultsManager {
    /// Create the output file, truncating any previous content
    pub fn new(output_file: &Path) -> Result<Self> {
        let output = File::create(output_file)
            .map_err(|e| HarnessError::configuration(output_file, e))?;
        debug!("Writing measurements to {:?}", output_file);
        Ok(Self {
            output_file: output_file.to_path_buf(),
            output,
            summary_file: None,
            records: Vec::new(),
            run_id: crate::utils::generate_run_id(),
            started_at: chrono::Utc::now(),
        })
    }

    /// Also write a JSON summary of the run when it finishes
    pub fn enable_summary<P: AsRef<Path>>(&mut self, summary_file: P) {
        self.summary_file = Some(summary_file.as_ref().to_path_buf());
        debug!("JSON summary enabled: {:?}", self.summary_file);
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn records(&self) -> &[MeasurementRecord] {
        &self.records
    }

    /// Append one record and flush it to disk
    pub fn add_record(&mut self, record: MeasurementRecord) -> Result<()> {
        writeln!(self.output, "{}", record.to_csv_line())
            .and_then(|_| self.output.flush())
            .with_context(|| format!("Error writing file \"{}\"", self.output_file.display()))?;
        self.records.push(record);
        Ok(())
    }

    /// Finalize results and write the summary if enabled
    pub fn finalize(&mut self) -> Result<()> {
        info!("Finalizing benchmark results");
        self.output
            .flush()
            .with_context(|| format!("Error writing file \"{}\"", self.output_file.display()))?;

        if let Some(summary_file) = &self.summary_file {
            let summary = RunSummary {
                metadata: RunMetadata {
                    version: crate::VERSION.to_string(),
                    run_id: self.run_id.clone(),
                    started_at: self.started_at,
                    finished_at: chrono::Utc::now(),
                    total_experiments: self.records.len(),
                    system_info: SystemInfo::default(),
                },
                records: self.records.clone(),
            };
            let json = serde_json::to_string_pretty(&summary)?;
            std::fs::write(summary_file, json)
                .with_context(|| format!("Error writing file \"{}\"", summary_file.display()))?;
            info!("Summary written to: {:?}", summary_file);
        }

        info!(
            "{} measurement(s) written to: {:?}",
            self.records.len(),
            self.output_file
        );
        Ok(())
    }
}
