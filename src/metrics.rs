use serde::{Deserialize, Serialize};

const GIB: f64 = (1u64 << 30) as f64;

/// Outcome of one pass of the timed I/O loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PassResult {
    /// Bytes actually returned by the reads of this pass
    pub bytes: u64,
    /// Elapsed I/O time, excluding pacing sleeps
    pub billable_us: u64,
    /// Reads issued
    pub reads: u64,
}

/// Running totals across the passes of one experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExperimentAggregate {
    pub total_bytes: u64,
    pub total_us: u64,
    pub passes: u64,
}

impl ExperimentAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one pass into the totals.
    pub fn fold(&mut self, pass: PassResult) {
        self.total_bytes += pass.bytes;
        self.total_us += pass.billable_us;
        self.passes += 1;
    }

    /// Aggregate throughput in GiB/s.
    ///
    /// Billable time is floored at one microsecond so a pass faster than the
    /// clock resolution still yields a finite figure.
    pub fn throughput_gib_per_sec(&self) -> f64 {
        let seconds = self.total_us.max(1) as f64 * 1e-6;
        self.total_bytes as f64 / seconds / GIB
    }
}
