//! # Utility Functions and Helper Module
//!
//! Helpers shared by the runner, the CLI and the results layer: formatters for
//! human-readable log output, validators for user-supplied parameters, and a
//! few system-information helpers.
//!
//! ## Key Functionality Categories
//!
//! - **Formatting**: Durations, byte counts and throughput for log lines
//! - **Validation**: Parameter checks with clear error messages
//! - **System Information**: CPU count and thread pinning
//!
//! ## Usage Examples
//!
//! ```rust
//! use prefetch_bench::utils::*;
//! use std::time::Duration;
//!
//! # fn main() -> anyhow::Result<()> {
//! assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
//! assert_eq!(format_throughput(1.5), "1.500 GiB/s");
//!
//! validate_io_size(4096)?;
//! # Ok(())
//! # }
//! ```

use anyhow::{bail, Result};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Generate a unique identifier for a run
///
/// ## Returns
/// String representation of a UUID v4 (e.g., "550e8400-e29b-41d4-a716-446655440000")
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Format a duration in a human-readable way
///
/// Converts a `Duration` to the most appropriate unit, from nanoseconds up
/// to a compound hours/minutes/seconds form.
///
/// ## Precision
///
/// - Sub-minute units use 2 decimal places
/// - Compound units (hours/minutes/seconds) show whole numbers
///
/// ## Examples
///
/// ```rust
/// # use prefetch_bench::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_nanos(750)), "750ns");
/// assert_eq!(format_duration(Duration::from_nanos(1250)), "1.25μs");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ns = duration.as_nanos();

    if total_ns < 1_000 {
        format!("{}ns", total_ns)
    } else if total_ns < 1_000_000 {
        format!("{:.2}μs", total_ns as f64 / 1_000.0)
    } else if total_ns < 1_000_000_000 {
        format!("{:.2}ms", total_ns as f64 / 1_000_000.0)
    } else if total_ns < 60_000_000_000 {
        format!("{:.2}s", total_ns as f64 / 1_000_000_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

/// Format bytes in a human-readable way
///
/// Uses binary (1024-based) scaling, matching how file and I/O sizes are
/// specified on the command line.
///
/// ## Examples
///
/// ```rust
/// # use prefetch_bench::utils::format_bytes;
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.50 KiB");
/// assert_eq!(format_bytes(256 * 1024 * 1024), "256.00 MiB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes < 1024.0 {
        format!("{:.0} B", bytes)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.2} KiB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MiB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GiB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a throughput figure already expressed in GiB/s.
///
/// Three decimals, the same precision the CSV output carries.
pub fn format_throughput(gib_per_sec: f64) -> String {
    format!("{:.3} GiB/s", gib_per_sec)
}

/// Validate an I/O request size
///
/// ## Validation Rules
/// - **Minimum**: 1 byte
/// - **Maximum**: 4 GiB; a single read buffer larger than that is almost
///   certainly a typo
pub fn validate_io_size(io_size: u64) -> Result<()> {
    if io_size == 0 {
        bail!("I/O size must be greater than 0");
    }
    if io_size > 4 * 1024 * 1024 * 1024 {
        bail!("I/O size cannot exceed 4 GiB");
    }
    Ok(())
}

/// Validate a file size against the target that will back it.
pub fn validate_file_size(file_size: u64, target_len: u64) -> Result<()> {
    if file_size == 0 {
        bail!("File size must be greater than 0");
    }
    if file_size > target_len {
        bail!(
            "File size {} exceeds the target file length {}",
            format_bytes(file_size),
            format_bytes(target_len)
        );
    }
    Ok(())
}

/// Validate the share of the file a random pass requests.
pub fn validate_random_fraction(fraction: f64) -> Result<()> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        bail!("Random pass fraction must be in (0, 1], got {}", fraction);
    }
    Ok(())
}

/// Length of the target file in bytes.
pub fn target_len(path: &Path) -> std::io::Result<u64> {
    Ok(std::fs::metadata(path)?.len())
}

/// Get the number of logical CPU cores available to the process
pub fn get_cpu_cores() -> usize {
    num_cpus::get()
}

/// Pin the calling thread to one CPU core.
///
/// ## Returns
/// - `Ok(())`: The thread now runs on `core` only
/// - `Err`: The core does not exist or the kernel refused the affinity mask
pub fn pin_current_thread(core: usize) -> Result<()> {
    let Some(core_ids) = core_affinity::get_core_ids() else {
        bail!("Unable to enumerate CPU cores");
    };
    let Some(core_id) = core_ids.into_iter().find(|c| c.id == core) else {
        bail!(
            "CPU core {} is not available (this machine has {} cores)",
            core,
            get_cpu_cores()
        );
    };
    if !core_affinity::set_for_current(core_id) {
        bail!("Failed to pin the measurement thread to core {}", core);
    }
    Ok(())
}
