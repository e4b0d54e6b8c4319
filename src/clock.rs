//! Monotonic microsecond timestamps and non-billable suspensions.

use nix::time::{clock_gettime, ClockId};
use std::time::Duration;

/// Current monotonic time in microseconds.
///
/// Backed by `CLOCK_MONOTONIC`, so wall-clock adjustments during a long run do
/// not distort billable time. Falls back to zero if the clock is unavailable,
/// which only happens on kernels that could not run this harness anyway.
pub fn timestamp_us() -> u64 {
    match clock_gettime(ClockId::CLOCK_MONOTONIC) {
        Ok(ts) => ts.tv_sec() as u64 * 1_000_000 + ts.tv_nsec() as u64 / 1_000,
        Err(_) => 0,
    }
}

/// Microseconds elapsed since `since`, saturating at zero.
pub fn elapsed_us(since: u64) -> u64 {
    timestamp_us().saturating_sub(since)
}

/// Sleep for `nanos` nanoseconds. Callers never bill this interval.
pub fn pause_ns(nanos: u64) {
    if nanos > 0 {
        std::thread::sleep(Duration::from_nanos(nanos));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_monotonic() {
        let a = timestamp_us();
        let b = timestamp_us();
        assert!(b >= a);
    }

    #[test]
    fn test_pause_advances_clock() {
        let start = timestamp_us();
        pause_ns(2_000_000);
        assert!(elapsed_us(start) >= 2_000);
    }

    #[test]
    fn test_zero_pause_returns_immediately() {
        let start = timestamp_us();
        pause_ns(0);
        assert!(elapsed_us(start) < 1_000_000);
    }
}
