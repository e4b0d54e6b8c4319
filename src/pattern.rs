//! # Access Pattern Generator
//!
//! Produces the byte offsets one pass reads from. Sequential passes walk the
//! whole file in `io_size` steps. Random passes draw offsets from a generator
//! seeded with a fixed constant at construction; the runner builds a fresh
//! sequence for every pass, so every pass of every strategy at the same
//! `(file_size, io_size)` reads the exact same offsets and only the cache state
//! differs between them.
//!
//! Random passes stop once the requested volume reaches a fraction of the file
//! (10% by default). Random reads are not amortized by readahead, so reading the
//! full file would blow the per-experiment duration budget.

use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Largest value a single random draw can produce.
///
/// Offsets are derived as `draw / (MAX_DRAW / file_size + 1)`, which keeps every
/// offset strictly below `file_size` at the cost of a small bias toward lower
/// offsets.
pub const MAX_DRAW: u64 = (1 << 63) - 1;

/// Order in which a pass visits the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum AccessPattern {
    /// Offsets 0, io_size, 2*io_size, ... up to the file size
    #[clap(name = "sequential")]
    Sequential,

    /// Seeded pseudorandom offsets over a fraction of the file
    #[clap(name = "random")]
    Random,
}

impl std::fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessPattern::Sequential => write!(f, "sequential"),
            AccessPattern::Random => write!(f, "random"),
        }
    }
}

enum Walk {
    Sequential { next: u64 },
    Random { rng: StdRng, requested: u64, limit: f64 },
}

/// Lazy, finite sequence of read offsets for one pass.
pub struct OffsetSequence {
    file_size: u64,
    io_size: u64,
    walk: Walk,
}

impl OffsetSequence {
    /// Build the offset sequence for one pass.
    ///
    /// `random_fraction` bounds the requested volume of random passes and is
    /// ignored by sequential ones. Both sizes must be non-zero.
    pub fn new(
        file_size: u64,
        io_size: u64,
        pattern: AccessPattern,
        seed: u64,
        random_fraction: f64,
    ) -> Self {
        let walk = match pattern {
            AccessPattern::Sequential => Walk::Sequential { next: 0 },
            AccessPattern::Random => Walk::Random {
                rng: StdRng::seed_from_u64(seed),
                requested: 0,
                limit: file_size as f64 * random_fraction,
            },
        };
        Self {
            file_size,
            io_size,
            walk,
        }
    }

    /// Number of reads a full pass will issue.
    pub fn planned_reads(&self) -> u64 {
        if self.io_size == 0 || self.file_size == 0 {
            return 0;
        }
        match &self.walk {
            Walk::Sequential { .. } => (self.file_size + self.io_size - 1) / self.io_size,
            Walk::Random { limit, .. } => {
                let reads = (limit / self.io_size as f64).ceil() as u64;
                reads.max(1)
            }
        }
    }
}

impl Iterator for OffsetSequence {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.io_size == 0 || self.file_size == 0 {
            return None;
        }
        match &mut self.walk {
            Walk::Sequential { next } => {
                if *next >= self.file_size {
                    return None;
                }
                let offset = *next;
                *next += self.io_size;
                Some(offset)
            }
            Walk::Random {
                rng,
                requested,
                limit,
            } => {
                // Always issue at least one read, even for tiny fractions.
                if *requested > 0 && *requested as f64 >= *limit {
                    return None;
                }
                *requested += self.io_size;
                let draw = rng.gen::<u64>() >> 1;
                Some(draw / (MAX_DRAW / self.file_size + 1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: u64 = crate::defaults::RANDOM_SEED;

    #[test]
    fn test_sequential_covers_file_in_io_size_steps() {
        let file_size = 1024 * 1024;
        let io_size = 4096;
        let offsets: Vec<u64> =
            OffsetSequence::new(file_size, io_size, AccessPattern::Sequential, SEED, 0.1)
                .collect();

        assert_eq!(offsets.len() as u64, file_size / io_size);
        assert_eq!(offsets[0], 0);
        assert!(offsets.windows(2).all(|w| w[1] - w[0] == io_size));
        assert!(*offsets.last().unwrap() < file_size);
    }

    #[test]
    fn test_sequential_rounds_up_partial_tail() {
        let offsets: Vec<u64> =
            OffsetSequence::new(10_000, 4096, AccessPattern::Sequential, SEED, 0.1).collect();
        assert_eq!(offsets, vec![0, 4096, 8192]);
    }

    #[test]
    fn test_sequential_sweep_matches_ceiling_count() {
        for file_size in [1u64, 7, 4096, 4097, 65_536, 1_000_003] {
            for io_size in [1u64, 3, 512, 4096, 65_536] {
                if io_size > file_size {
                    continue;
                }
                let seq =
                    OffsetSequence::new(file_size, io_size, AccessPattern::Sequential, SEED, 0.1);
                let planned = seq.planned_reads();
                let offsets: Vec<u64> = seq.collect();
                let expected = (file_size + io_size - 1) / io_size;
                assert_eq!(offsets.len() as u64, expected);
                assert_eq!(planned, expected);
                assert!(*offsets.last().unwrap() < file_size);
            }
        }
    }

    #[test]
    fn test_io_size_equal_to_file_size_yields_single_offset() {
        let offsets: Vec<u64> =
            OffsetSequence::new(65_536, 65_536, AccessPattern::Sequential, SEED, 0.1).collect();
        assert_eq!(offsets, vec![0]);
    }

    #[test]
    fn test_random_is_reproducible_with_same_seed() {
        let a: Vec<u64> =
            OffsetSequence::new(1 << 30, 4096, AccessPattern::Random, SEED, 0.1).collect();
        let b: Vec<u64> =
            OffsetSequence::new(1 << 30, 4096, AccessPattern::Random, SEED, 0.1).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_differs_with_other_seed() {
        let a: Vec<u64> =
            OffsetSequence::new(1 << 30, 1 << 20, AccessPattern::Random, SEED, 0.1).collect();
        let b: Vec<u64> =
            OffsetSequence::new(1 << 30, 1 << 20, AccessPattern::Random, SEED + 1, 0.1).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn test_random_offsets_stay_inside_file() {
        let file_size = 10_000_019;
        let offsets: Vec<u64> =
            OffsetSequence::new(file_size, 512, AccessPattern::Random, SEED, 0.1).collect();
        assert!(offsets.iter().all(|&o| o < file_size));
    }

    #[test]
    fn test_random_reads_ten_percent_of_file() {
        let file_size: u64 = 1 << 30;
        let io_size: u64 = 1 << 20;
        let seq = OffsetSequence::new(file_size, io_size, AccessPattern::Random, SEED, 0.1);
        let planned = seq.planned_reads();
        let count = seq.count() as u64;

        // 10% of 1 GiB is 102.4 MiB, so 103 one-MiB reads.
        assert_eq!(count, 103);
        assert_eq!(planned, count);
        assert!(count * io_size >= file_size / 10);
        assert!((count - 1) * io_size < file_size / 10);
    }

    #[test]
    fn test_random_always_issues_one_read() {
        let offsets: Vec<u64> =
            OffsetSequence::new(4096, 4096, AccessPattern::Random, SEED, 0.1).collect();
        assert_eq!(offsets.len(), 1);
        assert!(offsets[0] < 4096);
    }

    #[test]
    fn test_zero_sizes_yield_nothing() {
        assert_eq!(
            OffsetSequence::new(0, 4096, AccessPattern::Sequential, SEED, 0.1).count(),
            0
        );
        assert_eq!(
            OffsetSequence::new(4096, 0, AccessPattern::Random, SEED, 0.1).count(),
            0
        );
    }
}
