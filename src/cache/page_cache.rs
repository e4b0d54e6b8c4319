//! Linux implementation of the cache-control surface.
//!
//! Client-tier operations use `/proc/sys/vm/drop_caches` and `posix_fadvise`;
//! remote-tier operations go through [`super::ladvise`]; forced prefetches go
//! through [`super::ForcedPrefetcher`].

use super::aio::ForcedPrefetcher;
use super::ladvise::{server_advise, ServerAdvice};
use super::{AccessAdvice, CacheControl, CacheTier};
use crate::error::{HarnessError, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use tracing::{debug, trace};

/// Where the eviction-pressure reads come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressureSource {
    /// The target itself, starting at `offset`, which lies past every measured
    /// region so the pressure never warms what is about to be timed
    Target { offset: u64 },
    /// A separate file, read from its start; must not be the target
    File(PathBuf),
}

impl std::fmt::Display for PressureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PressureSource::Target { offset } => write!(f, "target past byte {}", offset),
            PressureSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Secondary read volume used to push the target out of the page cache on
/// local filesystems, where `drop_caches` alone is unreliable (GPFS among
/// them). Reads stop early at end of file.
#[derive(Debug, Clone)]
pub struct EvictionPressure {
    pub source: PressureSource,
    /// Total bytes read per drop
    pub volume: u64,
    /// Size of each read
    pub chunk: usize,
}

pub struct PageCacheControl {
    tier: CacheTier,
    drop_caches_path: PathBuf,
    pressure: Option<EvictionPressure>,
    pressure_buffer: Vec<u8>,
    pressure_read: u64,
    forced: ForcedPrefetcher,
}

impl PageCacheControl {
    /// Build the surface.
    ///
    /// `scratch_capacity` sizes the forced-prefetch buffer and should be the
    /// largest range that will ever be force-prefetched (the largest file size
    /// under test).
    pub fn new(
        tier: CacheTier,
        drop_caches_path: impl Into<PathBuf>,
        pressure: Option<EvictionPressure>,
        scratch_capacity: usize,
    ) -> Self {
        let pressure_buffer = match &pressure {
            Some(p) => vec![0u8; p.chunk],
            None => Vec::new(),
        };
        Self {
            tier,
            drop_caches_path: drop_caches_path.into(),
            pressure,
            pressure_buffer,
            pressure_read: 0,
            forced: ForcedPrefetcher::with_capacity(scratch_capacity),
        }
    }

    fn write_drop_caches(&self) -> Result<()> {
        let mut control = OpenOptions::new()
            .write(true)
            .open(&self.drop_caches_path)
            .map_err(|e| HarnessError::configuration(&self.drop_caches_path, e))?;
        control
            .write_all(b"3")
            .map_err(|e| HarnessError::configuration(&self.drop_caches_path, e))?;
        Ok(())
    }

    /// Bytes of eviction pressure read after the most recent drop.
    pub fn pressure_bytes_read(&self) -> u64 {
        self.pressure_read
    }

    fn apply_pressure(&mut self, target: &File) -> Result<()> {
        self.pressure_read = 0;
        let Some(pressure) = &self.pressure else {
            return Ok(());
        };
        if self.pressure_buffer.is_empty() {
            return Ok(());
        }

        let opened;
        let (source, start) = match &pressure.source {
            PressureSource::Target { offset } => (target, *offset),
            PressureSource::File(path) => {
                opened = File::open(path).map_err(|e| HarnessError::configuration(path, e))?;
                (&opened, 0)
            }
        };

        let mut done = 0u64;
        while done < pressure.volume {
            let want = (pressure.volume - done).min(self.pressure_buffer.len() as u64) as usize;
            match source.read_at(&mut self.pressure_buffer[..want], start + done) {
                Ok(0) => break,
                Ok(n) => done += n as u64,
                Err(e) => {
                    trace!("Eviction pressure read stopped early: {}", e);
                    break;
                }
            }
        }
        self.pressure_read = done;
        debug!(
            "Read {} bytes of eviction pressure from {}",
            done, pressure.source
        );
        Ok(())
    }
}

fn fadvise(file: &File, offset: u64, length: u64, advice: libc::c_int) {
    // SAFETY: plain syscall on a descriptor owned by `file`.
    let rc = unsafe {
        libc::posix_fadvise(
            file.as_raw_fd(),
            offset as libc::off_t,
            length as libc::off_t,
            advice,
        )
    };
    if rc != 0 {
        trace!(
            "posix_fadvise({}) [{}, +{}) ignored: {}",
            advice,
            offset,
            length,
            std::io::Error::from_raw_os_error(rc)
        );
    }
}

fn sync_all_filesystems() {
    // SAFETY: sync(2) takes no arguments and cannot fail.
    unsafe { libc::sync() };
}

impl CacheControl for PageCacheControl {
    fn tier(&self) -> CacheTier {
        self.tier
    }

    fn drop_client_cache(&mut self, file: &File) -> Result<()> {
        sync_all_filesystems();
        self.write_drop_caches()?;
        // Remote filesystems manage the client cache well enough on their own.
        if self.tier == CacheTier::LocalOnly {
            self.apply_pressure(file)?;
        }
        sync_all_filesystems();
        Ok(())
    }

    fn evict_client_range(&mut self, file: &File, offset: u64, length: u64) {
        fadvise(file, offset, length, libc::POSIX_FADV_DONTNEED);
    }

    fn prefetch_client_range(&mut self, file: &File, offset: u64, length: u64) {
        fadvise(file, offset, length, libc::POSIX_FADV_WILLNEED);
    }

    fn evict_server_range(&mut self, file: &File, offset: u64, length: u64) {
        if self.remote_available() {
            server_advise(file, ServerAdvice::DontNeed, offset, length);
        }
    }

    fn prefetch_server_range(&mut self, file: &File, offset: u64, length: u64) {
        if self.remote_available() {
            server_advise(file, ServerAdvice::WillRead, offset, length);
        }
    }

    fn force_prefetch(&mut self, file: &File, offset: u64, length: u64) {
        self.forced.submit(file, offset, length);
    }

    fn advise_access(&mut self, file: &File, offset: u64, length: u64, advice: AccessAdvice) {
        let advice = match advice {
            AccessAdvice::Sequential => libc::POSIX_FADV_SEQUENTIAL,
            AccessAdvice::Random => libc::POSIX_FADV_RANDOM,
        };
        fadvise(file, offset, length, advice);
    }

    fn quiesce(&mut self) {
        self.forced.settle();
    }
}
