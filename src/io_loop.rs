//! # Timed I/O Loop
//!
//! Executes one pass of reads over the target and reports how many bytes came
//! back and how long the reads took. Only I/O work is billed:
//!
//! - **Unpaced** passes take one timestamp at the start and bill everything up
//!   to the end of the pass.
//! - **Paced** passes bill the segment since the last timestamp after every
//!   read, sleep for the inter-arrival delay, then restart the timestamp. The
//!   sleep never reaches the billable total.
//!
//! Online prefetching happens inside the billed interval: when an offset is an
//! exact multiple of the stride, the configured prefetch operations fire for
//! the next `stride` bytes before the read is issued.
//!
//! Reads are issued once. A short read means end-of-file and is tolerated; any
//! read or seek error aborts the pass, and with it the run.

use crate::cache::{CacheControl, PrefetchPolicy};
use crate::clock::{elapsed_us, pause_ns, timestamp_us};
use crate::error::{HarnessError, Result};
use crate::metrics::PassResult;
use std::alloc::{self, Layout};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::ptr::NonNull;
use tracing::trace;

/// Alignment of read buffers; satisfies `O_DIRECT` on common block devices.
pub const BUFFER_ALIGNMENT: usize = 4096;

/// Heap buffer aligned for direct I/O.
pub struct ReadBuffer {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

impl ReadBuffer {
    pub fn new(len: usize) -> Result<Self> {
        let layout = Layout::from_size_align(len.max(1), BUFFER_ALIGNMENT).map_err(|_| {
            HarnessError::InvalidConfig(format!("cannot allocate a {} byte read buffer", len))
        })?;
        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout));
        Ok(Self { ptr, len, layout })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is a live allocation of at least `len` initialized bytes
        // borrowed mutably through `self`.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for ReadBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with the same layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/// Prefetch issued during a pass, relative to read progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnlinePrefetch {
    pub policy: PrefetchPolicy,
    pub stride: u64,
}

/// Parameters of one timed pass.
#[derive(Debug, Clone, Copy)]
pub struct TimedLoop {
    pub io_size: usize,
    /// Delay after each read in nanoseconds; 0 disables pacing
    pub interarrival_ns: u64,
    pub online: Option<OnlinePrefetch>,
}

impl TimedLoop {
    /// Run one pass over `offsets`.
    ///
    /// `buffer` must hold at least `io_size` bytes.
    pub fn run<C, I>(
        &self,
        file: &File,
        path: &Path,
        buffer: &mut ReadBuffer,
        offsets: I,
        cache: &mut C,
    ) -> Result<PassResult>
    where
        C: CacheControl + ?Sized,
        I: IntoIterator<Item = u64>,
    {
        if buffer.len() < self.io_size {
            return Err(HarnessError::InvalidConfig(format!(
                "read buffer of {} bytes cannot hold {} byte reads",
                buffer.len(),
                self.io_size
            )));
        }
        let buf = &mut buffer.as_mut_slice()[..self.io_size];
        let mut handle = file;
        let mut result = PassResult::default();

        let mut billable_us = 0u64;
        let mut t1 = timestamp_us();
        for offset in offsets {
            if let Some(online) = self.online {
                if online.stride > 0 && offset % online.stride == 0 {
                    online.policy.issue(cache, file, offset, online.stride);
                }
            }

            handle
                .seek(SeekFrom::Start(offset))
                .map_err(|e| HarnessError::read(path, e))?;
            let n = handle.read(buf).map_err(|e| HarnessError::read(path, e))?;
            if n < self.io_size {
                trace!("Short read at offset {}: {} of {} bytes", offset, n, self.io_size);
            }
            result.bytes += n as u64;
            result.reads += 1;

            if self.interarrival_ns != 0 {
                billable_us += elapsed_us(t1);
                pause_ns(self.interarrival_ns);
                t1 = timestamp_us();
            }
        }
        billable_us += elapsed_us(t1);

        result.billable_us = billable_us;
        Ok(result)
    }
}
