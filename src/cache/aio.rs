//! Forced prefetch through POSIX asynchronous reads.
//!
//! A forced prefetch issues a real `aio_read` whose only purpose is its side
//! effect: the data lands in the page cache. Completion is never requested
//! (`SIGEV_NONE`) and the result is never consumed on the hot path.
//!
//! The kernel (or glibc's aio threads) may still be writing into the scratch
//! buffer and reading the control block after `aio_read` returns, so both are
//! owned here and kept alive until the request has finished. Finished requests
//! are reaped opportunistically on the next submission; [`ForcedPrefetcher::settle`]
//! blocks until everything outstanding is done.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use tracing::{debug, trace};

pub struct ForcedPrefetcher {
    /// Destination for every forced read; contents are never inspected.
    scratch: Vec<u8>,
    in_flight: Vec<Box<libc::aiocb>>,
}

impl ForcedPrefetcher {
    /// Allocate a scratch buffer able to absorb a prefetch of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            scratch: vec![0u8; capacity],
            in_flight: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.scratch.len()
    }

    /// Number of requests not yet reaped.
    pub fn outstanding(&self) -> usize {
        self.in_flight.len()
    }

    /// Submit an asynchronous read of `[offset, offset + length)`.
    ///
    /// Lengths beyond the scratch capacity are clamped.
    pub fn submit(&mut self, file: &File, offset: u64, length: u64) {
        self.reap();

        let length = (length as usize).min(self.scratch.len());
        if length == 0 {
            return;
        }

        // SAFETY: aiocb is a plain C struct for which all-zero is a valid value.
        let mut cb: Box<libc::aiocb> = Box::new(unsafe { std::mem::zeroed() });
        cb.aio_fildes = file.as_raw_fd();
        cb.aio_buf = self.scratch.as_mut_ptr() as *mut libc::c_void;
        cb.aio_nbytes = length;
        cb.aio_offset = offset as libc::off_t;
        cb.aio_sigevent.sigev_notify = libc::SIGEV_NONE;

        // SAFETY: the control block and the buffer it points to are owned by
        // `self` and outlive the request (see `settle` and `Drop`).
        let rc = unsafe { libc::aio_read(&mut *cb) };
        if rc == 0 {
            self.in_flight.push(cb);
        } else {
            trace!(
                "aio_read [{}, +{}) ignored: {}",
                offset,
                length,
                std::io::Error::last_os_error()
            );
        }
    }

    /// Drop control blocks whose requests have completed, without blocking.
    fn reap(&mut self) {
        self.in_flight.retain_mut(|cb| {
            // SAFETY: `cb` was successfully submitted and is still owned here.
            let status = unsafe { libc::aio_error(&**cb) };
            if status == libc::EINPROGRESS {
                true
            } else {
                unsafe { libc::aio_return(&mut **cb) };
                false
            }
        });
    }

    /// Block until every outstanding request has completed.
    pub fn settle(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }
        debug!("Settling {} forced prefetch(es)", self.in_flight.len());
        for cb in self.in_flight.iter_mut() {
            // SAFETY: see `reap`; aio_suspend only reads the list.
            unsafe {
                while libc::aio_error(&**cb) == libc::EINPROGRESS {
                    let list = [&**cb as *const libc::aiocb];
                    libc::aio_suspend(list.as_ptr(), 1, std::ptr::null());
                }
                libc::aio_return(&mut **cb);
            }
        }
        self.in_flight.clear();
    }
}

impl Drop for ForcedPrefetcher {
    fn drop(&mut self) {
        self.settle();
    }
}
