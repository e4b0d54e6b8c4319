//! Shared fixtures for the integration tests.
//!
//! The real cache-control surface is used with a plain file standing in for
//! `/proc/sys/vm/drop_caches`, so the tests run unprivileged.

#![allow(dead_code)]

use prefetch_bench::cache::{AccessAdvice, CacheControl, CacheTier, PageCacheControl};
use std::fs::File;
use std::io::Write;
use tempfile::NamedTempFile;

/// Target file of `len` bytes with a recognisable byte pattern.
pub fn target_file(len: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let content: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    file.write_all(&content).unwrap();
    file.flush().unwrap();
    file
}

/// Cache-control surface writing its drop requests into a scratch file.
pub fn local_cache(drop_caches: &NamedTempFile, scratch: usize) -> PageCacheControl {
    PageCacheControl::new(CacheTier::LocalOnly, drop_caches.path(), None, scratch)
}

/// Command line with the given target followed by `extra`.
pub fn argv<'a>(target: &'a str, drop_caches: &'a str, extra: &[&'a str]) -> Vec<&'a str> {
    let mut argv = vec![
        "prefetch-bench",
        "--target",
        target,
        "--drop-caches-path",
        drop_caches,
    ];
    argv.extend_from_slice(extra);
    argv
}

/// Cache-control double that records each call by name and forwards it to
/// an inner surface.
pub struct Recording<C> {
    pub inner: C,
    pub calls: Vec<&'static str>,
}

impl<C> Recording<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            calls: Vec::new(),
        }
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.iter().filter(|c| **c == name).count()
    }
}

impl<C: CacheControl> CacheControl for Recording<C> {
    fn tier(&self) -> CacheTier {
        self.inner.tier()
    }
    fn drop_client_cache(&mut self, file: &File) -> prefetch_bench::error::Result<()> {
        self.calls.push("drop_client_cache");
        self.inner.drop_client_cache(file)
    }
    fn evict_client_range(&mut self, file: &File, offset: u64, length: u64) {
        self.calls.push("evict_client_range");
        self.inner.evict_client_range(file, offset, length)
    }
    fn prefetch_client_range(&mut self, file: &File, offset: u64, length: u64) {
        self.calls.push("prefetch_client_range");
        self.inner.prefetch_client_range(file, offset, length)
    }
    fn evict_server_range(&mut self, file: &File, offset: u64, length: u64) {
        self.calls.push("evict_server_range");
        self.inner.evict_server_range(file, offset, length)
    }
    fn prefetch_server_range(&mut self, file: &File, offset: u64, length: u64) {
        self.calls.push("prefetch_server_range");
        self.inner.prefetch_server_range(file, offset, length)
    }
    fn force_prefetch(&mut self, file: &File, offset: u64, length: u64) {
        self.calls.push("force_prefetch");
        self.inner.force_prefetch(file, offset, length)
    }
    fn advise_access(&mut self, file: &File, offset: u64, length: u64, advice: AccessAdvice) {
        self.calls.push("advise_access");
        self.inner.advise_access(file, offset, length, advice)
    }
    fn quiesce(&mut self) {
        self.calls.push("quiesce");
        self.inner.quiesce()
    }
}
