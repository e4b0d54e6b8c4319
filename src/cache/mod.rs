//! # Cache Control Surface
//!
//! The measurement engine never touches page-cache primitives directly. It goes
//! through the [`CacheControl`] capability trait, which covers both cache tiers
//! a read can be served from:
//!
//! - the client-side OS page cache (drop, range evict, range prefetch, access
//!   advice), and
//! - optionally, the cache of a remote filesystem server (range evict and range
//!   prefetch through Lustre `ladvise`).
//!
//! Whether the remote tier is present is a runtime capability ([`CacheTier`])
//! resolved from configuration. Callers ask [`CacheControl::remote_available`]
//! instead of branching at compile time; on a local-only surface the remote
//! operations are no-ops.
//!
//! Every advisory is best-effort. Only failures that make the measurement
//! meaningless (the drop-caches control file cannot be opened or written)
//! surface as errors.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;

pub mod aio;
pub mod ladvise;
pub mod page_cache;

pub use aio::ForcedPrefetcher;
pub use page_cache::{EvictionPressure, PageCacheControl, PressureSource};

/// Which cache tiers the surface can control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheTier {
    /// Client page cache only; remote operations are no-ops
    LocalOnly,
    /// Client page cache plus the remote filesystem's server-side cache
    LocalPlusRemote,
}

impl std::fmt::Display for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheTier::LocalOnly => write!(f, "local only"),
            CacheTier::LocalPlusRemote => write!(f, "local + remote"),
        }
    }
}

/// Access-pattern hint applied to a byte range before a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessAdvice {
    Sequential,
    Random,
}

/// The set of prefetch operations fired together for one range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrefetchPolicy {
    /// `posix_fadvise(WILLNEED)` on the client
    ClientAdvise,
    /// `ladvise(WILLREAD)` on the server
    ServerAdvise,
    /// Server advisory followed by client advisory
    ClientAndServerAdvise,
    /// Forced asynchronous read into the scratch buffer
    ForcedAsync,
    /// Server advisory followed by a forced asynchronous read
    ForcedAsyncAndServerAdvise,
}

impl PrefetchPolicy {
    /// Whether the policy needs the remote tier to mean anything.
    pub fn requires_remote(self) -> bool {
        matches!(
            self,
            PrefetchPolicy::ServerAdvise
                | PrefetchPolicy::ClientAndServerAdvise
                | PrefetchPolicy::ForcedAsyncAndServerAdvise
        )
    }

    /// Fire this policy's operations for `[offset, offset + length)`.
    pub fn issue<C: CacheControl + ?Sized>(
        self,
        cache: &mut C,
        file: &File,
        offset: u64,
        length: u64,
    ) {
        match self {
            PrefetchPolicy::ClientAdvise => cache.prefetch_client_range(file, offset, length),
            PrefetchPolicy::ServerAdvise => cache.prefetch_server_range(file, offset, length),
            PrefetchPolicy::ClientAndServerAdvise => {
                cache.prefetch_server_range(file, offset, length);
                cache.prefetch_client_range(file, offset, length);
            }
            PrefetchPolicy::ForcedAsync => cache.force_prefetch(file, offset, length),
            PrefetchPolicy::ForcedAsyncAndServerAdvise => {
                cache.prefetch_server_range(file, offset, length);
                cache.force_prefetch(file, offset, length);
            }
        }
    }
}

/// Capability interface over the cache-control primitives.
pub trait CacheControl {
    /// Which tiers this surface controls.
    fn tier(&self) -> CacheTier;

    fn remote_available(&self) -> bool {
        self.tier() == CacheTier::LocalPlusRemote
    }

    /// Drop the whole client page cache.
    ///
    /// Fails only when the drop mechanism itself is unusable.
    fn drop_client_cache(&mut self, file: &File) -> Result<()>;

    fn evict_client_range(&mut self, file: &File, offset: u64, length: u64);

    fn prefetch_client_range(&mut self, file: &File, offset: u64, length: u64);

    fn evict_server_range(&mut self, file: &File, offset: u64, length: u64);

    fn prefetch_server_range(&mut self, file: &File, offset: u64, length: u64);

    /// Issue an asynchronous read of the range and return without waiting.
    fn force_prefetch(&mut self, file: &File, offset: u64, length: u64);

    fn advise_access(&mut self, file: &File, offset: u64, length: u64, advice: AccessAdvice);

    /// Wait for outstanding forced reads so the next precondition starts from a
    /// settled cache.
    fn quiesce(&mut self) {}
}
