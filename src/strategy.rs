//! # Strategy Table
//!
//! Every measured strategy is one row of [`STRATEGIES`]: the category and label
//! written to the output, the cache precondition, how the target is opened,
//! which access advice is given and what is prefetched. The planner iterates
//! the table once per point of the parameter matrix.
//!
//! Labels are emitted verbatim. Some contain the two characters `\` and `n`
//! (not a newline); downstream plotting scripts split on them.

use crate::benchmark::{CachePrecondition, ClientEviction, OpenMode};
use crate::cache::{AccessAdvice, PrefetchPolicy};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Group of strategies, selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum Suite {
    /// Cold cache, with and without O_DIRECT
    #[clap(name = "baseline")]
    Baseline,

    /// Cold cache with sequential or random access advice
    #[clap(name = "extended-baseline")]
    ExtendedBaseline,

    /// File read once before the timed pass, then partially evicted
    #[clap(name = "offline")]
    Offline,

    /// Whole-file prefetch shortly before the timed pass
    #[clap(name = "jit")]
    JustInTime,

    /// Range prefetch issued while the timed pass progresses
    #[clap(name = "online")]
    Online,
}

impl Suite {
    /// Category column written for every strategy of the suite.
    pub fn category(self) -> &'static str {
        match self {
            Suite::Baseline => "Baseline",
            Suite::ExtendedBaseline => "Extended baseline",
            Suite::Offline => "Offline prefetch",
            Suite::JustInTime => "JIT prefetch",
            Suite::Online => "Online prefetch",
        }
    }

    /// Prefetch strategies only make sense for a sequential walk.
    pub fn sequential_only(self) -> bool {
        matches!(self, Suite::JustInTime | Suite::Online)
    }
}

impl std::fmt::Display for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.category())
    }
}

/// What a strategy prefetches, before its parameters are bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefetchKind {
    None,
    /// Whole file, then a lead sleep; swept over the prefetch delays
    JustInTime(PrefetchPolicy),
    /// Every stride during the pass; swept over strides larger than the I/O size
    Online(PrefetchPolicy),
}

impl PrefetchKind {
    pub fn policy(self) -> Option<PrefetchPolicy> {
        match self {
            PrefetchKind::None => None,
            PrefetchKind::JustInTime(p) | PrefetchKind::Online(p) => Some(p),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Strategy {
    pub suite: Suite,
    pub label: &'static str,
    /// Free text for the optional `desc` column; `{}` is replaced by the
    /// prefetch parameter when there is one
    pub description: &'static str,
    pub precondition: CachePrecondition,
    pub open_mode: OpenMode,
    pub access_advice: Option<AccessAdvice>,
    pub prefetch: PrefetchKind,
}

impl Strategy {
    /// Whether the strategy needs the remote cache tier.
    pub fn requires_remote(&self) -> bool {
        self.precondition.requires_remote()
            || self.prefetch.policy().map_or(false, |p| p.requires_remote())
    }

    /// Description with the prefetch parameter substituted.
    pub fn describe(&self, parameter: Option<u64>) -> String {
        match parameter {
            Some(value) => self.description.replace("{}", &value.to_string()),
            None => self.description.to_string(),
        }
    }
}

const fn cold(suite: Suite, label: &'static str, description: &'static str) -> Strategy {
    Strategy {
        suite,
        label,
        description,
        precondition: CachePrecondition::Cold,
        open_mode: OpenMode::Buffered,
        access_advice: None,
        prefetch: PrefetchKind::None,
    }
}

const fn offline(
    label: &'static str,
    description: &'static str,
    precondition: CachePrecondition,
) -> Strategy {
    Strategy {
        precondition,
        ..cold(Suite::Offline, label, description)
    }
}

const fn jit(label: &'static str, description: &'static str, policy: PrefetchPolicy) -> Strategy {
    Strategy {
        prefetch: PrefetchKind::JustInTime(policy),
        ..cold(Suite::JustInTime, label, description)
    }
}

const fn online(
    label: &'static str,
    description: &'static str,
    policy: PrefetchPolicy,
) -> Strategy {
    Strategy {
        prefetch: PrefetchKind::Online(policy),
        ..cold(Suite::Online, label, description)
    }
}

/// All strategies, in output order.
pub const STRATEGIES: &[Strategy] = &[
    Strategy {
        open_mode: OpenMode::Direct,
        ..cold(
            Suite::Baseline,
            "O_DIRECT",
            "File not cached, no readahead, using O_DIRECT",
        )
    },
    cold(Suite::Baseline, "Not cached", "File not cached"),
    Strategy {
        access_advice: Some(AccessAdvice::Sequential),
        ..cold(
            Suite::ExtendedBaseline,
            "Not cached but marked as sequential",
            "File not cached, but fadvise was used to mark it as sequential",
        )
    },
    Strategy {
        access_advice: Some(AccessAdvice::Random),
        ..cold(
            Suite::ExtendedBaseline,
            "Not cached but marked as random",
            "File not cached, but fadvise was used to mark it as random",
        )
    },
    offline(
        "Offline prefetch\\n(sync read)",
        "File was read once before the experiment",
        CachePrecondition::FullyWarm,
    ),
    offline(
        "Offline client-side prefetch\\n(sync read + ladvise evict)",
        "File was read once before the experiment, but ladvise was used to evict it from the server cache",
        CachePrecondition::WarmClient,
    ),
    offline(
        "Offline server-side prefetch\\n(sync read + drop_cache evict)",
        "File was read once before the experiment, but /proc/sys/vm/drop_caches was used to evict it from the client cache",
        CachePrecondition::WarmServer {
            client_eviction: ClientEviction::DropCaches,
        },
    ),
    offline(
        "Offline server-side prefetch\\n(sync read + fadvise evict)",
        "File was read once before the experiment, but fadvise was used to evict it from the client cache",
        CachePrecondition::WarmServer {
            client_eviction: ClientEviction::RangeAdvice,
        },
    ),
    jit(
        "JIT fadvise+ladvise prefetch of the whole file",
        "File was prefetched to the server page cache using ladvise and to the client page cache using fadvise {} us before the reading started",
        PrefetchPolicy::ClientAndServerAdvise,
    ),
    jit(
        "JIT fadvise prefetch of the whole file",
        "File was prefetched to the client page cache using fadvise {} us before the reading started",
        PrefetchPolicy::ClientAdvise,
    ),
    jit(
        "JIT ladvise prefetch of the whole file",
        "File was prefetched to the server page cache using ladvise {} us before the reading started",
        PrefetchPolicy::ServerAdvise,
    ),
    jit(
        "JIT async-io prefetch of the whole file",
        "File was prefetched to the client page cache using aio_read {} us before the reading started",
        PrefetchPolicy::ForcedAsync,
    ),
    online(
        "fadvise+ladvise online prefetching",
        "The file is prefetched using {} bytes ladvise AND fadvise prefetches",
        PrefetchPolicy::ClientAndServerAdvise,
    ),
    online(
        "aio_read+ladvise online prefetching",
        "The file is prefetched using {} bytes ladvise AND aio_read prefetches",
        PrefetchPolicy::ForcedAsyncAndServerAdvise,
    ),
    online(
        "fadvise online prefetching",
        "The file is prefetched using {} bytes fadvise prefetches",
        PrefetchPolicy::ClientAdvise,
    ),
    online(
        "ladvise online prefetching",
        "The file is prefetched using {} bytes ladvise prefetches",
        PrefetchPolicy::ServerAdvise,
    ),
    online(
        "async-io online prefetching",
        "The file is prefetched using {} bytes aio_read prefetches",
        PrefetchPolicy::ForcedAsync,
    ),
];
