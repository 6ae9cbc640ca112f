//! Match Profiler
//!
//! Per-tier hit counts and time spent in the advanced engine's matcher.
//! Compiled in with the `profiling` feature; otherwise every call is a
//! no-op on a zero-sized type and the request path pays nothing.

use crate::rule::RuleKind;
use serde::Serialize;

/// Counters collected by [`MatchProfiler`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProfileSnapshot {
    /// Hits per tier, indexed by [`RuleKind::index`]
    pub hits: [u64; 4],
    /// Nanoseconds spent in checks that ended on each tier
    pub nanos: [u64; 4],
    pub misses: u64,
    pub miss_nanos: u64,
}

impl ProfileSnapshot {
    pub fn hits_for(&self, kind: RuleKind) -> u64 {
        self.hits[kind.index()]
    }

    pub fn total_checks(&self) -> u64 {
        self.hits.iter().sum::<u64>() + self.misses
    }
}

#[cfg(feature = "profiling")]
mod imp {
    use super::ProfileSnapshot;
    use crate::rule::RuleKind;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Instant;

    /// Start time of one check
    pub struct Probe(Instant);

    #[derive(Debug, Default)]
    pub struct MatchProfiler {
        hits: [AtomicU64; 4],
        nanos: [AtomicU64; 4],
        misses: AtomicU64,
        miss_nanos: AtomicU64,
    }

    impl MatchProfiler {
        pub const ENABLED: bool = true;

        pub fn new() -> Self {
            Self::default()
        }

        #[inline]
        pub fn start(&self) -> Probe {
            Probe(Instant::now())
        }

        /// Attribute a finished check to the tier that matched (or a miss)
        #[inline]
        pub fn record(&self, tier: Option<RuleKind>, probe: Probe) {
            let elapsed = probe.0.elapsed().as_nanos() as u64;
            match tier {
                Some(kind) => {
                    self.hits[kind.index()].fetch_add(1, Ordering::Relaxed);
                    self.nanos[kind.index()].fetch_add(elapsed, Ordering::Relaxed);
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    self.miss_nanos.fetch_add(elapsed, Ordering::Relaxed);
                }
            }
        }

        pub fn snapshot(&self) -> ProfileSnapshot {
            ProfileSnapshot {
                hits: std::array::from_fn(|i| self.hits[i].load(Ordering::Relaxed)),
                nanos: std::array::from_fn(|i| self.nanos[i].load(Ordering::Relaxed)),
                misses: self.misses.load(Ordering::Relaxed),
                miss_nanos: self.miss_nanos.load(Ordering::Relaxed),
            }
        }
    }
}

#[cfg(not(feature = "profiling"))]
mod imp {
    use super::ProfileSnapshot;
    use crate::rule::RuleKind;

    pub struct Probe;

    #[derive(Debug, Default)]
    pub struct MatchProfiler;

    impl MatchProfiler {
        pub const ENABLED: bool = false;

        pub fn new() -> Self {
            Self
        }

        #[inline(always)]
        pub fn start(&self) -> Probe {
            Probe
        }

        #[inline(always)]
        pub fn record(&self, _tier: Option<RuleKind>, _probe: Probe) {}

        pub fn snapshot(&self) -> ProfileSnapshot {
            ProfileSnapshot::default()
        }
    }
}

pub use imp::{MatchProfiler, Probe};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiler_records_when_enabled() {
        let profiler = MatchProfiler::new();
        profiler.record(Some(RuleKind::Path), profiler.start());
        profiler.record(Some(RuleKind::Path), profiler.start());
        profiler.record(None, profiler.start());

        let snapshot = profiler.snapshot();
        if MatchProfiler::ENABLED {
            assert_eq!(snapshot.hits_for(RuleKind::Path), 2);
            assert_eq!(snapshot.misses, 1);
            assert_eq!(snapshot.total_checks(), 3);
        } else {
            assert_eq!(snapshot, ProfileSnapshot::default());
            assert_eq!(std::mem::size_of::<MatchProfiler>(), 0);
        }
    }
}
