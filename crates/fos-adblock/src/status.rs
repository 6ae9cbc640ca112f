//! Engine Status and Load Lifecycle

use crate::rule_set::RuleSet;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Where an engine is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineLifecycle {
    NotInitialized,
    Loading,
    Initialized,
    Failed,
}

impl fmt::Display for EngineLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotInitialized => "not initialized",
            Self::Loading => "loading",
            Self::Initialized => "initialized",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Point-in-time engine status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub is_initialized: bool,
    /// Set when any source failed, even if others loaded
    pub initialization_failed: bool,
    pub is_loading: bool,
    pub blocked_domains_count: usize,
    pub blocked_paths_count: usize,
    pub wildcard_patterns_count: usize,
    pub regex_patterns_count: usize,
}

impl EngineStatus {
    pub(crate) fn new(gate: &LoadGate, rules: &RuleSet) -> Self {
        Self {
            is_initialized: gate.is_initialized(),
            initialization_failed: gate.has_failed(),
            is_loading: gate.is_loading(),
            blocked_domains_count: rules.domains().len(),
            blocked_paths_count: rules.paths().len(),
            wildcard_patterns_count: rules.wildcards().len(),
            regex_patterns_count: rules.regexes().len(),
        }
    }

    /// Initialized, no source failed, and at least one hostname loaded
    pub fn is_healthy(&self) -> bool {
        self.is_initialized && !self.initialization_failed && self.blocked_domains_count > 0
    }

    pub fn lifecycle(&self) -> EngineLifecycle {
        if self.is_initialized {
            EngineLifecycle::Initialized
        } else if self.is_loading {
            EngineLifecycle::Loading
        } else if self.initialization_failed {
            EngineLifecycle::Failed
        } else {
            EngineLifecycle::NotInitialized
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} domains, {} paths, {} wildcards, {} regexes)",
            self.lifecycle(),
            self.blocked_domains_count,
            self.blocked_paths_count,
            self.wildcard_patterns_count,
            self.regex_patterns_count,
        )
    }
}

/// Outcome of one pass over an engine's sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub sources_loaded: usize,
    pub sources_failed: usize,
    pub rules: usize,
}

impl LoadReport {
    /// At least one source produced text
    pub fn succeeded(&self) -> bool {
        self.sources_loaded > 0
    }

    /// Any source failed, or nothing loaded at all
    pub fn failed(&self) -> bool {
        self.sources_failed > 0 || self.sources_loaded == 0
    }
}

/// Single-writer load gate.
///
/// `initialized` is the publication barrier: it is stored with `Release`
/// only after the rule snapshot is swapped in, and readers load it with
/// `Acquire`.
#[derive(Debug, Default)]
pub(crate) struct LoadGate {
    loading: AtomicBool,
    initialized: AtomicBool,
    failed: AtomicBool,
    completed: AtomicBool,
}

impl LoadGate {
    /// Claim the writer slot.
    ///
    /// Without `force`, refuses once a load has completed successfully.
    /// Always refuses while another load is in flight.
    pub(crate) fn try_begin(&self, force: bool) -> bool {
        if !force && self.completed.load(Ordering::Acquire) {
            return false;
        }
        if self
            .loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        // A load may have completed between the two checks
        if !force && self.completed.load(Ordering::Acquire) {
            self.loading.store(false, Ordering::Release);
            return false;
        }
        true
    }

    /// Record the outcome and release the writer slot
    pub(crate) fn finish(&self, report: &LoadReport) {
        if report.succeeded() {
            self.initialized.store(true, Ordering::Release);
            self.completed.store(true, Ordering::Release);
        }
        self.failed.store(report.failed(), Ordering::Release);
        self.loading.store(false, Ordering::Release);
    }

    /// Release the writer slot after a load that never reported
    pub(crate) fn abort(&self) {
        self.failed.store(true, Ordering::Release);
        self.loading.store(false, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub(crate) fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(loaded: usize, failed: usize) -> LoadReport {
        LoadReport {
            sources_loaded: loaded,
            sources_failed: failed,
            rules: loaded * 10,
        }
    }

    #[test]
    fn test_gate_single_writer() {
        let gate = LoadGate::default();
        assert!(gate.try_begin(false));
        assert!(!gate.try_begin(false));
        assert!(!gate.try_begin(true));
        assert!(gate.is_loading());

        gate.finish(&report(1, 0));
        assert!(gate.is_initialized());
        assert!(!gate.has_failed());
        assert!(!gate.is_loading());

        // completed: preload is a no-op, reload is not
        assert!(!gate.try_begin(false));
        assert!(gate.try_begin(true));
    }

    #[test]
    fn test_gate_failed_load_can_retry() {
        let gate = LoadGate::default();
        assert!(gate.try_begin(false));
        gate.finish(&report(0, 2));

        assert!(!gate.is_initialized());
        assert!(gate.has_failed());
        assert!(gate.try_begin(false));
    }

    #[test]
    fn test_partial_failure_stays_initialized() {
        let gate = LoadGate::default();
        assert!(gate.try_begin(false));
        gate.finish(&report(1, 1));

        assert!(gate.is_initialized());
        assert!(gate.has_failed());
    }

    #[test]
    fn test_lifecycle() {
        let mut status = EngineStatus::default();
        assert_eq!(status.lifecycle(), EngineLifecycle::NotInitialized);

        status.is_loading = true;
        assert_eq!(status.lifecycle(), EngineLifecycle::Loading);

        status.is_loading = false;
        status.initialization_failed = true;
        assert_eq!(status.lifecycle(), EngineLifecycle::Failed);
        assert!(!status.is_healthy());

        status.is_initialized = true;
        status.initialization_failed = false;
        assert_eq!(status.lifecycle(), EngineLifecycle::Initialized);
        assert!(!status.is_healthy(), "no domains loaded");

        status.blocked_domains_count = 3;
        assert!(status.is_healthy());
    }
}
