//! Request Decision Hook
//!
//! The single per-request entry point. Composes both engines and the
//! hardcoded fallback into one verdict.
//!
//! Flow:
//! 1. Fast engine, if initialized (hostname lookup)
//! 2. Advanced engine, if initialized (four tiers)
//! 3. Hardcoded tables, only while neither engine is initialized

use crate::advanced_engine::{AdvancedEngine, RuleMatch};
use crate::assets::FilterCache;
use crate::bypass::BypassScripts;
use crate::config::AdblockConfig;
use crate::fast_engine::FastEngine;
use crate::hardcoded::{HardcodedFilters, HardcodedMatch};
use crate::rule_set::RuleStats;
use crate::status::EngineStatus;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, trace, warn};

/// Decision for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Block(BlockReason),
}

impl Verdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Block(_))
    }
}

/// Why a request was blocked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// Fast engine hostname hit (the matching blocked domain)
    FastDomain(String),
    /// Advanced engine hit
    Advanced(RuleMatch),
    /// Hardcoded fallback hit
    Hardcoded(HardcodedMatch),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FastDomain(d) => write!(f, "Blocked domain: {}", d),
            Self::Advanced(m) => write!(f, "Filter {}", m),
            Self::Hardcoded(HardcodedMatch::Domain(d)) => write!(f, "Hardcoded domain: {}", d),
            Self::Hardcoded(HardcodedMatch::Keyword(k)) => write!(f, "Hardcoded keyword: {}", k),
            Self::Hardcoded(HardcodedMatch::TrackingParam(p)) => {
                write!(f, "Tracking parameter: {}", p)
            }
        }
    }
}

/// Request counters
#[derive(Debug, Default)]
pub struct FilterStats {
    pub total_requests: AtomicU64,
    pub blocked_requests: AtomicU64,
    pub total_check_time_ns: AtomicU64,
}

/// Combined status of both engines and the request counters
#[derive(Debug, Clone, Serialize)]
pub struct FilterStatusReport {
    pub fast: EngineStatus,
    pub advanced: EngineStatus,
    pub rule_stats: RuleStats,
    pub requests_checked: u64,
    pub requests_blocked: u64,
    pub avg_check_time_ns: u64,
}

impl FilterStatusReport {
    /// Neither engine is serving, so only hardcoded rules apply
    pub fn hardcoded_only(&self) -> bool {
        !self.fast.is_initialized && !self.advanced.is_initialized
    }

    /// Log at `info` when healthy, `warn` when degraded or truncated
    pub fn log_summary(&self) {
        if self.hardcoded_only() {
            warn!("Content filter running on hardcoded rules only");
        }
        if self.fast.is_healthy() {
            info!("Fast engine: {}", self.fast);
        } else {
            warn!("Fast engine degraded: {}", self.fast);
        }
        if self.advanced.is_healthy() {
            info!("Advanced engine: {}", self.advanced);
        } else {
            warn!("Advanced engine degraded: {}", self.advanced);
        }
        if self.rule_stats.is_truncated() {
            warn!(
                "Filter coverage truncated by {:.1}%: {}",
                self.rule_stats.truncation_percentage(),
                self.rule_stats
            );
        }
        info!(
            "Requests: {} checked, {} blocked, avg {} ns",
            self.requests_checked, self.requests_blocked, self.avg_check_time_ns
        );
    }
}

/// Per-process request filter
pub struct RequestFilter {
    fast: Arc<FastEngine>,
    advanced: Arc<AdvancedEngine>,
    stats: FilterStats,
}

impl RequestFilter {
    pub fn new(fast: Arc<FastEngine>, advanced: Arc<AdvancedEngine>) -> Self {
        Self {
            fast,
            advanced,
            stats: FilterStats::default(),
        }
    }

    /// Build both engines from configuration, reading `cache` first when
    /// present. Nothing is loaded until [`preload`](Self::preload).
    pub fn from_config(config: &AdblockConfig, cache: Option<Arc<dyn FilterCache>>) -> Arc<Self> {
        let assets = config.asset_provider();

        let mut fast = FastEngine::new(Arc::clone(&assets), config.fast);
        let mut advanced = AdvancedEngine::new(assets, config.limits, config.advanced);
        if let Some(cache) = cache {
            fast = fast.with_cache(Arc::clone(&cache));
            advanced = advanced.with_cache(cache);
        }

        Arc::new(Self::new(Arc::new(fast), Arc::new(advanced)))
    }

    /// Decide one request.
    ///
    /// This is the hot path: no I/O, no locks.
    pub fn check(&self, url: &str) -> Verdict {
        let start = Instant::now();
        self.stats.total_requests.fetch_add(1, Ordering::Relaxed);

        let verdict = self.decide(url);

        let elapsed = start.elapsed().as_nanos() as u64;
        self.stats.total_check_time_ns.fetch_add(elapsed, Ordering::Relaxed);
        if let Verdict::Block(reason) = &verdict {
            self.stats.blocked_requests.fetch_add(1, Ordering::Relaxed);
            trace!("Blocked {} ({}, {} ns)", url, reason, elapsed);
        }
        verdict
    }

    fn decide(&self, url: &str) -> Verdict {
        let fast_ready = self.fast.is_initialized();
        let advanced_ready = self.advanced.is_initialized();

        if fast_ready {
            if let Some(domain) = self.fast.blocked_domain(url) {
                return Verdict::Block(BlockReason::FastDomain(domain));
            }
        }
        if advanced_ready {
            if let Some(m) = self.advanced.check(url) {
                return Verdict::Block(BlockReason::Advanced(m));
            }
        }
        if !fast_ready && !advanced_ready {
            if let Some(m) = HardcodedFilters::check(url) {
                return Verdict::Block(BlockReason::Hardcoded(m));
            }
        }
        Verdict::Allow
    }

    #[inline]
    pub fn should_block(&self, url: &str) -> bool {
        self.check(url).is_blocked()
    }

    /// Load both engines concurrently
    pub async fn preload(&self) {
        tokio::join!(self.fast.preload_from_assets(), self.advanced.preload_from_assets());
        self.status_report().log_summary();
    }

    /// Rebuild both engines, e.g. after the remote cache changed
    pub async fn reload(&self) {
        tokio::join!(self.fast.reload(), self.advanced.reload());
        info!("Content filter reloaded");
    }

    pub fn fast_engine(&self) -> &Arc<FastEngine> {
        &self.fast
    }

    pub fn advanced_engine(&self) -> &Arc<AdvancedEngine> {
        &self.advanced
    }

    /// Scripts to inject into every page
    pub fn scripts(&self) -> BypassScripts {
        BypassScripts::get()
    }

    pub fn status_report(&self) -> FilterStatusReport {
        let checked = self.stats.total_requests.load(Ordering::Relaxed);
        let total_ns = self.stats.total_check_time_ns.load(Ordering::Relaxed);

        FilterStatusReport {
            fast: self.fast.status(),
            advanced: self.advanced.status(),
            rule_stats: self.advanced.rule_stats(),
            requests_checked: checked,
            requests_blocked: self.stats.blocked_requests.load(Ordering::Relaxed),
            avg_check_time_ns: if checked == 0 { 0 } else { total_ns / checked },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advanced_engine::AdvancedEngineOptions;
    use crate::fast_engine::FastEngineOptions;
    use crate::loader::testing::MemoryAssets;
    use crate::rule::RuleKind;
    use crate::rule_set::LoadLimits;

    fn filter(lists: &[(&str, Option<&str>)]) -> RequestFilter {
        let assets = Arc::new(MemoryAssets::with(lists));
        let fast =
            FastEngine::new(assets.clone(), FastEngineOptions { seed_with_hardcoded: false });
        let advanced =
            AdvancedEngine::new(assets, LoadLimits::default(), AdvancedEngineOptions::default());
        RequestFilter::new(Arc::new(fast), Arc::new(advanced))
    }

    #[test]
    fn test_hardcoded_fallback_before_init() {
        let filter = filter(&[("list.txt", Some("||custom-ads.com^\n"))]);

        let verdict = filter.check("https://securepubads.g.doubleclick.net/tag");
        assert!(matches!(
            verdict,
            Verdict::Block(BlockReason::Hardcoded(HardcodedMatch::Domain(_)))
        ));
        assert!(filter.should_block("https://example.com/page?gclid=abc"));
        // only the hardcoded table applies before load
        assert!(!filter.should_block("https://custom-ads.com/"));
        assert!(filter.status_report().hardcoded_only());
    }

    #[tokio::test]
    async fn test_engines_take_over_after_preload() {
        let filter = filter(&[("list.txt", Some("||custom-ads.com^\n/promo/*.js\n"))]);
        filter.preload().await;

        assert_eq!(
            filter.check("https://x.custom-ads.com/"),
            Verdict::Block(BlockReason::FastDomain("custom-ads.com".into()))
        );
        match filter.check("https://site.com/promo/a.js") {
            Verdict::Block(BlockReason::Advanced(m)) => assert_eq!(m.tier, RuleKind::Wildcard),
            other => panic!("unexpected verdict {:?}", other),
        }
        // hardcoded tables no longer consulted once an engine is live
        assert_eq!(filter.check("https://doubleclick.net/"), Verdict::Allow);
        assert!(!filter.status_report().hardcoded_only());
    }

    #[tokio::test]
    async fn test_all_sources_failed_keeps_hardcoded() {
        let filter = filter(&[("broken.txt", None)]);
        filter.preload().await;

        let report = filter.status_report();
        assert!(report.fast.initialization_failed);
        assert!(report.advanced.initialization_failed);
        assert!(filter.should_block("https://doubleclick.net/"));
    }

    #[test]
    fn test_stats_counted() {
        let filter = filter(&[]);
        filter.check("https://doubleclick.net/");
        filter.check("https://example.com/");

        let report = filter.status_report();
        assert_eq!(report.requests_checked, 2);
        assert_eq!(report.requests_blocked, 1);
    }

    #[test]
    fn test_malformed_urls_allowed() {
        let filter = filter(&[]);
        for url in ["", "https://", "::::", "\0"] {
            assert_eq!(filter.check(url), Verdict::Allow, "{:?}", url);
        }
    }

    #[test]
    fn test_block_reason_display() {
        let reason = BlockReason::Advanced(RuleMatch {
            tier: RuleKind::Path,
            rule: "/ads/".into(),
        });
        assert_eq!(reason.to_string(), "Filter path rule '/ads/'");
        assert_eq!(
            BlockReason::FastDomain("ads.com".into()).to_string(),
            "Blocked domain: ads.com"
        );
    }

    #[test]
    fn test_from_config_uses_bundled_lists() {
        let filter = RequestFilter::from_config(&AdblockConfig::default(), None);
        filter.fast_engine().load_blocking();
        filter.advanced_engine().load_blocking();

        assert!(filter.should_block("https://www.google-analytics.com/analytics.js"));
        assert!(filter.status_report().fast.is_healthy());
        assert!(!filter.scripts().object_spoofing.is_empty());
    }
}
