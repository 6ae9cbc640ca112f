//! Advanced Engine
//!
//! Four-tier matcher over a full [`RuleSet`]:
//! 1. Hostname exact or parent-suffix match (hash lookup)
//! 2. Path substring (one Aho-Corasick pass)
//! 3. Wildcard globs
//! 4. Regexes
//!
//! Tiers run cheapest first and the first hit wins. Wildcard and regex
//! buckets are capped by [`LoadLimits`]; whatever did not fit is counted
//! and reported through [`AdvancedEngine::rule_stats`].

use crate::assets::{AssetProvider, FilterCache};
use crate::loader::load_sources;
use crate::profiler::{MatchProfiler, ProfileSnapshot};
use crate::rule::RuleKind;
use crate::rule_set::{LoadLimits, RuleSet, RuleSetBuilder, RuleStats};
use crate::status::{EngineStatus, LoadGate, LoadReport};
use crate::url::host_of;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Advanced engine settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedEngineOptions {
    /// When off, the engine never loads and the hook relies on the fast
    /// engine alone
    pub enabled: bool,
}

impl Default for AdvancedEngineOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Which rule blocked a URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleMatch {
    pub tier: RuleKind,
    /// Pattern text of the matching rule
    pub rule: String,
}

impl fmt::Display for RuleMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rule '{}'", self.tier, self.rule)
    }
}

/// Full filter-list matcher
pub struct AdvancedEngine {
    assets: Arc<dyn AssetProvider>,
    cache: Option<Arc<dyn FilterCache>>,
    limits: LoadLimits,
    options: AdvancedEngineOptions,
    rules: ArcSwap<RuleSet>,
    gate: LoadGate,
    profiler: MatchProfiler,
}

impl AdvancedEngine {
    pub fn new(
        assets: Arc<dyn AssetProvider>,
        limits: LoadLimits,
        options: AdvancedEngineOptions,
    ) -> Self {
        Self {
            assets,
            cache: None,
            limits,
            options,
            rules: ArcSwap::from_pointee(RuleSet::empty()),
            gate: LoadGate::default(),
            profiler: MatchProfiler::new(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn FilterCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Load rules in the background; a no-op while loading or once loaded
    pub async fn preload_from_assets(self: &Arc<Self>) {
        self.spawn_load(false).await;
    }

    /// Forced rebuild after a filter refresh
    pub async fn reload(self: &Arc<Self>) {
        self.spawn_load(true).await;
    }

    /// Load on the calling thread
    pub fn load_blocking(&self) -> LoadReport {
        if !self.options.enabled || !self.gate.try_begin(false) {
            return LoadReport::default();
        }
        self.load_now()
    }

    async fn spawn_load(self: &Arc<Self>, force: bool) {
        if !self.options.enabled {
            debug!("[advanced] Disabled, not loading");
            return;
        }
        if !self.gate.try_begin(force) {
            debug!("[advanced] Load skipped: already loaded or in flight");
            return;
        }

        let engine = Arc::clone(self);
        if let Err(e) = tokio::task::spawn_blocking(move || engine.load_now()).await {
            error!("[advanced] Load task failed: {}", e);
            self.gate.abort();
        }
    }

    fn load_now(&self) -> LoadReport {
        let start = Instant::now();
        let mut builder = RuleSetBuilder::new(self.limits);
        let mut report =
            load_sources("advanced", &mut builder, self.assets.as_ref(), self.cache.as_deref());

        if report.succeeded() {
            let rules = builder.finish();
            let stats = rules.stats();
            report.rules = rules.rule_count();
            info!("[advanced] Loaded {} in {:?}", stats, start.elapsed());

            if stats.is_truncated() {
                warn!(
                    "[advanced] Rule coverage truncated: \
                     {} wildcards and {} regexes dropped ({:.1}%)",
                    stats.wildcard_patterns_dropped(),
                    stats.regex_patterns_dropped(),
                    stats.truncation_percentage()
                );
            }
            if stats.invalid_rules > 0 || stats.unsupported_rules > 0 {
                debug!(
                    "[advanced] Skipped {} invalid and {} unsupported rules",
                    stats.invalid_rules, stats.unsupported_rules
                );
            }
            self.rules.store(Arc::new(rules));
        } else {
            warn!("[advanced] No rule source could be loaded, keeping previous rules");
        }
        if report.sources_failed > 0 {
            warn!("[advanced] {} rule sources failed to load", report.sources_failed);
        }

        self.gate.finish(&report);
        report
    }

    /// Find the first rule blocking `url`, tier by tier.
    ///
    /// `None` while uninitialized and for URLs without a host.
    pub fn check(&self, url: &str) -> Option<RuleMatch> {
        if !self.gate.is_initialized() {
            return None;
        }

        let probe = self.profiler.start();
        let url = url.trim().to_lowercase();
        let matched = host_of(&url).and_then(|host| self.match_tiers(&url, host));
        self.profiler.record(matched.as_ref().map(|m| m.tier), probe);

        if let Some(m) = &matched {
            trace!("[advanced] Blocked {} ({})", url, m);
        }
        matched
    }

    fn match_tiers(&self, url: &str, host: &str) -> Option<RuleMatch> {
        let rules = self.rules.load();
        let hit = |tier, rule: &str| {
            Some(RuleMatch {
                tier,
                rule: rule.to_string(),
            })
        };

        if let Some(domain) = rules.domains().find(host) {
            return hit(RuleKind::Domain, domain);
        }
        if let Some(path) = rules.paths().find(url) {
            return hit(RuleKind::Path, path);
        }
        if let Some(glob) = rules.wildcards().iter().find(|glob| glob.is_match(url)) {
            return hit(RuleKind::Wildcard, glob.as_str());
        }
        rules
            .regexes()
            .iter()
            .find(|regex| regex.is_match(url))
            .and_then(|regex| hit(RuleKind::Regex, regex.as_str()))
    }

    #[inline]
    pub fn should_block(&self, url: &str) -> bool {
        self.check(url).is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.gate.is_initialized()
    }

    /// Loaded, limit and dropped counts of the current rules
    pub fn rule_stats(&self) -> RuleStats {
        self.rules.load().stats()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus::new(&self.gate, &self.rules.load())
    }

    /// Per-tier counters (all zero unless built with `profiling`)
    pub fn profile(&self) -> ProfileSnapshot {
        self.profiler.snapshot()
    }
}
