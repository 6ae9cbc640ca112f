//! Fast Engine
//!
//! Domain-only first line of defense. Holds one [`DomainSet`] and answers
//! with a hostname lookup plus parent-suffix walk, nothing else.
//!
//! [`DomainSet`]: crate::domain_set::DomainSet

use crate::assets::{AssetProvider, FilterCache};
use crate::hardcoded::HardcodedFilters;
use crate::loader::load_sources;
use crate::rule_set::{RuleSet, RuleSetBuilder};
use crate::status::{EngineStatus, LoadGate, LoadReport};
use crate::url::extract_domain;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Fast engine settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastEngineOptions {
    /// Add the hardcoded domain table on top of the loaded sources
    pub seed_with_hardcoded: bool,
}

impl Default for FastEngineOptions {
    fn default() -> Self {
        Self {
            seed_with_hardcoded: true,
        }
    }
}

/// Hostname-only blocker
pub struct FastEngine {
    assets: Arc<dyn AssetProvider>,
    cache: Option<Arc<dyn FilterCache>>,
    options: FastEngineOptions,
    rules: ArcSwap<RuleSet>,
    gate: LoadGate,
}

impl FastEngine {
    /// Create an empty, uninitialized engine
    pub fn new(assets: Arc<dyn AssetProvider>, options: FastEngineOptions) -> Self {
        Self {
            assets,
            cache: None,
            options,
            rules: ArcSwap::from_pointee(RuleSet::empty()),
            gate: LoadGate::default(),
        }
    }

    /// Read remotely fetched rules before the bundled assets
    pub fn with_cache(mut self, cache: Arc<dyn FilterCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Load rules in the background.
    ///
    /// Idempotent: returns immediately while a load is in flight or once a
    /// load has succeeded.
    pub async fn preload_from_assets(self: &Arc<Self>) {
        self.spawn_load(false).await;
    }

    /// Rebuild from the current sources, e.g. after a filter refresh.
    /// Readers keep the previous snapshot until the new one is published.
    pub async fn reload(self: &Arc<Self>) {
        self.spawn_load(true).await;
    }

    /// Load on the calling thread. For hosts without a tokio runtime.
    pub fn load_blocking(&self) -> LoadReport {
        if !self.gate.try_begin(false) {
            debug!("[fast] Load skipped: already loaded or in flight");
            return LoadReport::default();
        }
        self.load_now()
    }

    async fn spawn_load(self: &Arc<Self>, force: bool) {
        if !self.gate.try_begin(force) {
            debug!("[fast] Load skipped: already loaded or in flight");
            return;
        }

        let engine = Arc::clone(self);
        if let Err(e) = tokio::task::spawn_blocking(move || engine.load_now()).await {
            error!("[fast] Load task failed: {}", e);
            self.gate.abort();
        }
    }

    /// Build, publish and release the gate. Caller holds the gate.
    fn load_now(&self) -> LoadReport {
        let start = Instant::now();
        let mut builder = RuleSetBuilder::domains_only();
        let mut report =
            load_sources("fast", &mut builder, self.assets.as_ref(), self.cache.as_deref());

        if self.options.seed_with_hardcoded {
            for domain in HardcodedFilters::domains() {
                builder.add_domain(domain);
            }
        }

        if report.succeeded() {
            let rules = builder.finish();
            report.rules = rules.rule_count();
            info!(
                "[fast] Loaded {} domains from {} sources in {:?}",
                rules.domains().len(),
                report.sources_loaded,
                start.elapsed()
            );
            self.rules.store(Arc::new(rules));
        } else {
            warn!("[fast] No rule source could be loaded, keeping previous rules");
        }
        if report.sources_failed > 0 {
            warn!("[fast] {} rule sources failed to load", report.sources_failed);
        }

        self.gate.finish(&report);
        report
    }

    /// Check if a URL's host (or a parent of it) is blocked.
    ///
    /// `false` while uninitialized and for URLs without a host.
    #[inline]
    pub fn should_block(&self, url: &str) -> bool {
        self.blocked_domain(url).is_some()
    }

    /// The blocked domain that matched `url`, if any
    pub fn blocked_domain(&self, url: &str) -> Option<String> {
        if !self.gate.is_initialized() {
            return None;
        }
        let host = extract_domain(url)?;
        let rules = self.rules.load();
        let matched = rules.domains().find(&host)?.to_string();
        trace!("[fast] Blocked {} (matched {})", host, matched);
        Some(matched)
    }

    pub fn is_initialized(&self) -> bool {
        self.gate.is_initialized()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus::new(&self.gate, &self.rules.load())
    }
}
