//! Rule Buckets
//!
//! A [`RuleSet`] is the immutable aggregate one engine matches against:
//! hostnames, path substrings, globs and regexes, each in its own bucket.
//! It is only ever produced by [`RuleSetBuilder`], which enforces the
//! per-bucket [`LoadLimits`] and counts what it had to drop.

use crate::domain_set::DomainSet;
use crate::parser::{classify, Line, Token};
use crate::rule::{Glob, RegexRule, Rule, RuleKind};
use aho_corasick::AhoCorasick;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

/// Default cap on glob rules
pub const DEFAULT_MAX_WILDCARD_PATTERNS: usize = 2_000;

/// Default cap on regex rules
pub const DEFAULT_MAX_REGEX_PATTERNS: usize = 200;

/// Per-bucket caps enforced while loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadLimits {
    /// Maximum number of wildcard rules kept
    pub max_wildcard_patterns: usize,
    /// Maximum number of regex rules kept
    pub max_regex_patterns: usize,
}

impl Default for LoadLimits {
    fn default() -> Self {
        Self {
            max_wildcard_patterns: DEFAULT_MAX_WILDCARD_PATTERNS,
            max_regex_patterns: DEFAULT_MAX_REGEX_PATTERNS,
        }
    }
}

/// Loaded/limit/dropped counts for one capped bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketStats {
    pub loaded: usize,
    pub limit: usize,
    pub dropped: usize,
}

impl BucketStats {
    /// `dropped / (loaded + dropped) * 100`, or 0 for an untouched bucket
    pub fn truncation_percentage(&self) -> f64 {
        truncation_percentage(self.loaded, self.dropped)
    }

    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }
}

/// Snapshot of what a load kept and what it had to discard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleStats {
    pub domains_loaded: usize,
    pub paths_loaded: usize,
    pub wildcard: BucketStats,
    pub regex: BucketStats,
    /// Rules that failed to compile (bad regex)
    pub invalid_rules: usize,
    /// Lines with syntax this engine does not implement
    pub unsupported_rules: usize,
}

impl RuleStats {
    pub fn wildcard_patterns_loaded(&self) -> usize {
        self.wildcard.loaded
    }

    pub fn wildcard_patterns_dropped(&self) -> usize {
        self.wildcard.dropped
    }

    pub fn regex_patterns_loaded(&self) -> usize {
        self.regex.loaded
    }

    pub fn regex_patterns_dropped(&self) -> usize {
        self.regex.dropped
    }

    /// Truncation across both capped buckets
    pub fn truncation_percentage(&self) -> f64 {
        truncation_percentage(
            self.wildcard.loaded + self.regex.loaded,
            self.wildcard.dropped + self.regex.dropped,
        )
    }

    pub fn is_truncated(&self) -> bool {
        self.wildcard.is_truncated() || self.regex.is_truncated()
    }
}

impl fmt::Display for RuleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} domains, {} paths, wildcards {}/{} ({} dropped, {:.1}%), \
             regexes {}/{} ({} dropped, {:.1}%)",
            self.domains_loaded,
            self.paths_loaded,
            self.wildcard.loaded,
            self.wildcard.limit,
            self.wildcard.dropped,
            self.wildcard.truncation_percentage(),
            self.regex.loaded,
            self.regex.limit,
            self.regex.dropped,
            self.regex.truncation_percentage(),
        )
    }
}

/// Shared truncation arithmetic
pub fn truncation_percentage(loaded: usize, dropped: usize) -> f64 {
    let total = loaded + dropped;
    if total == 0 {
        0.0
    } else {
        dropped as f64 / total as f64 * 100.0
    }
}

/// Path substrings behind one Aho-Corasick automaton
pub struct PathSet {
    patterns: Vec<String>,
    /// `None` when the set is empty or the automaton could not be built
    automaton: Option<AhoCorasick>,
}

impl PathSet {
    fn new(patterns: Vec<String>) -> Self {
        let automaton = if patterns.is_empty() {
            None
        } else {
            match AhoCorasick::new(&patterns) {
                Ok(automaton) => Some(automaton),
                Err(e) => {
                    warn!("Path automaton build failed, using linear scan: {}", e);
                    None
                }
            }
        };
        Self { patterns, automaton }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// First path substring contained in the lower-cased `url`
    pub fn find(&self, url: &str) -> Option<&str> {
        match &self.automaton {
            Some(automaton) => automaton
                .find(url)
                .map(|m| self.patterns[m.pattern().as_usize()].as_str()),
            None => self
                .patterns
                .iter()
                .find(|pattern| url.contains(pattern.as_str()))
                .map(String::as_str),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }
}

impl fmt::Debug for PathSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathSet")
            .field("len", &self.patterns.len())
            .field("automaton", &self.automaton.is_some())
            .finish()
    }
}

/// Immutable rule buckets owned by one engine
#[derive(Debug)]
pub struct RuleSet {
    domains: DomainSet,
    paths: PathSet,
    wildcards: Vec<Glob>,
    regexes: Vec<RegexRule>,
    limits: LoadLimits,
    wildcard_dropped: usize,
    regex_dropped: usize,
    invalid_rules: usize,
    unsupported_rules: usize,
}

impl RuleSet {
    /// Empty rule set, matches nothing
    pub fn empty() -> Self {
        RuleSetBuilder::new(LoadLimits::default()).finish()
    }

    pub fn domains(&self) -> &DomainSet {
        &self.domains
    }

    pub fn paths(&self) -> &PathSet {
        &self.paths
    }

    pub fn wildcards(&self) -> &[Glob] {
        &self.wildcards
    }

    pub fn regexes(&self) -> &[RegexRule] {
        &self.regexes
    }

    /// Recompute the stats from the bucket contents
    pub fn stats(&self) -> RuleStats {
        RuleStats {
            domains_loaded: self.domains.len(),
            paths_loaded: self.paths.len(),
            wildcard: BucketStats {
                loaded: self.wildcards.len(),
                limit: self.limits.max_wildcard_patterns,
                dropped: self.wildcard_dropped,
            },
            regex: BucketStats {
                loaded: self.regexes.len(),
                limit: self.limits.max_regex_patterns,
                dropped: self.regex_dropped,
            },
            invalid_rules: self.invalid_rules,
            unsupported_rules: self.unsupported_rules,
        }
    }

    /// Total number of stored rules across buckets
    pub fn rule_count(&self) -> usize {
        self.domains.len() + self.paths.len() + self.wildcards.len() + self.regexes.len()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::empty()
    }
}

/// Per-source result of [`RuleSetBuilder::add_text`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceLoad {
    /// Lines read
    pub lines: usize,
    /// Rules accepted into a bucket
    pub rules: usize,
}

/// Accumulates rules from any number of sources into a fresh [`RuleSet`]
pub struct RuleSetBuilder {
    limits: LoadLimits,
    domains_only: bool,
    domains: HashSet<String>,
    paths: Vec<String>,
    seen_paths: HashSet<String>,
    wildcards: Vec<Glob>,
    seen_wildcards: HashSet<String>,
    regexes: Vec<RegexRule>,
    seen_regexes: HashSet<String>,
    wildcard_dropped: usize,
    regex_dropped: usize,
    invalid_rules: usize,
    unsupported_rules: usize,
}

impl RuleSetBuilder {
    /// Builder populating all four buckets
    pub fn new(limits: LoadLimits) -> Self {
        Self {
            limits,
            domains_only: false,
            domains: HashSet::new(),
            paths: Vec::new(),
            seen_paths: HashSet::new(),
            wildcards: Vec::new(),
            seen_wildcards: HashSet::new(),
            regexes: Vec::new(),
            seen_regexes: HashSet::new(),
            wildcard_dropped: 0,
            regex_dropped: 0,
            invalid_rules: 0,
            unsupported_rules: 0,
        }
    }

    /// Builder that keeps hostname rules only and ignores every other kind
    pub fn domains_only() -> Self {
        Self {
            domains_only: true,
            ..Self::new(LoadLimits::default())
        }
    }

    /// Parse every line of `text`
    pub fn add_text(&mut self, source: &str, text: &str) -> SourceLoad {
        let mut load = SourceLoad::default();
        for line in text.lines() {
            load.lines += 1;
            if self.add_line(line) {
                load.rules += 1;
            }
        }
        debug!("Source '{}': {} lines, {} rules", source, load.lines, load.rules);
        load
    }

    /// Parse one line. Returns whether a rule was stored.
    pub fn add_line(&mut self, line: &str) -> bool {
        match classify(line) {
            Line::Ignored => false,
            Line::Unsupported => {
                self.unsupported_rules += 1;
                false
            }
            Line::Rule(token) => self.add_token(token),
        }
    }

    /// Store an already-parsed rule, subject to the same limits
    pub fn add_rule(&mut self, rule: Rule) -> bool {
        match rule {
            Rule::Domain(host) => self.add_domain(&host),
            Rule::Path(substring) => !self.domains_only && self.push_path(substring),
            Rule::Wildcard(glob) => {
                if self.domains_only || self.seen_wildcards.contains(glob.as_str()) {
                    return false;
                }
                if self.wildcards.len() >= self.limits.max_wildcard_patterns {
                    self.wildcard_dropped += 1;
                    return false;
                }
                self.seen_wildcards.insert(glob.as_str().to_string());
                self.wildcards.push(glob);
                true
            }
            Rule::Regex(regex) => {
                if self.domains_only || self.seen_regexes.contains(regex.as_str()) {
                    return false;
                }
                if self.regexes.len() >= self.limits.max_regex_patterns {
                    self.regex_dropped += 1;
                    return false;
                }
                self.seen_regexes.insert(regex.as_str().to_string());
                self.regexes.push(regex);
                true
            }
        }
    }

    /// Add a hostname (lower-cased here)
    pub fn add_domain(&mut self, host: &str) -> bool {
        let host = host.trim().to_lowercase();
        if host.is_empty() || host.contains('/') {
            return false;
        }
        self.domains.insert(host)
    }

    fn add_token(&mut self, token: Token) -> bool {
        match token {
            Token::Domain(host) => self.add_domain(&host),
            Token::Path(substring) => !self.domains_only && self.push_path(substring),
            Token::Wildcard(pattern) => {
                if self.domains_only {
                    return false;
                }
                self.add_rule(Rule::Wildcard(Glob::new(&pattern)))
            }
            Token::Regex(source) => {
                if self.domains_only || self.seen_regexes.contains(&source) {
                    return false;
                }
                // Check capacity before paying for compilation
                if self.regexes.len() >= self.limits.max_regex_patterns {
                    self.regex_dropped += 1;
                    return false;
                }
                match Token::Regex(source).compile() {
                    Some(rule) => self.add_rule(rule),
                    None => {
                        self.invalid_rules += 1;
                        false
                    }
                }
            }
        }
    }

    fn push_path(&mut self, substring: String) -> bool {
        if !self.seen_paths.insert(substring.clone()) {
            return false;
        }
        self.paths.push(substring);
        true
    }

    /// Number of rules of `kind` accepted so far
    pub fn count(&self, kind: RuleKind) -> usize {
        match kind {
            RuleKind::Domain => self.domains.len(),
            RuleKind::Path => self.paths.len(),
            RuleKind::Wildcard => self.wildcards.len(),
            RuleKind::Regex => self.regexes.len(),
        }
    }

    /// Freeze into an immutable rule set
    pub fn finish(self) -> RuleSet {
        RuleSet {
            domains: DomainSet::new(self.domains),
            paths: PathSet::new(self.paths),
            wildcards: self.wildcards,
            regexes: self.regexes,
            limits: self.limits,
            wildcard_dropped: self.wildcard_dropped,
            regex_dropped: self.regex_dropped,
            invalid_rules: self.invalid_rules,
            unsupported_rules: self.unsupported_rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(wildcards: usize, regexes: usize) -> LoadLimits {
        LoadLimits {
            max_wildcard_patterns: wildcards,
            max_regex_patterns: regexes,
        }
    }

    #[test]
    fn test_wildcard_limit_drops_excess() {
        let mut builder = RuleSetBuilder::new(limits(2, 10));
        builder.add_text("test", "/ads/*.js\n/track/*.gif\n/pixel/*.png\n");
        let stats = builder.finish().stats();

        assert_eq!(stats.wildcard_patterns_loaded(), 2);
        assert_eq!(stats.wildcard_patterns_dropped(), 1);
        assert_eq!(stats.wildcard.limit, 2);
    }

    #[test]
    fn test_regex_limit_drops_excess() {
        let mut builder = RuleSetBuilder::new(limits(10, 1));
        builder.add_text("test", "/ad[0-9]+/\n/banner[0-9]+/\n/(bad/\n");
        let stats = builder.finish().stats();

        assert_eq!(stats.regex_patterns_loaded(), 1);
        assert_eq!(stats.regex_patterns_dropped(), 2);
        assert_eq!(stats.invalid_rules, 0);
    }

    #[test]
    fn test_invalid_regex_does_not_consume_capacity() {
        let mut builder = RuleSetBuilder::new(limits(10, 1));
        builder.add_text("test", "/(bad/\n/good[0-9]/\n");
        let stats = builder.finish().stats();

        assert_eq!(stats.regex_patterns_loaded(), 1);
        assert_eq!(stats.invalid_rules, 1);
        assert_eq!(stats.regex_patterns_dropped(), 0);
    }

    #[test]
    fn test_domain_and_path_unbounded() {
        let mut builder = RuleSetBuilder::new(limits(0, 0));
        let text: String = (0..500)
            .map(|i| format!("||host{}.com^\n/path{}/x\n", i, i))
            .collect();
        builder.add_text("bulk", &text);
        let set = builder.finish();

        assert_eq!(set.domains().len(), 500);
        assert_eq!(set.paths().len(), 500);
    }

    #[test]
    fn test_bucket_separation() {
        let mut builder = RuleSetBuilder::new(LoadLimits::default());
        builder.add_text("mixed", "||ads.com^\n||cdn.com/ads/\n/banner/x\n");
        let set = builder.finish();

        assert!(set.domains().contains("ads.com"));
        assert!(!set.domains().iter().any(|d| d.contains('/')));
        assert_eq!(set.paths().iter().collect::<Vec<_>>(), vec!["cdn.com/ads/", "/banner/x"]);
    }

    #[test]
    fn test_domains_only_mode() {
        let mut builder = RuleSetBuilder::domains_only();
        let load = builder.add_text("fast", "||ads.com^\n/banner/x\n/ads/*.js\n/re[0-9]/\n");
        let set = builder.finish();

        assert_eq!(load.rules, 1);
        assert_eq!(set.rule_count(), 1);
        assert_eq!(set.stats().regex_patterns_dropped(), 0);
    }

    #[test]
    fn test_duplicates_ignored() {
        let mut builder = RuleSetBuilder::new(limits(1, 1));
        builder.add_text(
            "dups",
            "/ads/*.js\n/ads/*.js\n/re[0-9]/\n/re[0-9]/\n||a.com^\n||a.com^\n",
        );
        let stats = builder.finish().stats();

        assert_eq!(stats.wildcard_patterns_loaded(), 1);
        assert_eq!(stats.wildcard_patterns_dropped(), 0);
        assert_eq!(stats.regex_patterns_dropped(), 0);
        assert_eq!(stats.domains_loaded, 1);
    }

    #[test]
    fn test_truncation_percentage() {
        assert_eq!(truncation_percentage(0, 0), 0.0);
        assert_eq!(truncation_percentage(3, 1), 25.0);
        assert_eq!(truncation_percentage(0, 5), 100.0);

        let stats = RuleStats {
            wildcard: BucketStats { loaded: 2, limit: 2, dropped: 1 },
            regex: BucketStats { loaded: 1, limit: 1, dropped: 0 },
            ..Default::default()
        };
        assert_eq!(stats.truncation_percentage(), 25.0);
        assert!(stats.is_truncated());
        assert!(stats.to_string().contains("33.3%"));
    }

    #[test]
    fn test_path_set_lookup() {
        let set = PathSet::new(vec!["/ads/".into(), "tracker.js".into()]);
        assert_eq!(set.find("https://x.com/ads/banner.png"), Some("/ads/"));
        assert_eq!(set.find("https://x.com/lib/tracker.js"), Some("tracker.js"));
        assert_eq!(set.find("https://x.com/index.html"), None);
        assert_eq!(PathSet::new(Vec::new()).find("https://x.com/ads/"), None);
    }
}
