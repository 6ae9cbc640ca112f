//! Blocked Hostname Set
//!
//! Exact hostname set with a Bloom filter in front of it. Lookups walk the
//! request host and its parent domains, so a blocked `doubleclick.net`
//! also blocks `ad.doubleclick.net`.
//!
//! Key properties:
//! - Bloom false positives are confirmed against the exact set
//! - False negatives are impossible
//! - Immutable once built, so readers share it without locking

use crate::url::parent_domains;
use bloomfilter::Bloom;
use std::collections::HashSet;
use std::fmt;

/// False positive rate for the prefilter (1%)
const BLOOM_FALSE_POSITIVE_RATE: f64 = 0.01;

/// Hostname set with parent-suffix lookup
pub struct DomainSet {
    /// Fast-reject prefilter over every stored hostname
    bloom: Bloom<[u8]>,
    /// Exact hostnames (lower-cased)
    exact: HashSet<Box<str>>,
}

impl DomainSet {
    /// Build from lower-cased hostnames
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Box<str>>,
    {
        let exact: HashSet<Box<str>> = domains.into_iter().map(Into::into).collect();

        // Bloom sizing panics on zero items
        let mut bloom = Bloom::new_for_fp_rate(exact.len().max(1), BLOOM_FALSE_POSITIVE_RATE);
        for domain in &exact {
            bloom.set(domain.as_bytes());
        }

        Self { bloom, exact }
    }

    /// Empty set
    pub fn empty() -> Self {
        Self::new(std::iter::empty::<String>())
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    /// Exact membership (no suffix walk)
    pub fn contains(&self, domain: &str) -> bool {
        self.exact.contains(domain)
    }

    /// Find the stored domain that `host` equals or is a subdomain of.
    ///
    /// `host` must already be lower-cased. Returns the matching suffix of
    /// `host`, longest first.
    #[inline]
    pub fn find<'h>(&self, host: &'h str) -> Option<&'h str> {
        if self.exact.is_empty() {
            return None;
        }
        parent_domains(host).find(|candidate| {
            self.bloom.check(candidate.as_bytes()) && self.exact.contains(*candidate)
        })
    }

    /// Whether `host` or any of its parents is blocked
    #[inline]
    pub fn matches(&self, host: &str) -> bool {
        self.find(host).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.exact.iter().map(|domain| domain.as_ref())
    }

    /// Approximate heap usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.bloom.bitmap().len() / 8 + self.exact.iter().map(|d| d.len() + 16).sum::<usize>()
    }
}

impl Default for DomainSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for DomainSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainSet")
            .field("len", &self.exact.len())
            .finish()
    }
}
