//! Filter Rules
//!
//! A parsed filter-list line is one of four closed variants. The matcher
//! walks them in a fixed tier order, so the variant set is an enum rather
//! than a trait object.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::fmt;

/// Upper bound on the compiled size of a single regex rule
const REGEX_SIZE_LIMIT: usize = 256 * 1024;

/// Kind of a rule, in matching-tier order (cheapest first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RuleKind {
    /// Hostname match (exact or parent suffix)
    Domain,
    /// Substring of the full URL
    Path,
    /// Glob pattern against the full URL
    Wildcard,
    /// Regular expression against the full URL
    Regex,
}

impl RuleKind {
    /// All kinds in tier order
    pub const ALL: [RuleKind; 4] = [Self::Domain, Self::Path, Self::Wildcard, Self::Regex];

    /// Index into per-tier tables
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Domain => "domain",
            Self::Path => "path",
            Self::Wildcard => "wildcard",
            Self::Regex => "regex",
        };
        f.write_str(name)
    }
}

/// A single parsed filter rule
#[derive(Debug, Clone)]
pub enum Rule {
    /// `||hostname^` - lower-cased hostname, never contains `/`
    Domain(String),
    /// Lower-cased substring matched against the full URL
    Path(String),
    /// Glob pattern matched against the full URL
    Wildcard(Glob),
    /// Compiled regular expression matched against the full URL
    Regex(RegexRule),
}

impl Rule {
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Domain(_) => RuleKind::Domain,
            Self::Path(_) => RuleKind::Path,
            Self::Wildcard(_) => RuleKind::Wildcard,
            Self::Regex(_) => RuleKind::Regex,
        }
    }

    /// Pattern text of the rule (hostname, substring, glob or regex source)
    pub fn pattern(&self) -> &str {
        match self {
            Self::Domain(host) => host,
            Self::Path(substring) => substring,
            Self::Wildcard(glob) => glob.as_str(),
            Self::Regex(regex) => regex.as_str(),
        }
    }

    /// Check this rule against a lower-cased URL and its extracted host
    pub fn matches(&self, url: &str, host: Option<&str>) -> bool {
        match self {
            Self::Domain(domain) => host.is_some_and(|h| crate::url::is_subdomain_of(h, domain)),
            Self::Path(substring) => url.contains(substring.as_str()),
            Self::Wildcard(glob) => glob.is_match(url),
            Self::Regex(regex) => regex.is_match(url),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rule '{}'", self.kind(), self.pattern())
    }
}

/// Glob pattern where `*` matches any run of characters, `/` included.
///
/// Matching is unanchored: the glob matches when it matches any substring
/// of the input. A glob without `*` is therefore a plain substring search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glob {
    source: String,
    segments: Vec<String>,
}

impl Glob {
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .split('*')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            source: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Literal parts between the `*`s
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Match against `text`.
    ///
    /// Unanchored on both ends, so taking the leftmost occurrence of each
    /// segment in turn is exact. Runs in O(segments * text) with no
    /// backtracking or recursion.
    pub fn is_match(&self, text: &str) -> bool {
        let mut rest = text;
        for segment in &self.segments {
            match rest.find(segment.as_str()) {
                Some(idx) => rest = &rest[idx + segment.len()..],
                None => return false,
            }
        }
        true
    }
}

/// Compiled regex rule together with its source text
#[derive(Debug, Clone)]
pub struct RegexRule {
    regex: Regex,
    source: String,
}

impl RegexRule {
    /// Compile `source` case-insensitively with a bounded program size
    pub fn compile(source: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(true)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()?;

        Ok(Self {
            regex,
            source: source.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_without_star_is_substring() {
        let glob = Glob::new("adframe");
        assert!(glob.is_match("https://example.com/adframe.html"));
        assert!(!glob.is_match("https://example.com/frame.html"));
    }

    #[test]
    fn test_glob_star_crosses_path_segments() {
        let glob = Glob::new("/ads/*.js");
        assert!(glob.is_match("https://x.com/ads/banner.js"));
        assert!(glob.is_match("https://x.com/ads/a/b/c.js"));
        assert!(!glob.is_match("https://x.com/ads/banner.css"));
    }

    #[test]
    fn test_glob_segments_in_order() {
        let glob = Glob::new("banner*track");
        assert!(glob.is_match("https://cdn.com/banner/v2/track?x=1"));
        assert!(!glob.is_match("https://cdn.com/track/banner"));
    }

    #[test]
    fn test_glob_leading_and_trailing_stars() {
        let glob = Glob::new("*pixel*");
        assert_eq!(glob.segments(), &["pixel".to_string()]);
        assert!(glob.is_match("https://t.com/pixel.gif"));
    }

    #[test]
    fn test_regex_rule_case_insensitive() {
        let rule = RegexRule::compile(r"banner\d+").unwrap();
        assert!(rule.is_match("https://x.com/BANNER42.png"));
        assert!(!rule.is_match("https://x.com/banner.png"));
        assert_eq!(rule.as_str(), r"banner\d+");
    }

    #[test]
    fn test_regex_rule_invalid() {
        assert!(RegexRule::compile("(unclosed").is_err());
    }

    #[test]
    fn test_domain_rule_matches_subdomains() {
        let rule = Rule::Domain("adserver.com".to_string());
        assert!(rule.matches("https://cdn.adserver.com/x.js", Some("cdn.adserver.com")));
        assert!(!rule.matches("https://notadserver.com/x.js", Some("notadserver.com")));
        assert!(!rule.matches("adserver.com", None));
    }

    #[test]
    fn test_rule_kind_order() {
        assert!(RuleKind::Domain < RuleKind::Path);
        assert!(RuleKind::Wildcard < RuleKind::Regex);
        assert_eq!(RuleKind::Regex.index(), 3);
    }
}
