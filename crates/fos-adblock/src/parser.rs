//! Filter List Parser (AdBlock Format)
//!
//! Turns one filter-list line into a typed [`Rule`].
//! Supports:
//! - Domain blocking: `||example.com^` (options after `$` are ignored)
//! - Hosts-file entries: `0.0.0.0 example.com`
//! - Regex rules: `/banner\d+/`
//! - Path substrings: `/ads/banner`, `example.com/track`
//! - Globs: `/ads/*.js`, `adframe`
//! - Comments: `!`, `#` or `[Adblock Plus ...]`
//!
//! Exception (`@@`) and cosmetic (`##`) rules are skipped.

use crate::rule::{Glob, RegexRule, Rule};
use tracing::debug;

/// Shortest pattern accepted for substring-style rules
const MIN_PATTERN_LEN: usize = 3;

/// Addresses that mark a hosts-file line as a block entry
const HOSTS_FILE_SINKS: &[&str] = &["0.0.0.0", "127.0.0.1", "::", "::1"];

/// Hostnames that appear in stock hosts files and must never be blocked
const HOSTS_FILE_RESERVED: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "0.0.0.0",
];

/// Structural URL characters never stored in a hostname
const HOSTNAME_FORBIDDEN: &[char] = &['/', ':', '?', '#', '@', '*', '^', '|', '$'];

/// Classified rule text, before any regex is compiled
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Domain(String),
    Path(String),
    Wildcard(String),
    Regex(String),
}

impl Token {
    /// Build the rule. A regex that fails to compile yields `None`.
    pub(crate) fn compile(self) -> Option<Rule> {
        match self {
            Self::Domain(host) => Some(Rule::Domain(host)),
            Self::Path(substring) => Some(Rule::Path(substring)),
            Self::Wildcard(pattern) => Some(Rule::Wildcard(Glob::new(&pattern))),
            Self::Regex(source) => match RegexRule::compile(&source) {
                Ok(regex) => Some(Rule::Regex(regex)),
                Err(e) => {
                    debug!("Skipping invalid regex rule /{}/: {}", source, e);
                    None
                }
            },
        }
    }
}

/// Outcome of classifying a single line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Line {
    /// Blank, comment, cosmetic or exception line
    Ignored,
    /// Carries syntax this engine does not implement
    Unsupported,
    Rule(Token),
}

/// Parse a single filter-list line.
///
/// Returns `None` for comments, blank lines, unsupported syntax and
/// regexes that fail to compile. Never panics.
pub fn parse_line(raw: &str) -> Option<Rule> {
    match classify(raw) {
        Line::Rule(token) => token.compile(),
        Line::Ignored | Line::Unsupported => None,
    }
}

/// Classify a line without compiling anything
pub(crate) fn classify(raw: &str) -> Line {
    let line = raw.trim();

    if line.is_empty() || line.starts_with('!') || line.starts_with('#') || line.starts_with('[') {
        return Line::Ignored;
    }

    // Cosmetic filters and exceptions are out of scope
    if line.contains("##")
        || line.contains("#@#")
        || line.contains("#?#")
        || line.starts_with("@@")
    {
        return Line::Ignored;
    }

    if let Some(host) = hosts_file_entry(line) {
        return host;
    }

    let pattern = strip_options(line);

    if let Some(rest) = pattern.strip_prefix("||") {
        return host_anchored(rest);
    }

    if is_regex_literal(pattern) {
        return Line::Rule(Token::Regex(pattern[1..pattern.len() - 1].to_string()));
    }

    let pattern = pattern.strip_prefix('|').unwrap_or(pattern);
    let pattern = pattern.trim_end_matches(['|', '^']);
    url_pattern(pattern)
}

/// `/.../` with something between the slashes
#[inline]
fn is_regex_literal(pattern: &str) -> bool {
    pattern.len() > 2 && pattern.starts_with('/') && pattern.ends_with('/')
}

/// Drop a trailing `$option,option` block
fn strip_options(line: &str) -> &str {
    if is_regex_literal(line) {
        return line;
    }
    match line.rfind('$') {
        Some(idx) if idx > 0 && looks_like_options(&line[idx + 1..]) => &line[..idx],
        _ => line,
    }
}

fn looks_like_options(options: &str) -> bool {
    !options.is_empty()
        && options
            .chars()
            .all(|c| {
                c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '~' | ',' | '=' | '|' | '.')
            })
}

/// `0.0.0.0 ads.example.com` style lines
fn hosts_file_entry(line: &str) -> Option<Line> {
    let mut fields = line.split_whitespace();
    let address = fields.next()?;
    if !HOSTS_FILE_SINKS.contains(&address) {
        return None;
    }
    let host = match fields.next() {
        Some(host) if !host.starts_with('#') => host.to_lowercase(),
        _ => return Some(Line::Ignored),
    };
    if HOSTS_FILE_RESERVED.contains(&host.as_str()) {
        return Some(Line::Ignored);
    }
    if is_hostname(&host) {
        Some(Line::Rule(Token::Domain(host)))
    } else {
        Some(Line::Unsupported)
    }
}

/// Body of a `||...` rule
fn host_anchored(rest: &str) -> Line {
    let body = rest.trim_end_matches(['^', '|']).to_lowercase();

    if body.contains('*') || body.contains('/') {
        // `||host/path` and `||ads*.com^` are URL patterns, never hostnames
        return url_pattern(&body);
    }

    let body = body.trim_matches('.');
    if is_hostname(body) {
        Line::Rule(Token::Domain(body.to_string()))
    } else {
        Line::Unsupported
    }
}

/// Path, wildcard or plain-substring rule
fn url_pattern(pattern: &str) -> Line {
    if pattern.contains(['^', '|'])
        || pattern.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Line::Unsupported;
    }

    let literal_len = pattern.chars().filter(|c| *c != '*').count();
    if literal_len < MIN_PATTERN_LEN {
        return Line::Unsupported;
    }

    let pattern = pattern.to_lowercase();
    if pattern.contains('*') {
        Line::Rule(Token::Wildcard(pattern))
    } else if pattern.contains('/') {
        Line::Rule(Token::Path(pattern))
    } else {
        Line::Rule(Token::Wildcard(pattern))
    }
}

/// Characters allowed in a stored hostname. Anything else (including
/// punycode's `xn--` prefix) is kept opaque; only structural URL
/// characters are refused.
fn is_hostname(host: &str) -> bool {
    !host.is_empty()
        && host.contains('.')
        && !host
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || HOSTNAME_FORBIDDEN.contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleKind;

    fn kind(line: &str) -> Option<RuleKind> {
        parse_line(line).map(|rule| rule.kind())
    }

    #[test]
    fn test_parse_domain_block() {
        let rule = parse_line("||Example.COM^").unwrap();
        assert_eq!(rule.kind(), RuleKind::Domain);
        assert_eq!(rule.pattern(), "example.com");
    }

    #[test]
    fn test_parse_domain_with_options() {
        let rule = parse_line("||ads.example.com^$third-party,script").unwrap();
        assert_eq!(rule.kind(), RuleKind::Domain);
        assert_eq!(rule.pattern(), "ads.example.com");
    }

    #[test]
    fn test_parse_domain_without_caret() {
        assert_eq!(parse_line("||tracker.io").unwrap().pattern(), "tracker.io");
        assert_eq!(parse_line("||tracker.io^|").unwrap().pattern(), "tracker.io");
    }

    #[test]
    fn test_host_anchored_path_is_not_a_domain() {
        let rule = parse_line("||example.com/ads/").unwrap();
        assert_eq!(rule.kind(), RuleKind::Path);
        assert_eq!(rule.pattern(), "example.com/ads/");

        let rule = parse_line("||ads*.example.com^").unwrap();
        assert_eq!(rule.kind(), RuleKind::Wildcard);
    }

    #[test]
    fn test_parse_hosts_file() {
        let rule = parse_line("0.0.0.0 Ads.Tracker.net").unwrap();
        assert_eq!(rule.kind(), RuleKind::Domain);
        assert_eq!(rule.pattern(), "ads.tracker.net");

        assert!(parse_line("127.0.0.1 localhost").is_none());
        assert!(parse_line("0.0.0.0").is_none());
    }

    #[test]
    fn test_parse_regex() {
        let rule = parse_line(r"/banner\d+\.gif/").unwrap();
        assert_eq!(rule.kind(), RuleKind::Regex);
        assert_eq!(rule.pattern(), r"banner\d+\.gif");

        // regex with options keeps its body intact
        let rule = parse_line(r"/track(er)?$/$script").unwrap();
        assert_eq!(rule.pattern(), "track(er)?$");
    }

    #[test]
    fn test_invalid_regex_is_skipped() {
        assert!(parse_line("/(unclosed/").is_none());
        assert_eq!(classify("/(unclosed/"), Line::Rule(Token::Regex("(unclosed".into())));
    }

    #[test]
    fn test_parse_path_rules() {
        assert_eq!(kind("/adserver/banner"), Some(RuleKind::Path));
        assert_eq!(kind("example.com/pixel"), Some(RuleKind::Path));
        assert_eq!(parse_line("/AdServer/Banner").unwrap().pattern(), "/adserver/banner");
    }

    #[test]
    fn test_parse_wildcards() {
        assert_eq!(kind("/ads/*.js"), Some(RuleKind::Wildcard));
        assert_eq!(kind("adframe"), Some(RuleKind::Wildcard));
        assert_eq!(kind("|https://ads.*"), Some(RuleKind::Wildcard));
        assert_eq!(parse_line("-ad-banner-").unwrap().pattern(), "-ad-banner-");
    }

    #[test]
    fn test_comments_and_blank_lines() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
        assert!(parse_line("! comment").is_none());
        assert!(parse_line("# comment").is_none());
        assert!(parse_line("[Adblock Plus 2.0]").is_none());
        assert_eq!(classify("! Title: test"), Line::Ignored);
    }

    #[test]
    fn test_cosmetic_and_exceptions_ignored() {
        assert_eq!(classify("example.com##.ad-banner"), Line::Ignored);
        assert_eq!(classify("example.com#@#.ad"), Line::Ignored);
        assert_eq!(classify("@@||allowed.com^"), Line::Ignored);
    }

    #[test]
    fn test_unsupported_markers() {
        assert_eq!(classify("ad^banner"), Line::Unsupported);
        assert_eq!(classify("||^"), Line::Unsupported);
        assert_eq!(classify("ab"), Line::Unsupported);
        assert_eq!(classify("***"), Line::Unsupported);
    }

    #[test]
    fn test_domain_rules_never_contain_slash() {
        for line in ["||a.com/x^", "||a.com^", "0.0.0.0 b.com", "||c.com/"] {
            if let Some(Rule::Domain(host)) = parse_line(line) {
                assert!(!host.contains('/'), "{} produced {}", line, host);
            }
        }
    }
}
