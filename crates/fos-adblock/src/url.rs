//! Hostname Extraction
//!
//! The one place hostname semantics live. The fast engine, the advanced
//! engine and the hardcoded fallback all go through [`extract_domain`] so
//! that a URL can never be "blocked by one engine but unparseable to the
//! other".

/// Extract the lower-cased hostname from a URL.
///
/// Accepts `scheme://host/...`, scheme-relative `//host/...` and bare
/// `host/...` input. The host ends at the first `/`, `?` or `#`; userinfo
/// and a trailing `:port` are removed. Returns `None` for empty input or
/// input without a host component (`"https://"`).
pub fn extract_domain(url: &str) -> Option<String> {
    host_of(url).map(str::to_lowercase)
}

/// Borrowing form of [`extract_domain`] that leaves case untouched.
///
/// Callers that have already lower-cased the URL use this to avoid a
/// second allocation on the request path.
pub fn host_of(url: &str) -> Option<&str> {
    let authority = authority(url)?;
    host_from_authority(authority)
}

/// Check whether `host` is `domain` or one of its subdomains.
///
/// Matches on label boundaries only: `ad.doubleclick.net` is a subdomain
/// of `doubleclick.net`, `notdoubleclick.net` is not.
#[inline]
pub fn is_subdomain_of(host: &str, domain: &str) -> bool {
    if host.len() == domain.len() {
        return host == domain;
    }
    host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

/// Iterate over `host` and every parent domain of it, longest first.
///
/// `a.b.example.com` yields `a.b.example.com`, `b.example.com`,
/// `example.com`, `com`.
pub fn parent_domains(host: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(host);
    std::iter::from_fn(move || {
        let current = next?;
        next = current.split_once('.').map(|(_, rest)| rest).filter(|rest| !rest.is_empty());
        Some(current)
    })
}

/// Slice out the authority (`userinfo@host:port`) of a URL.
fn authority(url: &str) -> Option<&str> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    // A `://` after the first delimiter belongs to the path or query
    let head = url.find(['/', '?', '#']).unwrap_or(url.len());
    let rest = if let Some(rest) = url.strip_prefix("//") {
        rest
    } else if let Some(sep) = url.find("://").filter(|sep| *sep <= head) {
        if !is_scheme(&url[..sep]) {
            return None;
        }
        &url[sep + 3..]
    } else {
        url
    };

    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    if authority.is_empty() {
        None
    } else {
        Some(authority)
    }
}

/// Strip userinfo and port from an authority, validating what is left.
fn host_from_authority(authority: &str) -> Option<&str> {
    let host_port = match authority.rsplit_once('@') {
        Some((_, host_port)) => host_port,
        None => authority,
    };

    let host = if host_port.starts_with('[') {
        // IPv6 literal: keep the brackets, drop anything after them
        let close = host_port.find(']')?;
        let (host, port) = host_port.split_at(close + 1);
        if !port.is_empty() && !is_port(port.strip_prefix(':')?) {
            return None;
        }
        host
    } else {
        match host_port.rsplit_once(':') {
            Some((host, port)) if is_port(port) => host,
            Some(_) => return None,
            None => host_port,
        }
    };

    // FQDN form `example.com.` matches the same rules as `example.com`
    let host = host.strip_suffix('.').unwrap_or(host);

    if host.is_empty() || host.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return None;
    }
    Some(host)
}

#[inline]
fn is_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[inline]
fn is_port(port: &str) -> bool {
    port.is_empty() || port.bytes().all(|b| b.is_ascii_digit())
}
