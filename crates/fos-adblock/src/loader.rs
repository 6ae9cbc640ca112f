//! Source loading shared by both engines
//!
//! Order: remote cache, then bundled assets. Every readable source is fed
//! into the same builder; an unreadable one is logged and counted, never
//! propagated.

use crate::assets::{AssetProvider, FilterCache};
use crate::rule_set::RuleSetBuilder;
use crate::status::LoadReport;
use std::fs;
use tracing::{debug, warn};

pub(crate) fn load_sources(
    engine: &str,
    builder: &mut RuleSetBuilder,
    assets: &dyn AssetProvider,
    cache: Option<&dyn FilterCache>,
) -> LoadReport {
    let mut report = LoadReport::default();

    if let Some(cache) = cache {
        for name in cache.cached_filter_names() {
            // A miss means the file was never fetched
            let Some(path) = cache.filter_file(&name) else {
                continue;
            };
            match fs::read_to_string(&path) {
                Ok(text) => {
                    let load = builder.add_text(&name, &text);
                    report.sources_loaded += 1;
                    report.rules += load.rules;
                }
                Err(e) => {
                    warn!("[{}] Cached filter {} unreadable: {}", engine, path.display(), e);
                    report.sources_failed += 1;
                }
            }
        }

        let domains = cache.remote_domains();
        if !domains.is_empty() {
            let added = domains.iter().filter(|host| builder.add_domain(host)).count();
            debug!("[{}] {} remote domains", engine, added);
            report.sources_loaded += 1;
            report.rules += added;
        }
    }

    for name in assets.names() {
        match assets.read(&name) {
            Ok(text) => {
                let load = builder.add_text(&name, &text);
                report.sources_loaded += 1;
                report.rules += load.rules;
            }
            Err(e) => {
                warn!("[{}] Filter asset {} unavailable: {}", engine, name, e);
                report.sources_failed += 1;
            }
        }
    }

    report
}


#[cfg(test)]
mod tests {
    use super::testing::{MemoryAssets, MemoryCache};
    use super::*;
    use crate::rule_set::LoadLimits;

    #[test]
    fn test_assets_only() {
        let assets =
            MemoryAssets::with(&[("a.txt", Some("||a.com^\n")), ("b.txt", Some("||b.com^\n"))]);
        let mut builder = RuleSetBuilder::new(LoadLimits::default());
        let report = load_sources("test", &mut builder, &assets, None);

        assert_eq!(report.sources_loaded, 2);
        assert_eq!(report.sources_failed, 0);
        assert_eq!(report.rules, 2);
    }

    #[test]
    fn test_failed_asset_is_counted() {
        let assets = MemoryAssets::with(&[("a.txt", Some("||a.com^\n")), ("gone.txt", None)]);
        let mut builder = RuleSetBuilder::new(LoadLimits::default());
        let report = load_sources("test", &mut builder, &assets, None);

        assert!(report.succeeded());
        assert!(report.failed());
        assert!(builder.finish().domains().contains("a.com"));
    }

    #[test]
    fn test_cache_before_assets() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("remote.txt");
        fs::write(&cached, "||remote.com^\n").unwrap();

        let mut cache = MemoryCache::default();
        cache.files.insert("remote".into(), cached);
        cache.files.insert("missing".into(), dir.path().join("missing.txt"));
        cache.domains.insert("json-domain.com".into());

        let assets = MemoryAssets::with(&[("a.txt", Some("||a.com^\n"))]);
        let mut builder = RuleSetBuilder::new(LoadLimits::default());
        let report = load_sources("test", &mut builder, &assets, Some(&cache));

        assert_eq!(report.sources_loaded, 3);
        assert_eq!(report.sources_failed, 1);

        let rules = builder.finish();
        for host in ["remote.com", "json-domain.com", "a.com"] {
            assert!(rules.domains().contains(host), "{} missing", host);
        }
    }
}
