//! Filter Update Configuration

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default time between refreshes of one source (7 days)
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// One remote filter list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSource {
    /// Short identifier, also the cached file name stem
    pub name: String,
    pub url: String,
}

impl RemoteSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Filter update settings (the `[updates]` table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub enabled: bool,
    pub sources: Vec<RemoteSource>,
    /// Where rule files and `filter_state.json` live
    pub cache_dir: Option<PathBuf>,
    pub refresh_interval_secs: u64,
    /// How often the refresh job wakes up to look for due sources
    pub check_interval_secs: u64,
    /// Bound on one fetch, connect to last byte
    pub fetch_timeout_secs: u64,
    pub max_payload_bytes: usize,
    /// First retry delay after a failed refresh
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sources: vec![
                RemoteSource::new("easylist", "https://easylist.to/easylist/easylist.txt"),
                RemoteSource::new("easyprivacy", "https://easylist.to/easylist/easyprivacy.txt"),
            ],
            cache_dir: None,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            check_interval_secs: 60 * 60,
            fetch_timeout_secs: 15,
            max_payload_bytes: 16 * 1024 * 1024, // 16 MB
            initial_backoff_secs: 60,
            max_backoff_secs: 6 * 60 * 60,
        }
    }
}

impl UpdateConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_dir.is_none() {
            return Err(ConfigError::MissingCacheDir);
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("refresh_interval_secs"));
        }
        if self.check_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("check_interval_secs"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::ZeroInterval("fetch_timeout_secs"));
        }
        if self.initial_backoff_secs == 0 || self.max_backoff_secs < self.initial_backoff_secs {
            return Err(ConfigError::InvalidBackoff);
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if !is_source_name(&source.name) {
                return Err(ConfigError::InvalidSourceName(source.name.clone()));
            }
            if !names.insert(source.name.as_str()) {
                return Err(ConfigError::DuplicateSource(source.name.clone()));
            }
            let url = Url::parse(&source.url).map_err(|e| ConfigError::InvalidUrl {
                name: source.name.clone(),
                reason: e.to_string(),
            })?;
            if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                return Err(ConfigError::InvalidUrl {
                    name: source.name.clone(),
                    reason: format!("unsupported URL {}", url),
                });
            }
        }
        Ok(())
    }
}

/// Names double as file names: ASCII alphanumerics, `-` and `_` only
fn is_source_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("No cache directory configured")]
    MissingCacheDir,

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("Backoff must be non-zero and not exceed max_backoff_secs")]
    InvalidBackoff,

    #[error("Invalid source name '{0}' (use letters, digits, '-' and '_')")]
    InvalidSourceName(String),

    #[error("Duplicate source '{0}'")]
    DuplicateSource(String),

    #[error("Invalid URL for source '{name}': {reason}")]
    InvalidUrl { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_cache() -> UpdateConfig {
        UpdateConfig {
            cache_dir: Some(PathBuf::from("/tmp/fos-filters")),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_default() {
        let config = UpdateConfig::default();
        assert!(config.enabled);
        assert_eq!(config.refresh_interval(), Duration::from_secs(604_800));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(15));
        assert_eq!(config.validate(), Err(ConfigError::MissingCacheDir));
        assert!(with_cache().validate().is_ok());
    }

    #[test]
    fn test_invalid_sources() {
        let mut config = with_cache();
        config.sources.push(RemoteSource::new("easylist", "https://example.com/list.txt"));
        assert_eq!(config.validate(), Err(ConfigError::DuplicateSource("easylist".into())));

        let mut config = with_cache();
        config.sources = vec![RemoteSource::new("../escape", "https://example.com/")];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSourceName(_))));

        let mut config = with_cache();
        config.sources = vec![RemoteSource::new("list", "not a url")];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));

        config.sources = vec![RemoteSource::new("list", "file:///etc/hosts")];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_invalid_intervals() {
        let mut config = with_cache();
        config.refresh_interval_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval("refresh_interval_secs")));

        let mut config = with_cache();
        config.max_backoff_secs = 1;
        assert_eq!(config.validate(), Err(ConfigError::InvalidBackoff));
    }

    #[test]
    fn test_from_toml() {
        let config: UpdateConfig = toml::from_str(
            r#"
            cache_dir = "/var/cache/fos"
            refresh_interval_secs = 3600

            [[sources]]
            name = "custom"
            url = "https://filters.example.com/custom.txt"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.sources,
            vec![RemoteSource::new("custom", "https://filters.example.com/custom.txt")]
        );
        assert_eq!(config.refresh_interval_secs, 3600);
        assert_eq!(config.fetch_timeout_secs, 15);
        assert!(config.validate().is_ok());
    }
}
