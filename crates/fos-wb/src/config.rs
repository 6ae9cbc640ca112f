//! Application configuration
//!
//! One TOML file with an `[adblock]` and an `[updates]` table. Every field
//! is optional.

use anyhow::{Context, Result};
use fos_adblock::AdblockConfig;
use fos_network::UpdateConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub adblock: AdblockConfig,
    pub updates: UpdateConfig,
}

impl AppConfig {
    /// `<config dir>/fos-wb/adblock.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fos-wb").join("adblock.toml"))
    }

    /// Load `path`, or the default location if it exists.
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::read(&path)?,
                None => Self::default(),
            },
        };
        config.fill_cache_dir(dirs::cache_dir());
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    fn fill_cache_dir(&mut self, cache_root: Option<PathBuf>) {
        if self.updates.cache_dir.is_none() {
            self.updates.cache_dir = cache_root.map(|dir| dir.join("fos-wb").join("filters"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_tables() {
        let config: AppConfig = toml::from_str(
            r#"
            [adblock.limits]
            max_regex_patterns = 10

            [updates]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.adblock.limits.max_regex_patterns, 10);
        assert_eq!(config.adblock.limits.max_wildcard_patterns, 2_000);
        assert!(!config.updates.enabled);
    }

    #[test]
    fn test_cache_dir_filled_only_when_unset() {
        let mut config = AppConfig::default();
        config.fill_cache_dir(Some(PathBuf::from("/home/u/.cache")));
        assert_eq!(
            config.updates.cache_dir,
            Some(PathBuf::from("/home/u/.cache/fos-wb/filters"))
        );

        config.fill_cache_dir(Some(PathBuf::from("/elsewhere")));
        assert_eq!(
            config.updates.cache_dir,
            Some(PathBuf::from("/home/u/.cache/fos-wb/filters"))
        );
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("missing.toml"))).is_err());

        let path = dir.path().join("adblock.toml");
        std::fs::write(&path, "[advanced]\n").unwrap();
        // unknown top-level tables are ignored
        assert!(AppConfig::load(Some(&path)).is_ok());

        std::fs::write(&path, "[updates]\nenabled = \"yes\"\n").unwrap();
        assert!(AppConfig::load(Some(&path)).is_err());
    }
}
