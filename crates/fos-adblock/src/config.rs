//! Content blocking configuration
//!
//! ```toml
//! [assets]
//! dir = "/etc/fos-wb/filters"   # omit to use the bundled lists
//!
//! [limits]
//! max_wildcard_patterns = 2000
//! max_regex_patterns = 200
//!
//! [fast]
//! seed_with_hardcoded = true
//!
//! [advanced]
//! enabled = true
//! ```

use crate::advanced_engine::AdvancedEngineOptions;
use crate::assets::{AssetProvider, DirectoryAssets, EmbeddedAssets};
use crate::error::AdblockError;
use crate::fast_engine::FastEngineOptions;
use crate::rule_set::LoadLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where bundled rule lists come from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory of `*.txt` filter lists; the compiled-in lists when unset
    pub dir: Option<PathBuf>,
}

/// Content blocking settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdblockConfig {
    pub assets: AssetConfig,
    pub limits: LoadLimits,
    pub fast: FastEngineOptions,
    pub advanced: AdvancedEngineOptions,
}

impl AdblockConfig {
    /// Parse from TOML text; missing fields take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self, AdblockError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self, AdblockError> {
        let text = std::fs::read_to_string(path).map_err(|source| AdblockError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Asset provider described by `assets`
    pub fn asset_provider(&self) -> Arc<dyn AssetProvider> {
        match &self.assets.dir {
            Some(dir) => Arc::new(DirectoryAssets::new(dir)),
            None => Arc::new(EmbeddedAssets),
        }
    }
}
