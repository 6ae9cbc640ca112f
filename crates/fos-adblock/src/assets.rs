//! Rule Sources
//!
//! Where engines get filter-list text from: lists compiled into the
//! binary, a directory of lists on disk, and the remote cache kept by the
//! update manager.

use crate::error::AdblockError;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Bundled filter lists, in load order
const EMBEDDED_FILTERS: &[(&str, &str)] = &[
    ("ads.txt", include_str!("../assets/filters/ads.txt")),
    ("trackers.txt", include_str!("../assets/filters/trackers.txt")),
];

/// Named filter-list text
pub trait AssetProvider: Send + Sync {
    /// Asset names in load order
    fn names(&self) -> Vec<String>;

    /// Full text of one asset
    fn read(&self, name: &str) -> Result<String, AdblockError>;
}

/// Filter lists compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedAssets;

impl AssetProvider for EmbeddedAssets {
    fn names(&self) -> Vec<String> {
        EMBEDDED_FILTERS.iter().map(|(name, _)| name.to_string()).collect()
    }

    fn read(&self, name: &str) -> Result<String, AdblockError> {
        EMBEDDED_FILTERS
            .iter()
            .find(|(embedded, _)| *embedded == name)
            .map(|(_, text)| text.to_string())
            .ok_or_else(|| AdblockError::AssetNotFound(name.to_string()))
    }
}

/// Every `*.txt` file in one directory, sorted by file name
#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    dir: PathBuf,
}

impl DirectoryAssets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl AssetProvider for DirectoryAssets {
    fn names(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list filter directory {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(".txt"))
            .collect();
        names.sort();
        debug!("Found {} filter lists in {}", names.len(), self.dir.display());
        names
    }

    fn read(&self, name: &str) -> Result<String, AdblockError> {
        // Names are plain file names, never paths
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Err(AdblockError::AssetNotFound(name.to_string()));
        }

        let path = self.dir.join(name);
        fs::read_to_string(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => AdblockError::AssetNotFound(name.to_string()),
            _ => AdblockError::SourceUnavailable { path, source },
        })
    }
}

/// Read-only view of remotely fetched rules.
///
/// A miss (`None` or an empty set) means "nothing cached yet" and is never
/// an error; engines fall back to their bundled assets.
pub trait FilterCache: Send + Sync {
    /// Names of sources that have a rule file on disk
    fn cached_filter_names(&self) -> Vec<String>;

    /// Path of the cached rule file for `name`
    fn filter_file(&self, name: &str) -> Option<PathBuf>;

    /// Hostnames delivered outside of rule files (JSON `domains` payloads)
    fn remote_domains(&self) -> HashSet<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;

    #[test]
    fn test_embedded_assets_parse() {
        let assets = EmbeddedAssets;
        let names = assets.names();
        assert_eq!(names, vec!["ads.txt", "trackers.txt"]);

        for name in &names {
            let text = assets.read(name).unwrap();
            let rules = text.lines().filter_map(parse_line).count();
            assert!(rules > 20, "{} has only {} rules", name, rules);
        }
    }

    #[test]
    fn test_embedded_missing_asset() {
        assert!(matches!(
            EmbeddedAssets.read("missing.txt"),
            Err(AdblockError::AssetNotFound(_))
        ));
    }

    #[test]
    fn test_directory_assets_sorted_txt_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "||b.com^\n").unwrap();
        fs::write(dir.path().join("a.txt"), "||a.com^\n").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        fs::create_dir(dir.path().join("sub.txt")).unwrap();

        let assets = DirectoryAssets::new(dir.path());
        assert_eq!(assets.names(), vec!["a.txt", "b.txt"]);
        assert_eq!(assets.read("a.txt").unwrap(), "||a.com^\n");
    }

    #[test]
    fn test_directory_assets_errors() {
        let dir = tempfile::tempdir().unwrap();
        let assets = DirectoryAssets::new(dir.path());

        assert!(matches!(assets.read("none.txt"), Err(AdblockError::AssetNotFound(_))));
        assert!(matches!(assets.read("../etc/passwd"), Err(AdblockError::AssetNotFound(_))));

        let gone = DirectoryAssets::new(dir.path().join("does-not-exist"));
        assert!(gone.names().is_empty());
    }
}
