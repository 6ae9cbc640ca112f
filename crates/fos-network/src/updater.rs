//! Filter Update Manager
//!
//! Keeps a local cache of remote filter lists fresh. Each source moves
//! through `NeverFetched → Fetching → {Fresh, StaleButCached, FetchFailed}`.
//!
//! Cache layout (inside `cache_dir`):
//! - `<name>.txt`: rule file, one rule per line
//! - `<name>.domains.txt`: hostnames from JSON payloads, one per line
//! - `filter_state.json`: per-source [`RemoteFilterConfig`]
//!
//! Every file is written to a temp file and renamed into place, so a
//! reader never sees a half-written list.

use crate::client::{HttpClient, HttpError};
use crate::config::{ConfigError, RemoteSource, UpdateConfig};
use fos_adblock::{parse_line, FilterCache};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

/// Persisted state file name
pub const FILTER_STATE_FILE: &str = "filter_state.json";

/// Update errors. Logged by the manager, never returned to engines.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] HttpError),

    #[error("Fetch timed out")]
    Timeout,

    #[error("Payload of {0} bytes exceeds the limit")]
    PayloadTooLarge(usize),

    #[error("Empty payload")]
    EmptyPayload,

    #[error("Payload contains no valid rules")]
    NoValidRules,

    #[error("Cache I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("State file error: {0}")]
    State(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Persisted record for one remote source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteFilterConfig {
    /// Unix seconds of the last successful fetch
    pub last_fetch_timestamp: Option<u64>,
    /// Rule file name inside the cache directory
    pub cached_rule_file: Option<String>,
    /// Domain file name inside the cache directory
    pub cached_domain_file: Option<String>,
    /// xxh3 of the last accepted payload
    pub content_hash: Option<u64>,
    pub rule_count: usize,
}

/// Where one source is in its update cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FetchState {
    NeverFetched,
    Fetching,
    Fresh,
    StaleButCached,
    FetchFailed,
}

/// Outcome of one pass over all sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Sources fetched and stored, or not yet due
    pub healthy: usize,
    pub failed: usize,
    /// Sources whose rule files changed on disk
    pub changed: usize,
}

impl RefreshSummary {
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Fetches filter-list text by URL
pub trait RuleFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, HttpError>> + Send;
}

impl RuleFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<String, HttpError> {
        let response = self.get(url).await?;
        if !response.is_success() {
            return Err(HttpError::HttpStatus(response.status.as_u16()));
        }
        response.text().map_err(|e| HttpError::BodyError(e.to_string()))
    }
}

/// Decoded remote payload
#[derive(Debug, Default, PartialEq, Eq)]
struct Payload {
    rules: Vec<String>,
    domains: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonPayload {
    Rules(Vec<String>),
    Object {
        #[serde(default)]
        rules: Vec<String>,
        #[serde(default)]
        domains: Vec<String>,
    },
}

impl Payload {
    /// Plain text, a JSON array of rules, or `{"rules": [], "domains": []}`.
    /// Text that merely looks like JSON (`[Adblock Plus 2.0]`) is text.
    fn decode(body: &str) -> Self {
        let trimmed = body.trim_start();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            match serde_json::from_str::<JsonPayload>(trimmed) {
                Ok(JsonPayload::Rules(rules)) => return Self { rules, domains: Vec::new() },
                Ok(JsonPayload::Object { rules, domains }) => return Self { rules, domains },
                Err(e) => debug!("Payload is not JSON ({}), reading as text", e),
            }
        }
        Self {
            rules: body.lines().map(str::to_string).collect(),
            domains: Vec::new(),
        }
    }

    /// Drop blanks and normalize hostnames
    fn normalize(mut self) -> Self {
        self.rules.retain(|rule| !rule.trim().is_empty());
        self.domains = self
            .domains
            .iter()
            .map(|d| d.trim().trim_end_matches('.').to_lowercase())
            .filter(|d| d.contains('.') && !d.contains(['/', ' ', ':', '*']))
            .collect();
        self
    }

    fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.domains.is_empty()
    }

    /// Parseable rules plus hostnames
    fn valid_rule_count(&self) -> usize {
        self.rules.iter().filter(|line| parse_line(line).is_some()).count() + self.domains.len()
    }
}

/// Remote filter cache with a bounded-timeout refresh
pub struct FilterUpdateManager<F: RuleFetcher> {
    config: UpdateConfig,
    cache_dir: PathBuf,
    fetcher: F,
    /// Persisted records; never held across an await
    state: Mutex<BTreeMap<String, RemoteFilterConfig>>,
    fetch_states: Mutex<HashMap<String, FetchState>>,
}

impl<F: RuleFetcher> FilterUpdateManager<F> {
    /// Open the cache directory and load `filter_state.json`.
    ///
    /// A missing state file is an empty cache; a corrupt one is logged and
    /// treated the same way.
    pub fn new(config: UpdateConfig, fetcher: F) -> Result<Self, UpdateError> {
        config.validate()?;
        let cache_dir = config.cache_dir.clone().ok_or(ConfigError::MissingCacheDir)?;
        fs::create_dir_all(&cache_dir)?;

        let state = load_state(&cache_dir.join(FILTER_STATE_FILE));
        let now = unix_now();
        let interval = config.refresh_interval_secs;
        let fetch_states = config
            .sources
            .iter()
            .map(|source| {
                let fetch_state = match state.get(&source.name) {
                    Some(record) if rule_file_exists(&cache_dir, record) => {
                        if is_due(record, now, interval) {
                            FetchState::StaleButCached
                        } else {
                            FetchState::Fresh
                        }
                    }
                    _ => FetchState::NeverFetched,
                };
                (source.name.clone(), fetch_state)
            })
            .collect();

        info!(
            "Filter cache at {} ({} sources, {} cached)",
            cache_dir.display(),
            config.sources.len(),
            state.len()
        );

        Ok(Self {
            config,
            cache_dir,
            fetcher,
            state: Mutex::new(state),
            fetch_states: Mutex::new(fetch_states),
        })
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Refresh every source that is due.
    ///
    /// `true` when each source is fresh or not yet due, `false` on any
    /// fetch, validation or write failure (the caller retries with
    /// backoff). Never panics, never propagates an error.
    pub async fn check_and_update_filters(&self) -> bool {
        self.refresh().await.succeeded()
    }

    /// Same as [`check_and_update_filters`](Self::check_and_update_filters)
    /// with per-source counts
    pub async fn refresh(&self) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        let now = unix_now();

        for source in &self.config.sources {
            let record = self.record(&source.name).unwrap_or_default();
            if rule_file_exists(&self.cache_dir, &record)
                && !is_due(&record, now, self.config.refresh_interval_secs)
            {
                debug!("Filter source '{}' is fresh, skipping", source.name);
                self.set_fetch_state(&source.name, FetchState::Fresh);
                summary.healthy += 1;
                continue;
            }

            self.set_fetch_state(&source.name, FetchState::Fetching);
            match self.update_source(source, now).await {
                Ok(changed) => {
                    self.set_fetch_state(&source.name, FetchState::Fresh);
                    summary.healthy += 1;
                    if changed {
                        summary.changed += 1;
                    }
                }
                Err(e) => {
                    warn!("Filter update for '{}' failed: {}", source.name, e);
                    let fallback = if rule_file_exists(&self.cache_dir, &record) {
                        FetchState::StaleButCached
                    } else {
                        FetchState::FetchFailed
                    };
                    self.set_fetch_state(&source.name, fallback);
                    summary.failed += 1;
                }
            }
        }

        if summary.changed > 0 || summary.failed > 0 {
            info!(
                "Filter refresh: {} healthy, {} changed, {} failed",
                summary.healthy, summary.changed, summary.failed
            );
        }
        summary
    }

    /// Fetch, validate and store one source. Returns whether files changed.
    async fn update_source(&self, source: &RemoteSource, now: u64) -> Result<bool, UpdateError> {
        let fetch = self.fetcher.fetch(&source.url);
        let body = tokio::time::timeout(self.config.fetch_timeout(), fetch)
            .await
            .map_err(|_| UpdateError::Timeout)??;

        if body.len() > self.config.max_payload_bytes {
            return Err(UpdateError::PayloadTooLarge(body.len()));
        }

        let payload = Payload::decode(&body).normalize();
        if payload.is_empty() {
            return Err(UpdateError::EmptyPayload);
        }
        let rule_count = payload.valid_rule_count();
        if rule_count == 0 {
            return Err(UpdateError::NoValidRules);
        }

        self.store(source, &payload, xxh3_64(body.as_bytes()), rule_count, now)
    }

    /// Write the payload and the updated record
    fn store(
        &self,
        source: &RemoteSource,
        payload: &Payload,
        hash: u64,
        rule_count: usize,
        now: u64,
    ) -> Result<bool, UpdateError> {
        let mut record = self.record(&source.name).unwrap_or_default();

        let unchanged =
            record.content_hash == Some(hash) && rule_file_exists(&self.cache_dir, &record);
        if unchanged {
            debug!("Filter source '{}' unchanged", source.name);
        } else {
            let rule_file = format!("{}.txt", source.name);
            write_atomic(&self.cache_dir.join(&rule_file), payload.rules.join("\n").as_bytes())?;

            let domain_file = format!("{}.domains.txt", source.name);
            let domain_path = self.cache_dir.join(&domain_file);
            if payload.domains.is_empty() {
                if domain_path.exists() {
                    fs::remove_file(&domain_path)?;
                }
                record.cached_domain_file = None;
            } else {
                write_atomic(&domain_path, payload.domains.join("\n").as_bytes())?;
                record.cached_domain_file = Some(domain_file);
            }

            record.cached_rule_file = Some(rule_file);
            record.content_hash = Some(hash);
            record.rule_count = rule_count;
            info!("Filter source '{}' updated: {} rules", source.name, rule_count);
        }
        record.last_fetch_timestamp = Some(now);

        let snapshot = {
            let mut state = self.lock_state();
            state.insert(source.name.clone(), record);
            serde_json::to_vec_pretty(&*state)?
        };
        write_atomic(&self.cache_dir.join(FILTER_STATE_FILE), &snapshot)?;

        Ok(!unchanged)
    }

    /// Persisted record for a source
    pub fn record(&self, name: &str) -> Option<RemoteFilterConfig> {
        self.lock_state().get(name).cloned()
    }

    pub fn fetch_state(&self, name: &str) -> Option<FetchState> {
        self.lock_fetch_states().get(name).copied()
    }

    /// Cached rule file for `name`; `None` on a cache miss
    pub fn filter_file(&self, name: &str) -> Option<PathBuf> {
        let record = self.record(name)?;
        let path = self.cache_dir.join(record.cached_rule_file?);
        path.is_file().then_some(path)
    }

    /// Hostnames from every cached domain file; empty on a cache miss
    pub fn remote_domains(&self) -> HashSet<String> {
        let files: Vec<String> = self
            .lock_state()
            .values()
            .filter_map(|record| record.cached_domain_file.clone())
            .collect();

        let mut domains = HashSet::new();
        for file in files {
            match fs::read_to_string(self.cache_dir.join(&file)) {
                Ok(text) => {
                    domains.extend(text.lines().filter(|l| !l.is_empty()).map(str::to_string))
                }
                Err(e) => warn!("Domain file {} unreadable: {}", file, e),
            }
        }
        domains
    }

    fn set_fetch_state(&self, name: &str, fetch_state: FetchState) {
        self.lock_fetch_states().insert(name.to_string(), fetch_state);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, RemoteFilterConfig>> {
        // state stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_fetch_states(&self) -> std::sync::MutexGuard<'_, HashMap<String, FetchState>> {
        self.fetch_states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<F: RuleFetcher> FilterCache for FilterUpdateManager<F> {
    fn cached_filter_names(&self) -> Vec<String> {
        self.config
            .sources
            .iter()
            .filter(|source| self.filter_file(&source.name).is_some())
            .map(|source| source.name.clone())
            .collect()
    }

    fn filter_file(&self, name: &str) -> Option<PathBuf> {
        FilterUpdateManager::filter_file(self, name)
    }

    fn remote_domains(&self) -> HashSet<String> {
        FilterUpdateManager::remote_domains(self)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn is_due(record: &RemoteFilterConfig, now: u64, interval_secs: u64) -> bool {
    match record.last_fetch_timestamp {
        Some(last) => now.saturating_sub(last) >= interval_secs,
        None => true,
    }
}

fn rule_file_exists(cache_dir: &Path, record: &RemoteFilterConfig) -> bool {
    record
        .cached_rule_file
        .as_ref()
        .is_some_and(|file| cache_dir.join(file).is_file())
}

fn load_state(path: &Path) -> BTreeMap<String, RemoteFilterConfig> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            return BTreeMap::new();
        }
    };
    serde_json::from_str(&text).unwrap_or_else(|e| {
        warn!("Corrupt {}, starting with an empty cache: {}", path.display(), e);
        BTreeMap::new()
    })
}

/// Write to a sibling temp file, then rename over `path`
fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}
