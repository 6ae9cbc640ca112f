//! fOS Content Blocking
//!
//! Ad and tracker filtering for the request path.
//!
//! Architecture:
//! 1. Filter-list text (remote cache, then bundled lists) → parser
//! 2. Parsed rules → immutable rule buckets, swapped in atomically
//! 3. Request → fast engine (hostnames) → advanced engine (paths, globs,
//!    regexes) → hardcoded tables while nothing has loaded
//! 4. Pages get bypass scripts that stub out ad globals

mod advanced_engine;
mod assets;
mod bypass;
mod config;
mod domain_set;
mod error;
mod fast_engine;
mod hardcoded;
mod interceptor;
mod loader;
mod parser;
mod profiler;
mod rule;
mod rule_set;
mod status;
mod url;

pub use advanced_engine::{AdvancedEngine, AdvancedEngineOptions, RuleMatch};
pub use assets::{AssetProvider, DirectoryAssets, EmbeddedAssets, FilterCache};
pub use bypass::{
    generic_bypass_script, object_spoofing_script, BypassScripts, SPOOFED_ALIASES, SPOOFED_GLOBALS,
};
pub use config::{AdblockConfig, AssetConfig};
pub use domain_set::DomainSet;
pub use error::AdblockError;
pub use fast_engine::{FastEngine, FastEngineOptions};
pub use hardcoded::{HardcodedFilters, HardcodedMatch};
pub use interceptor::{BlockReason, FilterStats, FilterStatusReport, RequestFilter, Verdict};
pub use parser::parse_line;
pub use profiler::{MatchProfiler, ProfileSnapshot, Probe};
pub use rule::{Glob, RegexRule, Rule, RuleKind};
pub use rule_set::{
    truncation_percentage, BucketStats, LoadLimits, PathSet, RuleSet, RuleSetBuilder, RuleStats,
    SourceLoad, DEFAULT_MAX_REGEX_PATTERNS, DEFAULT_MAX_WILDCARD_PATTERNS,
};
pub use status::{EngineLifecycle, EngineStatus, LoadReport};
pub use url::{extract_domain, is_subdomain_of};
