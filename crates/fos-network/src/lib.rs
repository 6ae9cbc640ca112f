//! fOS Network Layer
//!
//! HTTP fetching and remote filter list maintenance for the content
//! filter in `fos-adblock`.
//!
//! Architecture:
//! 1. `HttpClient` fetches over HTTP/1.1 (rustls for HTTPS), optionally
//!    consulting a `RequestFilter` before touching the network
//! 2. `FilterUpdateManager` downloads, validates and caches remote lists
//!    and serves them back to the engines as a `FilterCache`
//! 3. `RefreshJob` re-runs the manager on a timer and triggers reloads

mod client;
mod config;
mod scheduler;
mod updater;

pub use client::{ClientStats, HttpClient, HttpClientConfig, HttpError, Response};
pub use config::{ConfigError, RemoteSource, UpdateConfig, DEFAULT_REFRESH_INTERVAL_SECS};
pub use scheduler::{next_backoff, RefreshJob};
pub use updater::{
    FetchState, FilterUpdateManager, RefreshSummary, RemoteFilterConfig, RuleFetcher, UpdateError,
    FILTER_STATE_FILE,
};
