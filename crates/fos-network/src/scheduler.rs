//! Background filter refresh
//!
//! Wakes up every `check_interval`, refreshes whatever sources are due and
//! hands control to a callback when any rule file changed on disk. Failed
//! refreshes are retried with exponential backoff instead of waiting a full
//! interval.

use crate::updater::{FilterUpdateManager, RuleFetcher};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Next retry delay after a failed refresh.
///
/// Starts at `initial` and doubles up to `max`.
pub fn next_backoff(current: Option<Duration>, initial: Duration, max: Duration) -> Duration {
    match current {
        None => initial.min(max),
        Some(delay) => delay.saturating_mul(2).min(max),
    }
}

/// Periodic refresh driver for one [`FilterUpdateManager`]
pub struct RefreshJob<F: RuleFetcher> {
    manager: Arc<FilterUpdateManager<F>>,
    check_interval: Duration,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl<F: RuleFetcher + 'static> RefreshJob<F> {
    pub fn new(manager: Arc<FilterUpdateManager<F>>) -> Self {
        let config = manager.config();
        Self {
            check_interval: config.check_interval(),
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
            manager,
        }
    }

    pub fn manager(&self) -> &Arc<FilterUpdateManager<F>> {
        &self.manager
    }

    /// Run on the current runtime until `shutdown` changes or its sender
    /// is dropped.
    pub fn spawn<C, Fut>(self, shutdown: watch::Receiver<bool>, on_refresh: C) -> JoinHandle<()>
    where
        C: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.run(shutdown, on_refresh))
    }

    pub async fn run<C, Fut>(self, mut shutdown: watch::Receiver<bool>, on_refresh: C)
    where
        C: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = ()> + Send,
    {
        if !self.manager.config().enabled {
            info!("Filter updates disabled, refresh job not started");
            return;
        }

        info!(
            "Filter refresh job started (check every {}s, {} sources)",
            self.check_interval.as_secs(),
            self.manager.config().sources.len()
        );

        let mut backoff = None;
        loop {
            let summary = self.manager.refresh().await;

            if summary.changed > 0 {
                info!("{} filter lists changed, reloading", summary.changed);
                on_refresh().await;
            }

            let delay = if summary.succeeded() {
                backoff = None;
                self.check_interval
            } else {
                let delay = next_backoff(backoff, self.initial_backoff, self.max_backoff);
                backoff = Some(delay);
                warn!(
                    "{} of {} filter sources failed, retrying in {}s",
                    summary.failed,
                    summary.failed + summary.healthy,
                    delay.as_secs()
                );
                delay
            };
            debug!("Next filter check in {}s", delay.as_secs());

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    info!("Filter refresh job stopped");
                    return;
                }
            }
        }
    }
}
