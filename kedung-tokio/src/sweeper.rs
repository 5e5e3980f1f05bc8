//! The background expiry sweeper (§4.E): every `CLEANER_DURATION`, snapshot
//! the store's keys and evict whatever has expired since.

use std::sync::Arc;
use std::time::Duration;

use kedung_core::store::{self, Store};
use tokio::task::JoinHandle;

/// Default sweep interval, matching the reference server's
/// `CLEANER_DURATION` of 5 seconds.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Spawn the sweeper as a detached tokio task and return its handle so the
/// caller can `abort()` it on shutdown.
pub fn spawn(store: Arc<Store>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        // The first tick fires immediately; skip it so we don't sweep a
        // freshly-started, necessarily-empty store.
        interval.tick().await;
        loop {
            interval.tick().await;
            let now = store::now_secs();
            let evicted = store::sweep_once(&store, now);
            if evicted > 0 {
                tracing::debug!(evicted, "swept expired entries");
            }
        }
    })
}
