//! Periodic cache refresh.

use nps_core::Reloadable;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawn a task that reloads every cache once per `period`, starting immediately.
///
/// Reloads run one after another on the blocking pool. Returns `None` when there is nothing
/// to refresh.
pub fn spawn_refresh(
    reloadables: Vec<Arc<dyn Reloadable>>,
    period: Duration,
) -> Option<JoinHandle<()>> {
    if reloadables.is_empty() {
        return None;
    }

    tracing::info!(
        caches = reloadables.len(),
        period_secs = period.as_secs(),
        "starting cache refresh"
    );

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            for cache in &reloadables {
                let name = cache.name().to_string();
                let cache = Arc::clone(cache);
                if let Err(err) = tokio::task::spawn_blocking(move || cache.reload()).await {
                    tracing::error!(cache = %name, error = %err, "cache reload task failed");
                }
            }
        }
    }))
}
