use std::{sync::Arc, time::Duration};

use time::OffsetDateTime;
use tokio::task::JoinHandle;

use super::store::RoomStore;

/// Periodically drops rooms idle for longer than `retention`. Live
/// presence is not touched.
pub fn spawn_reaper(store: Arc<dyn RoomStore>, retention: time::Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let Some(cutoff) = OffsetDateTime::now_utc().checked_sub(retention) else {
                tracing::warn!(retention = %retention, "retention window out of range, skipping purge");
                continue;
            };
            match store.purge_inactive(cutoff).await {
                Ok(0) => tracing::debug!("reaper tick"),
                Ok(purged) => tracing::info!(rooms = purged, "purged inactive rooms"),
                Err(e) => tracing::warn!(error = %e, "room purge failed"),
            }
        }
    })
}
