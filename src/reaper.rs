//! Background purge of message contexts nobody came back for.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::errors::StoreError;
use crate::store::MessageContextStore;

/// Delete contexts older than `ttl` once; returns how many were removed
pub async fn purge_expired_contexts(
    store: &dyn MessageContextStore,
    ttl: Duration,
) -> Result<u64, StoreError> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    let cutoff = Utc::now()
        .checked_sub_signed(ttl)
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
    store.purge_older_than(cutoff).await
}

/// Run [`purge_expired_contexts`] every `every` until the runtime shuts down
pub fn spawn_context_reaper(
    store: Arc<dyn MessageContextStore>,
    ttl: Duration,
    every: Duration,
) -> JoinHandle<()> {
    info!(ttl_secs = ttl.as_secs(), interval_secs = every.as_secs(), "Starting message context reaper");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match purge_expired_contexts(store.as_ref(), ttl).await {
                Ok(0) => debug!("No expired message contexts"),
                Ok(purged) => info!(purged, "Purged expired message contexts"),
                Err(e) => error!(error = %e, "Message context purge failed"),
            }
        }
    })
}
