use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::{auth::repo::UserStore, state::AppState};

/// Deletes accounts that were never verified and whose token has lapsed.
pub async fn purge_unverified(users: &dyn UserStore, now: OffsetDateTime) -> anyhow::Result<u64> {
    let removed = users.delete_expired_unverified(now).await?;
    if removed > 0 {
        info!(removed, "purged unverified users");
    }
    Ok(removed)
}

pub fn spawn_purge_job(state: AppState) -> JoinHandle<()> {
    let period = Duration::from_secs(state.config.purge_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = purge_unverified(state.users.as_ref(), OffsetDateTime::now_utc()).await {
                error!(error = ?e, "purge job failed");
            }
        }
    })
}
