//! Background session cleanup.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info, warn};

use super::store::SessionStore;

/// Default sweep interval in seconds.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

/// Spawn a task that periodically sweeps expired sessions and stale
/// assertion records. Abort the returned handle to stop it.
pub fn spawn_cleanup_task(
    store: Arc<SessionStore>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_secs));
        // The first tick fires immediately; the store was just warmed, skip it.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match store.evict_expired() {
                Ok(0) => debug!("session sweep found nothing to evict"),
                Ok(evicted) => info!(evicted, "session sweep completed"),
                Err(e) => warn!(error = %e, "session sweep failed"),
            }

            if let Ok(count) = store.session_count() {
                debug!(active_sessions = count, "session store status");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::Session;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_cleanup_task_keeps_live_sessions() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::open(dir.path().join("sessions.redb")).unwrap());

        store
            .create(Session::new(
                "test@example.com".to_string(),
                "valid-assertion".to_string(),
                "https://idp.example.com".to_string(),
                3600,
            ))
            .unwrap();
        assert_eq!(store.session_count().unwrap(), 1);

        let handle = spawn_cleanup_task(Arc::clone(&store), 1);
        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.abort();

        assert_eq!(store.session_count().unwrap(), 1);
    }
}
