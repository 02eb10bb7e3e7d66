//! Periodic (time-driven) checkpointing, complementing the event-driven
//! saves the workflow engine performs on phase transitions (§4.5).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::CheckpointStore;
use crate::models::{CheckpointReason, Session};

/// Spawns a background task that snapshots a session on a fixed interval
/// until `cancellation` fires. `snapshot` is polled for the session's
/// current state each tick; a `None` means the session has since ended and
/// the task exits without saving.
pub fn spawn_periodic_checkpointing<F, Fut>(
    store: Arc<dyn CheckpointStore>,
    session_id: String,
    interval: Duration,
    cancellation: CancellationToken,
    snapshot: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Option<Session>> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    debug!(%session_id, "periodic checkpointing stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let Some(session) = snapshot().await else {
                        debug!(%session_id, "session ended, stopping periodic checkpointing");
                        return;
                    };
                    if let Err(err) = store
                        .save(&session, "periodic", CheckpointReason::Periodic, None)
                        .await
                    {
                        warn!(%session_id, %err, "periodic checkpoint save failed");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::models::CandidateDescriptor;
    use chrono::Utc;

    #[tokio::test(start_paused = true)]
    async fn stops_when_cancelled() {
        let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::default());
        let token = CancellationToken::new();
        let session = Session::new(
            "s1",
            "room1",
            CandidateDescriptor {
                id: "c1".into(),
                display_name: "Ada".into(),
            },
            "Project X",
            None,
            None,
            Utc::now(),
        );

        let handle = spawn_periodic_checkpointing(
            store.clone(),
            "s1".to_string(),
            Duration::from_millis(10),
            token.clone(),
            move || {
                let session = session.clone();
                async move { Some(session) }
            },
        );

        tokio::time::advance(Duration::from_millis(35)).await;
        token.cancel();
        handle.await.unwrap();

        assert!(!store.list("s1").await.unwrap().is_empty());
    }
}
