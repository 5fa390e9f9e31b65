//! Fire-and-forget session cleanup for the playback lifecycle.

use crate::client::StemServerClient;
use std::sync::{Arc, Mutex};
use stem_playback::{PlaybackError, SessionCleanup, SessionToken};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Sends `POST /api/cleanup/{session}` when a playback session ends.
///
/// The request runs on the given runtime and is never awaited by the
/// caller. Failures are only logged.
#[derive(Clone)]
pub struct CleanupNotifier {
    client: StemServerClient,
    runtime: Handle,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl CleanupNotifier {
    pub fn new(client: StemServerClient, runtime: Handle) -> Self {
        Self {
            client,
            runtime,
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Wait for cleanup requests still in flight
    pub async fn wait_pending(&self) {
        let pending = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for task in pending {
            if let Err(e) = task.await {
                warn!(error = %e, "Cleanup task panicked");
            }
        }
    }
}

impl SessionCleanup for CleanupNotifier {
    fn cleanup(&self, token: &SessionToken) -> stem_playback::Result<()> {
        let client = self.client.clone();
        let token = token.clone();
        debug!(session = %token, "Scheduling session cleanup");

        let task = self.runtime.spawn(async move {
            if let Err(e) = client.cleanup(&token).await {
                warn!(session = %token, error = %e, "Session cleanup request failed");
            }
        });

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| PlaybackError::CleanupFailed("cleanup task list poisoned".into()))?;
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
        Ok(())
    }
}
