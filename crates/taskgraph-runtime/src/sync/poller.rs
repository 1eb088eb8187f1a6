use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::controller::LiveSyncController;

/// Periodically asks the controller to refresh from its source.
///
/// Ticks that land while a cycle is still running are coalesced by the
/// controller, so a slow backend never builds up a queue of fetches.
pub struct RefreshPoller {
    controller: LiveSyncController,
    interval: Duration,
}

impl RefreshPoller {
    pub fn new(controller: LiveSyncController, interval: Duration) -> Self {
        Self {
            controller,
            interval,
        }
    }

    /// Start polling in a background task.
    pub fn spawn(self) -> PollerHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(self.run(token.clone()));

        PollerHandle {
            token,
            task: Some(task),
        }
    }

    async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval = ?self.interval, "Refresh poller started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.controller.trigger() => {
                    if let Err(e) = result {
                        tracing::debug!(error = %e, "Scheduled refresh failed");
                    }
                }
            }
        }

        tracing::info!("Refresh poller stopped");
    }
}

/// Handle to a running poller. Dropping it stops the poller.
pub struct PollerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stop polling and wait for the background task to exit.
    ///
    /// A cycle already in flight is not aborted; it finishes inside the
    /// controller and its result still reaches subscribers.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Refresh poller task failed");
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
