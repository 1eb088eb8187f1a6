use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, oneshot};

use taskgraph_core::config::SyncConfig;
use taskgraph_core::{
    GraphError, GraphPipeline, GraphSnapshot, Patch, Result, TaskGraphConfig, TaskRecord,
};

use crate::source::{source_from_config, SnapshotSource};

/// Event published after every refresh cycle.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The cycle succeeded; the patch may be empty.
    Patch(Arc<Patch>),
    /// The cycle failed and the previous snapshot is still current.
    Failed { error: GraphError, stale: bool },
}

/// Health of the live view as shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Revision of the snapshot currently held.
    pub revision: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    /// The view shows the last good graph but it is no longer being updated.
    pub stale: bool,
}

enum RefreshRequest {
    Records(Vec<TaskRecord>),
    Fetch,
}

type Waiter = oneshot::Sender<Result<Patch>>;

#[derive(Default)]
struct RefreshQueue {
    in_flight: bool,
    /// Latest request received while a cycle was running.
    pending: Option<RefreshRequest>,
    waiters: Vec<Waiter>,
}

/// Keeps the rendered graph in step with the backend.
///
/// At most one refresh cycle runs at a time. Requests arriving while a cycle
/// is in flight are coalesced: only the most recent one is kept and it runs
/// as a single follow-up cycle whose result is delivered to every coalesced
/// caller. Cloning the controller yields another handle to the same state.
///
/// Refresh methods must be called from within a tokio runtime.
#[derive(Clone)]
pub struct LiveSyncController {
    inner: Arc<Inner>,
}

struct Inner {
    pipeline: GraphPipeline,
    source: Option<Arc<dyn SnapshotSource>>,
    config: SyncConfig,
    current: RwLock<Arc<GraphSnapshot>>,
    status: RwLock<SyncStatus>,
    queue: Mutex<RefreshQueue>,
    events: broadcast::Sender<SyncEvent>,
    cycles: AtomicU64,
}

impl LiveSyncController {
    /// Create a controller holding the empty snapshot.
    pub fn new(
        pipeline: GraphPipeline,
        source: Option<Arc<dyn SnapshotSource>>,
        config: SyncConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));

        Self {
            inner: Arc::new(Inner {
                pipeline,
                source,
                config,
                current: RwLock::new(Arc::new(GraphSnapshot::empty())),
                status: RwLock::new(SyncStatus::default()),
                queue: Mutex::new(RefreshQueue::default()),
                events,
                cycles: AtomicU64::new(0),
            }),
        }
    }

    /// Assemble pipeline, source and sync settings from configuration.
    pub fn from_config(config: &TaskGraphConfig) -> Result<Self> {
        let pipeline = GraphPipeline::from_config(&config.graph)?;
        let source = source_from_config(&config.source);
        Ok(Self::new(pipeline, source, config.sync.clone()))
    }

    /// Refresh from records supplied by the caller.
    ///
    /// The request is queued when this method is called; the returned future
    /// only waits for the outcome.
    pub fn refresh(
        &self,
        records: Vec<TaskRecord>,
    ) -> impl Future<Output = Result<Patch>> + Send + 'static {
        Self::await_outcome(self.enqueue(RefreshRequest::Records(records)))
    }

    /// Refresh from the configured snapshot source.
    ///
    /// Queued eagerly, like [`refresh`](Self::refresh).
    pub fn trigger(&self) -> impl Future<Output = Result<Patch>> + Send + 'static {
        Self::await_outcome(self.enqueue(RefreshRequest::Fetch))
    }

    /// The snapshot currently held. Never a partially built one.
    pub fn current(&self) -> Arc<GraphSnapshot> {
        self.inner.current()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner
            .status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Receive an event for every completed cycle.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Number of refresh cycles computed so far.
    pub fn cycles(&self) -> u64 {
        self.inner.cycles.load(Ordering::SeqCst)
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.lock_queue().in_flight
    }

    pub fn has_source(&self) -> bool {
        self.inner.source.is_some()
    }

    async fn await_outcome(receiver: oneshot::Receiver<Result<Patch>>) -> Result<Patch> {
        receiver.await.map_err(|_| GraphError::Cancelled)?
    }

    fn enqueue(&self, request: RefreshRequest) -> oneshot::Receiver<Result<Patch>> {
        let (tx, rx) = oneshot::channel();

        let start_driver = {
            let mut queue = self.inner.lock_queue();
            if queue.in_flight {
                tracing::debug!(
                    waiting = queue.waiters.len() + 1,
                    "Refresh in flight, coalescing request"
                );
            }
            queue.pending = Some(request);
            queue.waiters.push(tx);
            !std::mem::replace(&mut queue.in_flight, true)
        };

        if start_driver {
            let inner = self.inner.clone();
            tokio::spawn(inner.drive());
        }

        rx
    }
}

impl Inner {
    fn lock_queue(&self) -> MutexGuard<'_, RefreshQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> Arc<GraphSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run cycles until no request is pending.
    async fn drive(self: Arc<Self>) {
        loop {
            let (request, waiters) = {
                let mut queue = self.lock_queue();
                match queue.pending.take() {
                    Some(request) => (request, std::mem::take(&mut queue.waiters)),
                    None => {
                        queue.in_flight = false;
                        return;
                    }
                }
            };

            let outcome = self.clone().run_cycle(request).await;

            for waiter in waiters {
                // The caller may have stopped waiting; the cycle still counts.
                let _ = waiter.send(outcome.clone());
            }
        }
    }

    async fn run_cycle(self: Arc<Self>, request: RefreshRequest) -> Result<Patch> {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let attempted_at = Utc::now();

        // A panic inside the source or pipeline fails this cycle only; the
        // driver keeps serving the queue.
        let inner = self.clone();
        let computed = match tokio::spawn(async move { inner.compute(request).await }).await {
            Ok(result) => result,
            Err(e) => Err(GraphError::FetchFailure(format!("refresh cycle aborted: {}", e))),
        };

        match computed {
            Ok(patch) => {
                let revision = patch.to_revision;
                {
                    let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
                    status.revision = revision;
                    status.last_success_at = Some(Utc::now());
                    status.last_attempt_at = Some(attempted_at);
                    status.last_error = None;
                    status.consecutive_failures = 0;
                    status.stale = false;
                }

                if patch.is_empty() {
                    tracing::trace!(cycle, revision, "Refresh produced no changes");
                } else {
                    tracing::debug!(
                        cycle,
                        revision,
                        added = patch.added.len(),
                        removed = patch.removed.len(),
                        changed = patch.changed.len(),
                        added_edges = patch.added_edges.len(),
                        removed_edges = patch.removed_edges.len(),
                        "Graph refreshed"
                    );
                }

                let _ = self.events.send(SyncEvent::Patch(Arc::new(patch.clone())));
                Ok(patch)
            }
            Err(error) => {
                let stale = {
                    let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
                    status.last_attempt_at = Some(attempted_at);
                    status.last_error = Some(error.to_string());
                    status.consecutive_failures = status.consecutive_failures.saturating_add(1);
                    status.stale =
                        status.consecutive_failures >= self.config.stale_after_failures.max(1);
                    status.stale
                };

                if error.is_fetch_failure() {
                    tracing::warn!(cycle, error = %error, stale, "Snapshot fetch failed");
                } else {
                    tracing::error!(
                        cycle,
                        error = %error,
                        stale,
                        "Snapshot rejected, keeping last good graph"
                    );
                }

                let _ = self.events.send(SyncEvent::Failed {
                    error: error.clone(),
                    stale,
                });
                Err(error)
            }
        }
    }

    /// Build the next snapshot, diff it, and swap it in.
    ///
    /// Only the driver calls this, so the read-diff-swap sequence has a
    /// single writer.
    async fn compute(&self, request: RefreshRequest) -> Result<Patch> {
        let records = match request {
            RefreshRequest::Records(records) => records,
            RefreshRequest::Fetch => self.fetch().await?,
        };

        let current = self.current();
        let next = self.pipeline.materialize(records, current.revision() + 1)?;
        let patch = current.diff(&next);

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);

        Ok(patch)
    }

    async fn fetch(&self) -> Result<Vec<TaskRecord>> {
        let source = self.source.as_ref().ok_or(GraphError::NoSource)?;
        let timeout = self.config.fetch_timeout();

        match tokio::time::timeout(timeout, source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(GraphError::FetchFailure(format!(
                "timed out after {}ms fetching {}",
                timeout.as_millis(),
                source.describe()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    use taskgraph_core::testing::{record, sample_chain};
    use taskgraph_core::{NodeId, TaskState};

    use crate::testing::MockSnapshotSource;

    fn controller_without_source() -> LiveSyncController {
        LiveSyncController::new(GraphPipeline::default(), None, SyncConfig::default())
    }

    fn controller_with(source: Arc<MockSnapshotSource>, config: SyncConfig) -> LiveSyncController {
        LiveSyncController::new(GraphPipeline::default(), Some(source), config)
    }

    #[tokio::test]
    async fn test_first_refresh_adds_everything() {
        let controller = controller_without_source();
        assert_eq!(controller.current().revision(), 0);

        let patch = controller.refresh(sample_chain()).await.unwrap();

        assert_eq!(patch.from_revision, 0);
        assert_eq!(patch.to_revision, 1);
        assert_eq!(
            patch.added_ids(),
            vec![NodeId::task("a"), NodeId::group("chord-1")]
        );
        assert_eq!(controller.current().revision(), 1);
        assert_eq!(controller.status().revision, 1);
    }

    #[tokio::test]
    async fn test_noop_refresh_yields_empty_patch() {
        let controller = controller_without_source();

        controller.refresh(sample_chain()).await.unwrap();
        let patch = controller.refresh(sample_chain()).await.unwrap();

        assert!(patch.added.is_empty());
        assert!(patch.removed.is_empty());
        assert!(patch.changed.is_empty());
        assert!(patch.is_empty());
        assert_eq!(patch.to_revision, 2);
    }

    #[tokio::test]
    async fn test_state_change_is_reported() {
        let controller = controller_without_source();
        controller
            .refresh(vec![record("a", "PENDING")])
            .await
            .unwrap();

        let patch = controller
            .refresh(vec![record("a", "STARTED")])
            .await
            .unwrap();

        assert_eq!(patch.changed_ids(), vec![NodeId::task("a")]);
        assert_eq!(patch.changed[0].state(), TaskState::Started);
    }

    #[tokio::test]
    async fn test_build_error_keeps_current() {
        let controller = controller_without_source();
        controller.refresh(sample_chain()).await.unwrap();
        let before = controller.current();

        let err = controller
            .refresh(vec![record("x", "BOGUS")])
            .await
            .unwrap_err();
        assert_eq!(err, GraphError::UnknownState("BOGUS".to_string()));

        let err = controller
            .refresh(vec![record("x", "PENDING"), record("x", "PENDING")])
            .await
            .unwrap_err();
        assert_eq!(err, GraphError::DuplicateTaskId("x".to_string()));

        let after = controller.current();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.revision(), 1);

        let status = controller.status();
        assert_eq!(status.consecutive_failures, 2);
        assert_eq!(status.revision, 1);
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_current() {
        let source = Arc::new(MockSnapshotSource::new());
        source.push_ok(sample_chain());
        source.push_err(GraphError::FetchFailure("connection reset".to_string()));
        let controller = controller_with(source.clone(), SyncConfig::default());

        controller.trigger().await.unwrap();
        let before = controller.current();

        let result = controller.trigger().await;
        taskgraph_core::assert_err_variant!(result, GraphError::FetchFailure(_));
        assert!(Arc::ptr_eq(&before, &controller.current()));
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_fetch_failure() {
        let source = Arc::new(MockSnapshotSource::new().with_delay(Duration::from_millis(500)));
        source.push_ok(sample_chain());
        let config = SyncConfig {
            fetch_timeout_ms: 20,
            ..Default::default()
        };
        let controller = controller_with(source, config);

        let err = controller.trigger().await.unwrap_err();
        match err {
            GraphError::FetchFailure(message) => assert!(message.contains("timed out")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(controller.current().revision(), 0);
    }

    /// Panics on its first fetch, then serves a single pending task.
    #[derive(Default)]
    struct PanicOnceSource {
        panicked: AtomicBool,
    }

    impl SnapshotSource for PanicOnceSource {
        fn fetch(&self) -> crate::source::SourceFuture<'_> {
            Box::pin(async move {
                if !self.panicked.swap(true, Ordering::SeqCst) {
                    panic!("snapshot client bug");
                }
                Ok(vec![record("a", "PENDING")])
            })
        }

        fn describe(&self) -> String {
            "panic-once".to_string()
        }
    }

    #[tokio::test]
    async fn test_panicking_cycle_does_not_wedge_controller() {
        let source = Arc::new(PanicOnceSource::default());
        let controller =
            LiveSyncController::new(GraphPipeline::default(), Some(source), SyncConfig::default());

        let result = controller.trigger().await;
        taskgraph_core::assert_err_variant!(result, GraphError::FetchFailure(_));
        assert_eq!(controller.current().revision(), 0);
        assert_eq!(controller.status().consecutive_failures, 1);

        let patch = tokio::time::timeout(
            Duration::from_secs(2),
            controller.refresh(vec![record("b", "PENDING")]),
        )
        .await
        .expect("controller stuck after panicking cycle")
        .unwrap();
        assert_eq!(patch.to_revision, 1);

        let patch = tokio::time::timeout(Duration::from_secs(2), controller.trigger())
            .await
            .expect("controller stuck after panicking cycle")
            .unwrap();
        assert_eq!(patch.added_ids(), vec![NodeId::task("a")]);
        assert_eq!(controller.cycles(), 3);
    }

    #[tokio::test]
    async fn test_trigger_without_source() {
        let controller = controller_without_source();
        assert!(!controller.has_source());
        taskgraph_core::assert_err_variant!(controller.trigger().await, GraphError::NoSource);
    }

    #[tokio::test]
    async fn test_concurrent_requests_coalesce() {
        let source = Arc::new(MockSnapshotSource::gated());
        source.push_ok(vec![record("a", "PENDING")]);
        source.push_ok(vec![record("a", "SUCCESS")]);
        let controller = controller_with(source.clone(), SyncConfig::default());

        let first = controller.trigger();
        source.wait_for_fetches(1).await;
        assert!(controller.is_refreshing());

        let followers: Vec<_> = (0..5).map(|_| controller.trigger()).collect();

        source.release(2);
        let first_patch = first.await.unwrap();
        assert_eq!(first_patch.to_revision, 1);

        for follower in followers {
            let patch = follower.await.unwrap();
            assert_eq!(patch.to_revision, 2);
            assert_eq!(patch.changed_ids(), vec![NodeId::task("a")]);
        }

        assert_eq!(source.fetch_count(), 2);
        assert_eq!(controller.cycles(), 2);
    }

    #[tokio::test]
    async fn test_coalesced_follow_up_uses_latest_records() {
        let source = Arc::new(MockSnapshotSource::gated());
        source.push_ok(vec![record("a", "PENDING")]);
        let controller = controller_with(source.clone(), SyncConfig::default());

        let first = controller.trigger();
        source.wait_for_fetches(1).await;

        let older = controller.refresh(vec![record("b", "PENDING")]);
        let newer = controller.refresh(vec![record("c", "PENDING")]);

        source.release(1);
        first.await.unwrap();

        let older_patch = older.await.unwrap();
        let newer_patch = newer.await.unwrap();
        assert_eq!(older_patch, newer_patch);
        assert_eq!(newer_patch.added_ids(), vec![NodeId::task("c")]);
        assert_eq!(controller.cycles(), 2);
    }

    #[tokio::test]
    async fn test_current_is_consistent_during_refresh() {
        let source = Arc::new(MockSnapshotSource::gated());
        source.push_ok(sample_chain());
        source.push_ok(vec![record("z", "RETRY")]);
        let controller = controller_with(source.clone(), SyncConfig::default());

        source.release(1);
        controller.trigger().await.unwrap();
        let settled = controller.current();

        let pending = controller.trigger();
        source.wait_for_fetches(2).await;

        let during = controller.current();
        assert!(Arc::ptr_eq(&settled, &during));
        assert_eq!(during.node_count(), 2);

        source.release(1);
        pending.await.unwrap();
        assert_eq!(controller.current().node_count(), 1);
    }

    #[tokio::test]
    async fn test_repeated_failures_mark_stale() {
        let source = Arc::new(MockSnapshotSource::new());
        source.push_ok(sample_chain());
        source.push_err(GraphError::FetchFailure("down".into()));
        source.push_err(GraphError::FetchFailure("down".into()));
        source.push_ok(sample_chain());
        let config = SyncConfig {
            stale_after_failures: 2,
            ..Default::default()
        };
        let controller = controller_with(source, config);

        controller.trigger().await.unwrap();
        let _ = controller.trigger().await;
        assert!(!controller.status().stale);

        let _ = controller.trigger().await;
        let status = controller.status();
        assert!(status.stale);
        assert_eq!(status.consecutive_failures, 2);
        assert_eq!(controller.current().node_count(), 2);

        controller.trigger().await.unwrap();
        let status = controller.status();
        assert!(!status.stale);
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let controller = controller_without_source();
        let mut events = controller.subscribe();

        controller.refresh(sample_chain()).await.unwrap();
        let _ = controller.refresh(vec![record("a", "BOGUS")]).await;

        match events.recv().await.unwrap() {
            SyncEvent::Patch(patch) => assert_eq!(patch.to_revision, 1),
            other => panic!("unexpected event: {:?}", other),
        }
        match events.recv().await.unwrap() {
            SyncEvent::Failed { error, stale } => {
                assert!(matches!(error, GraphError::UnknownState(_)));
                assert!(!stale);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_from_config_without_source() {
        let controller = LiveSyncController::from_config(&TaskGraphConfig::default()).unwrap();
        assert!(!controller.has_source());
        assert_eq!(controller.current().revision(), 0);
    }
}
