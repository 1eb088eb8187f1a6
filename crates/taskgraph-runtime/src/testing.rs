//! Test doubles for the sync layer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{watch, Semaphore};

use taskgraph_core::{GraphError, Result, TaskRecord};

use crate::source::{SnapshotSource, SourceFuture};

/// Scripted snapshot source.
///
/// Queued responses are returned in order; once the queue is empty the last
/// response is repeated. A gated mock blocks every fetch until a permit is
/// released, which lets tests hold a refresh cycle in flight.
pub struct MockSnapshotSource {
    responses: Mutex<VecDeque<Result<Vec<TaskRecord>>>>,
    last: Mutex<Result<Vec<TaskRecord>>>,
    fetches: AtomicUsize,
    started: watch::Sender<usize>,
    gate: Option<Semaphore>,
    delay: Option<Duration>,
}

impl MockSnapshotSource {
    /// A mock that answers immediately with an empty snapshot.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            last: Mutex::new(Ok(Vec::new())),
            fetches: AtomicUsize::new(0),
            started: watch::channel(0).0,
            gate: None,
            delay: None,
        }
    }

    /// A mock whose fetches wait for [`release`](Self::release).
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    /// Sleep before answering each fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_ok(&self, records: Vec<TaskRecord>) {
        self.push(Ok(records));
    }

    pub fn push_err(&self, error: GraphError) {
        self.push(Err(error));
    }

    fn push(&self, response: Result<Vec<TaskRecord>>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    /// Number of fetches started so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` fetches have started.
    pub async fn wait_for_fetches(&self, count: usize) {
        let mut rx = self.started.subscribe();
        let _ = rx.wait_for(|started| *started >= count).await;
    }

    /// Let `permits` gated fetches complete.
    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    fn next_response(&self) -> Result<Vec<TaskRecord>> {
        let queued = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(response) = queued {
            *last = response;
        }
        last.clone()
    }

    async fn answer(&self) -> Result<Vec<TaskRecord>> {
        let count = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.started.send_replace(count);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| GraphError::FetchFailure("mock gate closed".to_string()))?
                .forget();
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.next_response()
    }
}

impl Default for MockSnapshotSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSource for MockSnapshotSource {
    fn fetch(&self) -> SourceFuture<'_> {
        Box::pin(self.answer())
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}
