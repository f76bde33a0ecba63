//! Job queues backing the manager's asynchronous operations.
//!
//! Two queues exist: a single-worker queue for short source operations
//! (registration, activation, readiness checks) and the library queue for
//! task-processor jobs, which serializes per source id while letting jobs
//! of distinct sources run in parallel.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::task::JobIdentity;

type BoxedJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct LaneJob {
    identity: Option<JobIdentity>,
    future: BoxedJob,
}

struct Lane {
    tx: mpsc::UnboundedSender<LaneJob>,
    cancel: CancellationToken,
    pending: Arc<Mutex<HashSet<JobIdentity>>>,
    worker: JoinHandle<()>,
}

impl Lane {
    fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LaneJob>();
        let pending: Arc<Mutex<HashSet<JobIdentity>>> = Arc::new(Mutex::new(HashSet::new()));
        let worker_pending = pending.clone();
        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if let Some(identity) = &job.identity {
                    worker_pending.lock().remove(identity);
                }
                job.future.await;
            }
        });

        Self {
            tx,
            cancel: CancellationToken::new(),
            pending,
            worker,
        }
    }
}

/// Per-key serialized job queue: jobs submitted under one key run in
/// submission order; keys run independently of each other.
///
/// Cancellation is cooperative. [`cancel`](LibraryQueue::cancel) trips the
/// key's current cancellation token — the running job and everything still
/// queued observe it through their [`crate::task::TaskContext`] and bail
/// out — and installs a fresh token for later submissions.
#[derive(Default)]
pub struct LibraryQueue {
    lanes: Mutex<HashMap<String, Lane>>,
}

impl LibraryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cancellation token future jobs of this key should derive from.
    #[must_use]
    pub fn cancel_token(&self, key: &str) -> CancellationToken {
        let mut lanes = self.lanes.lock();
        let lane = lanes
            .entry(key.to_string())
            .or_insert_with(Lane::spawn);
        lane.cancel.child_token()
    }

    /// Enqueues a job. Jobs carrying an identity are dropped when an
    /// identical job is already waiting in the same lane.
    pub fn submit<F>(&self, key: &str, identity: Option<JobIdentity>, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut lanes = self.lanes.lock();
        let lane = lanes
            .entry(key.to_string())
            .or_insert_with(Lane::spawn);

        if let Some(identity) = &identity {
            let mut pending = lane.pending.lock();
            if pending.contains(identity) {
                debug!(%key, "dropping duplicate job");
                return false;
            }
            pending.insert(identity.clone());
        }

        lane.tx
            .send(LaneJob {
                identity,
                future: Box::pin(job),
            })
            .is_ok()
    }

    /// Cancels the running and all queued jobs of one key.
    pub fn cancel(&self, key: &str) {
        let mut lanes = self.lanes.lock();
        if let Some(lane) = lanes.get_mut(key) {
            lane.cancel.cancel();
            lane.cancel = CancellationToken::new();
            lane.pending.lock().clear();
        }
    }

    /// Cancels everything and stops the workers.
    pub fn shutdown(&self) {
        let mut lanes = self.lanes.lock();
        for (_, lane) in lanes.drain() {
            lane.cancel.cancel();
            lane.worker.abort();
        }
    }
}

impl Drop for LibraryQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Single-worker FIFO queue for short source operations.
pub struct SourceOpQueue {
    tx: mpsc::UnboundedSender<BoxedJob>,
    worker: JoinHandle<()>,
}

impl SourceOpQueue {
    #[must_use]
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<BoxedJob>();
        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job.await;
            }
        });
        Self { tx, worker }
    }

    pub fn submit<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tx.send(Box::pin(job)).is_ok()
    }

    pub fn shutdown(&self) {
        self.worker.abort();
    }
}

impl Default for SourceOpQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SourceOpQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn test_per_key_fifo_order() {
        let queue = LibraryQueue::new();
        let (tx, mut rx) = unbounded_channel();

        for i in 0u64..5 {
            let tx = tx.clone();
            queue.submit("uuid-A", None, async move {
                // the later jobs finish faster, yet order must hold
                tokio::time::sleep(Duration::from_millis(10 * (5 - i))).await;
                tx.send(i).ok();
            });
        }

        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(rx.recv().await.expect("job result"));
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_cross_key_parallelism() {
        let queue = LibraryQueue::new();
        let (tx, mut rx) = unbounded_channel();

        let slow_tx = tx.clone();
        queue.submit("uuid-A", None, async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            slow_tx.send("slow").ok();
        });
        let fast_tx = tx.clone();
        queue.submit("uuid-B", None, async move {
            fast_tx.send("fast").ok();
        });

        // the fast job on the other lane overtakes the slow one
        assert_eq!(rx.recv().await, Some("fast"));
        assert_eq!(rx.recv().await, Some("slow"));
    }

    #[tokio::test]
    async fn test_cancel_stops_queued_jobs() {
        let queue = LibraryQueue::new();
        let (tx, mut rx) = unbounded_channel();

        let token = queue.cancel_token("uuid-A");
        let first_tx = tx.clone();
        let first_token = token.clone();
        queue.submit("uuid-A", None, async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            first_tx.send(("first", first_token.is_cancelled())).ok();
        });

        let second_token = queue.cancel_token("uuid-A");
        let second_tx = tx.clone();
        queue.submit("uuid-A", None, async move {
            second_tx
                .send(("second", second_token.is_cancelled()))
                .ok();
        });

        queue.cancel("uuid-A");

        assert_eq!(rx.recv().await, Some(("first", true)));
        assert_eq!(rx.recv().await, Some(("second", true)));

        // a token handed out after the cancellation is fresh
        let fresh = queue.cancel_token("uuid-A");
        assert!(!fresh.is_cancelled());
    }

    #[tokio::test]
    async fn test_duplicate_identities_are_dropped() {
        let queue = LibraryQueue::new();
        let identity = JobIdentity {
            source: "uuid-A".to_string(),
            task_types: Vec::new(),
            imports: Vec::new(),
        };

        // block the lane so the queued duplicates stay pending
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        queue.submit("uuid-A", None, async move {
            release_rx.await.ok();
        });

        let (tx, mut rx) = unbounded_channel();
        let first_tx = tx.clone();
        assert!(queue.submit("uuid-A", Some(identity.clone()), async move {
            first_tx.send(1).ok();
        }));
        assert!(!queue.submit("uuid-A", Some(identity.clone()), async { }));

        release_tx.send(()).ok();
        assert_eq!(rx.recv().await, Some(1));

        // once drained, the identity may be submitted again
        let again_tx = tx.clone();
        assert!(queue.submit("uuid-A", Some(identity), async move {
            again_tx.send(2).ok();
        }));
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_source_op_queue_runs_in_order() {
        let queue = SourceOpQueue::new();
        let (tx, mut rx) = unbounded_channel();
        for i in 0..3 {
            let tx = tx.clone();
            queue.submit(async move {
                tx.send(i).ok();
            });
        }
        for expected in 0..3 {
            assert_eq!(rx.recv().await, Some(expected));
        }
    }
}
