//! Live-task tracking with idempotent global cancellation
//!
//! Every asynchronous unit of work the engine dispatches is registered
//! here. The live set never contains a handle for a finished task: a drop
//! guard removes the entry on every completion path, including panics.
//! Cancellation is cooperative — the unit of work receives a
//! [`CancellationToken`] and is expected to check it at its suspension
//! points and still run its cleanup.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

/// Unique identifier for a tracked task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

type LiveSet = Arc<Mutex<HashMap<TaskId, CancellationToken>>>;

/// Registry of live asynchronous units of work
#[derive(Clone)]
pub struct TaskTracker {
    next_id: Arc<AtomicU64>,
    live: LiveSet,
}

/// Handle to one tracked unit of work
///
/// Holds the task id, its cancellation token, and the join handle for the
/// task's typed output. Dropping the handle does not cancel the task.
pub struct TrackedTask<T> {
    id: TaskId,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<T>,
}

impl<T> TrackedTask<T> {
    /// The task's identifier.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Request cooperative cancellation of this task.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the task to finish and return its output.
    ///
    /// Returns the underlying [`JoinError`](tokio::task::JoinError) if the
    /// task panicked or was aborted at the runtime level.
    pub async fn join(self) -> std::result::Result<T, tokio::task::JoinError> {
        self.handle.await
    }
}

/// Removes the task from the live set when the spawned future finishes,
/// on every path — normal return, early return, or panic.
struct LiveGuard {
    id: TaskId,
    live: LiveSet,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        lock_live(&self.live).remove(&self.id);
    }
}

/// Lock the live set, recovering from poisoning (a panicking task must not
/// wedge cancellation for everyone else).
fn lock_live(live: &LiveSet) -> MutexGuard<'_, HashMap<TaskId, CancellationToken>> {
    live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TaskTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(1)),
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawn a unit of work and register it in the live set.
    ///
    /// The closure receives the task's cancellation token; the resulting
    /// future begins executing immediately, concurrently with the caller.
    /// The live-set entry is removed exactly once when the task finishes,
    /// regardless of outcome.
    pub fn track<F, Fut, T>(&self, f: F) -> TrackedTask<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let token = CancellationToken::new();

        lock_live(&self.live).insert(id, token.clone());

        let fut = f(token.clone());
        let live = Arc::clone(&self.live);
        let handle = tokio::spawn(async move {
            let _guard = LiveGuard { id, live };
            fut.await
        });

        TrackedTask {
            id,
            cancel: token,
            handle,
        }
    }

    /// Request cancellation of every currently live task.
    ///
    /// Returns the number of tasks signalled. Tasks whose token was already
    /// cancelled are not counted again, and a task finishing concurrently
    /// with the sweep is harmless — cancelling its token is a no-op.
    pub fn cancel_all(&self) -> usize {
        let tokens: Vec<CancellationToken> = lock_live(&self.live).values().cloned().collect();

        let mut signalled = 0;
        for token in tokens {
            if !token.is_cancelled() {
                token.cancel();
                signalled += 1;
            }
        }
        if signalled > 0 {
            tracing::info!(cancelled = signalled, "Cancelled live tasks");
        }
        signalled
    }

    /// Number of currently live tasks.
    pub fn len(&self) -> usize {
        lock_live(&self.live).len()
    }

    /// Whether no tasks are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}
