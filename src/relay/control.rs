//! Global lifecycle control — cancel-all and graceful shutdown.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::Result;
use crate::types::Event;

use super::MediaRelay;

/// Polling interval while waiting for cancelled tasks to settle
const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long shutdown waits for live tasks to finish their cleanup
const SETTLE_GRACE: Duration = Duration::from_secs(5);

impl MediaRelay {
    /// Request cancellation of every live task.
    ///
    /// Cancellation is cooperative: each task observes its token at the
    /// next checkpoint and still runs its cleanup (temp files, status
    /// messages) before it counts as finished. Conversational batch
    /// sessions are discarded as well, so a half-entered batch does not
    /// launch after the sweep.
    ///
    /// Returns the number of tasks signalled.
    pub fn cancel_all(&self) -> usize {
        {
            let mut sessions = self
                .sessions
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !sessions.is_empty() {
                tracing::debug!(sessions = sessions.len(), "Discarding batch sessions");
                sessions.clear();
            }
        }

        let cancelled = self.state.tracker.cancel_all();
        self.emit_event(Event::TasksCancelled { count: cancelled });
        cancelled
    }

    /// Gracefully shut the engine down.
    ///
    /// Stops accepting new work, closes the admission gate so queued
    /// waiters fail fast, cancels all live tasks, and waits a bounded
    /// grace period for them to finish cleanup.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down relay engine");
        self.state.accepting_new.store(false, Ordering::SeqCst);
        self.state.gate.close();
        self.cancel_all();

        let deadline = tokio::time::Instant::now() + SETTLE_GRACE;
        while !self.state.tracker.is_empty() {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    remaining = self.state.tracker.len(),
                    "Shutdown grace period elapsed with tasks still live"
                );
                break;
            }
            tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
        }

        self.emit_event(Event::Shutdown);
        Ok(())
    }
}
