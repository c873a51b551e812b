//! Core relay engine split into focused submodules.
//!
//! The `MediaRelay` struct and its methods are organized by domain:
//! - [`batch`] - Chunked batch execution and result accounting
//! - [`control`] - Global cancellation and shutdown
//! - [`session`] - Conversational batch state per requester
//! - [`item_task`] - Per-item relay/download/upload state machine

mod batch;
mod control;
mod item_task;
mod session;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use session::{BatchPrompt, SessionAdvance};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gate::TransferGate;
use crate::probe::MediaProber;
use crate::progress::ProgressThrottle;
use crate::store::{MessageStore, StatusReporter};
use crate::tracker::{TaskTracker, TrackedTask};
use crate::types::{
    AccountTier, BatchReport, ChatRef, Event, ItemOutcome, RequesterId, TransferDirection,
};

/// Live work and admission state
#[derive(Clone)]
pub(crate) struct WorkState {
    /// Registry of live item and batch tasks (for global cancellation)
    pub(crate) tracker: TaskTracker,
    /// Admission gate limiting concurrent transfers (respects max_concurrent_transfers config)
    pub(crate) gate: TransferGate,
    /// Flag to indicate whether new work is accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

type SessionMap = Arc<Mutex<HashMap<RequesterId, session::BatchSession>>>;

/// Request to retrieve a single item
#[derive(Clone, Debug)]
pub struct ItemRequest {
    /// Message link as given by the requester
    pub reference: String,
    /// Destination container for the relayed or re-uploaded content
    pub destination: ChatRef,
    /// Account tier governing size limits
    pub tier: AccountTier,
}

/// Request to retrieve a contiguous range of items
#[derive(Clone, Debug)]
pub struct BatchRequest {
    /// Link to the first message of the range
    pub start_reference: String,
    /// Number of messages to process, starting at the first
    pub count: u32,
    /// Destination container for the relayed or re-uploaded content
    pub destination: ChatRef,
    /// Account tier governing size limits
    pub tier: AccountTier,
}

/// Main relay engine instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaRelay {
    /// Remote content-store client
    pub(crate) store: Arc<dyn MessageStore>,
    /// Status message and reply surface
    pub(crate) reporter: Arc<dyn StatusReporter>,
    /// Media prober for duration/dimensions/tags and thumbnails
    pub(crate) prober: Arc<dyn MediaProber>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Live work and admission state
    pub(crate) state: WorkState,
    /// Shared progress throttle for all in-flight transfers
    pub(crate) progress: ProgressThrottle,
    /// Conversational batch sessions keyed by requester
    pub(crate) sessions: SessionMap,
}

impl MediaRelay {
    /// Create a new MediaRelay instance
    ///
    /// Validates the configuration, creates the temp directory, and wires
    /// the worker gate, task tracker, progress throttle, and event channel.
    pub async fn new(
        store: Arc<dyn MessageStore>,
        reporter: Arc<dyn StatusReporter>,
        prober: Arc<dyn MediaProber>,
        config: Config,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.transfer.temp_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create temp directory '{}': {}",
                        config.transfer.temp_dir.display(),
                        e
                    ),
                ))
            })?;

        // Broadcast channel with buffer size of 1000 events, so multiple
        // subscribers receive all events independently
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let gate = TransferGate::new(config.transfer.max_concurrent_transfers);

        tracing::info!(
            max_concurrent_transfers = config.transfer.max_concurrent_transfers,
            chunk_size = config.transfer.chunk_size,
            prober = prober.name(),
            "Relay engine initialized"
        );

        Ok(Self {
            store,
            reporter: Arc::clone(&reporter),
            prober,
            progress: ProgressThrottle::new(reporter, config.progress.clone()),
            config: Arc::new(config),
            event_tx,
            state: WorkState {
                tracker: TaskTracker::new(),
                gate,
                accepting_new: Arc::new(AtomicBool::new(true)),
            },
            sessions: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Subscribe to relay events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all
    /// events independently. Events are buffered, but a subscriber falling
    /// behind by more than 1000 events receives a `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Whether a transfer of `bytes` is allowed for the direction and tier.
    pub fn check_size_limit(
        &self,
        bytes: u64,
        direction: TransferDirection,
        tier: AccountTier,
    ) -> bool {
        self.config.limits.allows(bytes, direction, tier)
    }

    /// Submit a single-item retrieval.
    ///
    /// The item task starts immediately, registered in the live-task set
    /// and gated by the worker pool before any network I/O. The returned
    /// handle can be awaited for the item's terminal outcome or used to
    /// cancel just this item.
    pub fn submit_single(&self, request: ItemRequest) -> Result<TrackedTask<ItemOutcome>> {
        self.ensure_accepting()?;

        let relay = self.clone();
        Ok(self.state.tracker.track(move |cancel| async move {
            let ctx = item_task::ItemTaskContext {
                relay,
                destination: request.destination,
                tier: request.tier,
                cancel,
            };
            item_task::run_item(ctx, item_task::ItemSource::Reference(request.reference)).await
        }))
    }

    /// Submit a batch retrieval over a contiguous message-id range.
    ///
    /// The batch task enumerates the range, dispatches one item task per
    /// message in chunks, and resolves to the final accounting.
    pub fn submit_batch(&self, request: BatchRequest) -> Result<TrackedTask<BatchReport>> {
        self.ensure_accepting()?;

        let relay = self.clone();
        Ok(self
            .state
            .tracker
            .track(move |cancel| async move { relay.run_batch(request, cancel).await }))
    }

    /// Number of currently live tasks (items and batches).
    pub fn live_tasks(&self) -> usize {
        self.state.tracker.len()
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.state.accepting_new.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

/// Sleep for `duration`, returning early when the token fires.
///
/// Returns `true` if the full sleep elapsed, `false` on cancellation.
pub(crate) async fn sleep_unless_cancelled(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
