//! Item task context — shared state and fail-soft helpers.

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::probe::MediaProber;
use crate::store::{MessageStore, StatusReporter};
use crate::types::{AccountTier, ChatRef, StatusId};
use crate::utils::cleanup_scratch;

use super::super::MediaRelay;

/// Shared context for a single item task, reducing parameter passing
/// between the state-machine helpers.
#[derive(Clone)]
pub(crate) struct ItemTaskContext {
    pub(crate) relay: MediaRelay,
    pub(crate) destination: ChatRef,
    pub(crate) tier: AccountTier,
    pub(crate) cancel: CancellationToken,
}

impl ItemTaskContext {
    pub(crate) fn store(&self) -> &dyn MessageStore {
        self.relay.store.as_ref()
    }

    pub(crate) fn reporter(&self) -> &dyn StatusReporter {
        self.relay.reporter.as_ref()
    }

    pub(crate) fn prober(&self) -> &dyn MediaProber {
        self.relay.prober.as_ref()
    }

    pub(crate) fn config(&self) -> &Config {
        &self.relay.config
    }

    /// Send a one-line reply to the requester, logging on failure.
    ///
    /// Every terminal item outcome produces exactly one reply; a reply the
    /// surface refuses to deliver must not change the outcome.
    pub(crate) async fn reply(&self, text: &str) {
        if let Err(e) = self.reporter().reply(&self.destination, text).await {
            tracing::warn!(destination = %self.destination, error = %e, "Failed to send reply");
        }
    }

    /// Sleep for `duration`, returning `false` if cancelled first.
    pub(crate) async fn sleep_unless_cancelled(&self, duration: Duration) -> bool {
        super::super::sleep_unless_cancelled(&self.cancel, duration).await
    }

    /// Terminal cleanup: delete the item's scratch directory and its
    /// transient status message.
    ///
    /// Runs on every terminal path — success, failure, and cancellation —
    /// and is idempotent.
    pub(crate) async fn cleanup(&self, scratch: &Path, status: Option<StatusId>) {
        cleanup_scratch(scratch).await;
        if let Some(status) = status {
            self.relay.progress.forget(status);
            if let Err(e) = self.reporter().delete(status).await {
                tracing::debug!(status = status.0, error = %e, "Failed to delete status message");
            }
        }
    }
}
