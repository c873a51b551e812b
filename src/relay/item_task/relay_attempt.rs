//! Direct relay attempt — the optimized path, always tried first.

use crate::store::RelayOutcome;
use crate::types::MessageRef;

use super::context::ItemTaskContext;

/// How the clone attempt resolved
#[derive(Debug, PartialEq, Eq)]
pub(super) enum CloneAttempt {
    /// Content was copied server-side; the item is done
    Done,
    /// Relay was refused or rate limited; take the download path
    FallBack,
    /// Cancelled while waiting out a rate limit
    Cancelled,
}

/// Ask the store to copy the message (or its whole media group) directly
/// to the destination without moving bytes through this process.
///
/// A rate-limit signal is honored with exactly one bounded sleep, after
/// which the item falls through to the download path — the relay itself is
/// not retried. Any other failure also falls through, so restricted
/// content still reaches the destination via download+upload.
pub(super) async fn attempt_direct_relay(
    ctx: &ItemTaskContext,
    source: &MessageRef,
    whole_group: bool,
) -> CloneAttempt {
    let result = ctx
        .store()
        .relay_direct(source, &ctx.destination, whole_group)
        .await;

    match result {
        Ok(RelayOutcome::Relayed) => {
            tracing::info!(source = %source, "Directly relayed message");
            CloneAttempt::Done
        }
        Ok(RelayOutcome::RateLimited(retry_after)) => {
            let wait = retry_after.min(ctx.config().transfer.max_rate_limit_wait());
            tracing::warn!(
                source = %source,
                requested_secs = retry_after.as_secs(),
                wait_secs = wait.as_secs(),
                "Relay rate limited, sleeping before download fallback"
            );
            if !ctx.sleep_unless_cancelled(wait).await {
                return CloneAttempt::Cancelled;
            }
            CloneAttempt::FallBack
        }
        Ok(RelayOutcome::Rejected(reason)) => {
            tracing::info!(source = %source, reason = %reason, "Relay rejected, falling back to download");
            CloneAttempt::FallBack
        }
        Err(e) => {
            tracing::info!(source = %source, error = %e, "Relay failed, falling back to download");
            CloneAttempt::FallBack
        }
    }
}
