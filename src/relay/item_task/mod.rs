//! Per-item state machine — direct relay first, download+upload fallback.
//!
//! Phases of one item task:
//! 1. Resolve the reference (when given as a raw link)
//! 2. Acquire a gate permit — all network I/O happens under it
//! 3. Fetch and classify the message content
//! 4. Attempt the direct relay (server-side copy)
//! 5. On fallback: media group, text re-send, or download+upload
//! 6. Cleanup on every terminal path
//!
//! Errors never escape a tracked item task; they become one user-visible
//! reply and a terminal [`ItemOutcome`].

mod context;
mod media_group;
mod relay_attempt;
mod transfer;

pub(crate) use context::ItemTaskContext;

use crate::types::{Content, Event, ItemOutcome, MessageRef, MessageView};

use relay_attempt::CloneAttempt;

/// How the item to retrieve is identified
pub(crate) enum ItemSource {
    /// A raw link still to be parsed (single-item requests)
    Reference(String),
    /// An already-resolved reference (batch dispatch)
    Resolved(MessageRef),
}

/// Run one item task to its terminal outcome.
pub(crate) async fn run_item(ctx: ItemTaskContext, source: ItemSource) -> ItemOutcome {
    let source = match source {
        ItemSource::Resolved(resolved) => resolved,
        ItemSource::Reference(raw) => match MessageRef::parse(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Item reference did not parse");
                ctx.reply(&format!("{e}")).await;
                return ItemOutcome::Failed;
            }
        },
    };

    ctx.relay.emit_event(Event::ItemStarted {
        source: source.clone(),
    });
    tracing::info!(source = %source, "Processing item");

    let outcome = run_item_inner(&ctx, &source).await;

    tracing::info!(source = %source, ?outcome, "Item finished");
    ctx.relay.emit_event(Event::ItemCompleted { source, outcome });
    outcome
}

async fn run_item_inner(ctx: &ItemTaskContext, source: &MessageRef) -> ItemOutcome {
    // Admission: every item holds one gate permit for its whole lifetime,
    // released on every exit path when the permit drops.
    let _permit = tokio::select! {
        _ = ctx.cancel.cancelled() => return ItemOutcome::Cancelled,
        permit = ctx.relay.state.gate.acquire() => match permit {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!(source = %source, "Gate closed while waiting for a permit");
                return ItemOutcome::Cancelled;
            }
        },
    };

    let view = match ctx.store().fetch_message(&source.chat, source.id).await {
        Ok(Some(view)) => view,
        Ok(None) => {
            ctx.reply(&format!("No message found at {source}.")).await;
            return ItemOutcome::Skipped;
        }
        Err(e) if e.is_user_visible_rejection() => {
            ctx.reply(&format!("Cannot access {source}: {e}")).await;
            return ItemOutcome::Failed;
        }
        Err(e) => {
            tracing::error!(source = %source, error = %e, "Failed to fetch message");
            ctx.reply(&format!("Error fetching {source}: {e}")).await;
            return ItemOutcome::Failed;
        }
    };

    if view.is_empty() {
        ctx.reply(&format!("No media or text found at {source}.")).await;
        return ItemOutcome::Skipped;
    }

    // Direct relay first — it avoids local bandwidth and disk entirely.
    match relay_attempt::attempt_direct_relay(ctx, source, view.media_group.is_some()).await {
        CloneAttempt::Done => {
            ctx.relay.emit_event(Event::ItemRelayed {
                source: source.clone(),
            });
            // Courtesy pacing after a successful action. The content is
            // already delivered, so cancellation here keeps the outcome.
            ctx.sleep_unless_cancelled(ctx.config().transfer.inter_action_delay())
                .await;
            return ItemOutcome::Processed;
        }
        CloneAttempt::Cancelled => return ItemOutcome::Cancelled,
        CloneAttempt::FallBack => {}
    }

    if ctx.cancel.is_cancelled() {
        return ItemOutcome::Cancelled;
    }

    if view.media_group.is_some() {
        return media_group::process_group(ctx, &view).await;
    }

    dispatch_content(ctx, source, &view).await
}

/// Route the fallback by content kind, resolved once per item.
async fn dispatch_content(
    ctx: &ItemTaskContext,
    source: &MessageRef,
    view: &MessageView,
) -> ItemOutcome {
    match view.content {
        Content::Photo { .. }
        | Content::Video { .. }
        | Content::Audio { .. }
        | Content::Document { .. } => transfer::download_and_upload(ctx, view).await,
        Content::Text | Content::Empty => {
            let Some(text) = view.best_text() else {
                // is_empty() filtered this out already
                ctx.reply(&format!("No media or text found at {source}.")).await;
                return ItemOutcome::Skipped;
            };
            match ctx.store().send_text(&ctx.destination, text).await {
                Ok(()) => ItemOutcome::Processed,
                Err(e) => {
                    tracing::error!(source = %source, error = %e, "Failed to re-send text");
                    ctx.reply(&format!("Error at {source}: {e}")).await;
                    ItemOutcome::Failed
                }
            }
        }
    }
}
