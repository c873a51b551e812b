//! Media-group handling — concurrent member downloads, one album send,
//! per-item fallback when the album is refused.

use std::path::Path;
use std::time::Instant;

use futures::stream::{self, StreamExt};

use crate::progress::ProgressHandle;
use crate::store::MediaPayload;
use crate::types::{ItemOutcome, MessageView, StatusId, TransferDirection};
use crate::utils::{default_file_name, item_scratch_dir};

use super::context::ItemTaskContext;
use super::transfer::{build_payload, verify_download};

/// Process a message that belongs to a media group.
///
/// All constituents download concurrently into the item's scratch
/// directory and are assembled into a single album send. Members that fail
/// to produce a valid file are dropped without blocking the valid ones.
pub(super) async fn process_group(ctx: &ItemTaskContext, view: &MessageView) -> ItemOutcome {
    let members = match ctx.store().fetch_media_group(&view.chat, view.id).await {
        Ok(members) => members,
        Err(e) => {
            tracing::error!(message_id = view.id.0, error = %e, "Failed to fetch media group");
            ctx.reply(&format!("Error fetching media group at {}: {e}", view.id))
                .await;
            return ItemOutcome::Failed;
        }
    };

    let media: Vec<MessageView> = members
        .into_iter()
        .filter(|member| member.content.is_media())
        .collect();
    if media.is_empty() {
        ctx.reply("No valid media found in the media group.").await;
        return ItemOutcome::Failed;
    }

    let status = match ctx
        .reporter()
        .post(
            &ctx.destination,
            &format!("📥 Downloading media group ({} items)…", media.len()),
        )
        .await
    {
        Ok(status) => status,
        Err(e) => {
            tracing::error!(message_id = view.id.0, error = %e, "Failed to post status message");
            ctx.reply(&format!("Error processing {}: {e}", view.id)).await;
            return ItemOutcome::Failed;
        }
    };

    tracing::info!(
        message_id = view.id.0,
        members = media.len(),
        "Downloading media group"
    );

    let scratch = item_scratch_dir(&ctx.config().transfer.temp_dir, view);
    if let Err(e) = tokio::fs::create_dir_all(&scratch).await {
        tracing::error!(error = %e, "Failed to create scratch directory");
        ctx.cleanup(&scratch, Some(status)).await;
        ctx.reply(&format!("Error processing {}: {e}", view.id)).await;
        return ItemOutcome::Failed;
    }

    let started = Instant::now();
    let fan_out = media.len();
    let payloads: Vec<Option<MediaPayload>> = stream::iter(media)
        .map(|member| {
            let ctx = ctx.clone();
            let scratch = scratch.clone();
            async move { download_member(&ctx, &member, &scratch, status, started).await }
        })
        .buffer_unordered(fan_out)
        .collect()
        .await;
    let valid: Vec<MediaPayload> = payloads.into_iter().flatten().collect();

    if ctx.cancel.is_cancelled() {
        ctx.cleanup(&scratch, Some(status)).await;
        return ItemOutcome::Cancelled;
    }

    if valid.is_empty() {
        ctx.cleanup(&scratch, Some(status)).await;
        ctx.reply("Could not download any valid media from the media group.")
            .await;
        return ItemOutcome::Failed;
    }

    if let Err(e) = ctx.store().send_album(&ctx.destination, &valid).await {
        tracing::warn!(message_id = view.id.0, error = %e, "Album send failed, trying individual uploads");
        ctx.reply("Failed to send the album, falling back to individual uploads.")
            .await;

        for payload in &valid {
            if ctx.cancel.is_cancelled() {
                ctx.cleanup(&scratch, Some(status)).await;
                return ItemOutcome::Cancelled;
            }
            let progress = ProgressHandle::new(
                ctx.relay.progress.clone(),
                status,
                "📤 Uploading",
                TransferDirection::Upload,
                started,
            );
            if let Err(e) = ctx
                .store()
                .upload(&ctx.destination, payload, &progress)
                .await
            {
                ctx.reply(&format!("Failed to upload one group item: {e}"))
                    .await;
            }
        }
    }

    ctx.cleanup(&scratch, Some(status)).await;
    ItemOutcome::Processed
}

/// Download one group member and build its upload payload.
///
/// Returns `None` on any failure — the member is dropped and the rest of
/// the group proceeds.
async fn download_member(
    ctx: &ItemTaskContext,
    member: &MessageView,
    scratch: &Path,
    status: StatusId,
    started: Instant,
) -> Option<MediaPayload> {
    if ctx.cancel.is_cancelled() {
        return None;
    }

    let target = scratch.join(default_file_name(member));
    let progress = ProgressHandle::new(
        ctx.relay.progress.clone(),
        status,
        "📥 Downloading",
        TransferDirection::Download,
        started,
    );

    let path = match ctx.store().download(member, &target, &progress).await {
        Ok(path) => path,
        Err(e) => {
            tracing::info!(message_id = member.id.0, error = %e, "Group member download failed");
            return None;
        }
    };

    match verify_download(&path).await {
        Ok(_) => Some(build_payload(ctx, member, path).await),
        Err(e) => {
            // The broken file lives inside the scratch dir and is removed
            // with it at cleanup.
            tracing::info!(message_id = member.id.0, error = %e, "Group member failed integrity check");
            None
        }
    }
}
