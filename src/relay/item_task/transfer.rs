//! Download+upload fallback for a single media item.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::progress::ProgressHandle;
use crate::store::MediaPayload;
use crate::types::{Content, ItemOutcome, MessageView, TransferDirection};
use crate::utils::{default_file_name, item_scratch_dir, readable_size};

use super::context::ItemTaskContext;

/// Assumed frame dimensions when probing finds none
const FALLBACK_WIDTH: u32 = 640;
const FALLBACK_HEIGHT: u32 = 480;

/// Download a single media item, then re-upload it to the destination.
///
/// The transfer itself runs in an inner function so cleanup (scratch
/// directory and status message) executes on every terminal path,
/// including cancellation mid-transfer.
pub(super) async fn download_and_upload(ctx: &ItemTaskContext, view: &MessageView) -> ItemOutcome {
    let Some(size) = view.content.file_size() else {
        // Callers only route media content here
        return ItemOutcome::Failed;
    };

    if !ctx
        .config()
        .limits
        .allows(size, TransferDirection::Download, ctx.tier)
    {
        ctx.reply(&format!(
            "File of {} at {} is too large to download.",
            readable_size(size),
            view.id
        ))
        .await;
        return ItemOutcome::Failed;
    }

    let status = match ctx
        .reporter()
        .post(&ctx.destination, &format!("📥 Downloading {}…", view.id))
        .await
    {
        Ok(status) => status,
        Err(e) => {
            tracing::error!(message_id = view.id.0, error = %e, "Failed to post status message");
            ctx.reply(&format!("Error processing {}: {e}", view.id)).await;
            return ItemOutcome::Failed;
        }
    };

    let scratch = item_scratch_dir(&ctx.config().transfer.temp_dir, view);
    let result = run_transfer(ctx, view, &scratch, status).await;
    ctx.cleanup(&scratch, Some(status)).await;

    match result {
        Ok(()) => ItemOutcome::Processed,
        Err(Error::Cancelled) => ItemOutcome::Cancelled,
        Err(e) => {
            report_failure(ctx, view, &e).await;
            ItemOutcome::Failed
        }
    }
}

/// The transfer proper: download, integrity check, probe, upload.
async fn run_transfer(
    ctx: &ItemTaskContext,
    view: &MessageView,
    scratch: &Path,
    status: crate::types::StatusId,
) -> Result<()> {
    tokio::fs::create_dir_all(scratch).await?;

    if ctx.cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let started = Instant::now();
    let target = scratch.join(default_file_name(view));
    let progress = ProgressHandle::new(
        ctx.relay.progress.clone(),
        status,
        "📥 Downloading",
        TransferDirection::Download,
        started,
    );
    let path = ctx
        .store()
        .download(view, &target, &progress)
        .await
        .map_err(Error::Store)?;

    let actual_size = verify_download(&path).await?;
    tracing::info!(
        message_id = view.id.0,
        path = %path.display(),
        size = actual_size,
        "Downloaded media"
    );

    if ctx.cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let limits = &ctx.config().limits;
    if !limits.allows(actual_size, TransferDirection::Upload, ctx.tier) {
        return Err(Error::LimitExceeded {
            direction: TransferDirection::Upload,
            size: actual_size,
            limit: limits.max_for(TransferDirection::Upload, ctx.tier),
        });
    }

    let payload = build_payload(ctx, view, path).await;
    let progress = ProgressHandle::new(
        ctx.relay.progress.clone(),
        status,
        "📤 Uploading",
        TransferDirection::Upload,
        started,
    );
    ctx.store()
        .upload(&ctx.destination, &payload, &progress)
        .await
        .map_err(Error::Store)?;

    Ok(())
}

/// Post-download integrity check: the output must exist and be non-empty.
///
/// Returns the actual on-disk size.
pub(super) async fn verify_download(path: &Path) -> Result<u64> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(_) => {
            return Err(Error::TransferIntegrity {
                path: path.to_path_buf(),
                reason: "file was not saved".to_string(),
            });
        }
    };
    if metadata.len() == 0 {
        return Err(Error::TransferIntegrity {
            path: path.to_path_buf(),
            reason: "file is empty".to_string(),
        });
    }
    Ok(metadata.len())
}

/// Build the type-appropriate upload payload, re-probing metadata from the
/// downloaded bytes.
///
/// Probing is fail-soft: missing duration/dimensions degrade to defaults
/// and a missing thumbnail is simply omitted. Captions default to empty.
pub(super) async fn build_payload(
    ctx: &ItemTaskContext,
    view: &MessageView,
    path: PathBuf,
) -> MediaPayload {
    let caption = view.caption.clone().unwrap_or_default();

    match view.content {
        Content::Photo { .. } => MediaPayload::Photo { path, caption },
        Content::Video { .. } => {
            let info = ctx.prober().probe(&path).await;
            let duration = info.duration_secs.unwrap_or(0.0);
            if duration == 0.0 {
                tracing::warn!(path = %path.display(), "Could not probe video duration");
            }

            // Thumbnail frame at half the duration; assume a short clip
            // when probing found nothing.
            let effective = if duration > 0.0 {
                duration
            } else {
                ctx.config().media.fallback_duration_secs as f64
            };
            let thumbnail = ctx
                .prober()
                .extract_frame(&path, Duration::from_secs_f64(effective / 2.0))
                .await;

            MediaPayload::Video {
                path,
                caption,
                duration_secs: duration as u32,
                width: info.width.unwrap_or(FALLBACK_WIDTH),
                height: info.height.unwrap_or(FALLBACK_HEIGHT),
                thumbnail,
            }
        }
        Content::Audio { .. } => {
            let info = ctx.prober().probe(&path).await;
            MediaPayload::Audio {
                path,
                caption,
                duration_secs: info.duration_secs.unwrap_or(0.0) as u32,
                performer: info.artist,
                title: info.title,
            }
        }
        Content::Document { .. } | Content::Text | Content::Empty => {
            MediaPayload::Document { path, caption }
        }
    }
}

/// Convert a transfer error into the item's single user-visible reply.
async fn report_failure(ctx: &ItemTaskContext, view: &MessageView, error: &Error) {
    match error {
        Error::Store(store_err) if store_err.is_user_visible_rejection() => {
            ctx.reply(&format!("Cannot process {}: {store_err}", view.id))
                .await;
        }
        Error::TransferIntegrity { reason, .. } => {
            ctx.reply(&format!("Download failed for {}: {reason}", view.id))
                .await;
        }
        Error::LimitExceeded { size, .. } => {
            ctx.reply(&format!(
                "File of {} at {} is too large to upload.",
                readable_size(*size),
                view.id
            ))
            .await;
        }
        other => {
            tracing::error!(message_id = view.id.0, error = %other, "Item transfer failed");
            ctx.reply(&format!("Error at {}: {other}", view.id)).await;
        }
    }
}
