//! Utility functions for formatting and scratch-path handling

use std::path::{Path, PathBuf};

use crate::types::{Content, MessageView};

/// Units for human-readable sizes, 1024-based
const SIZE_UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];

/// Render a byte count as a human-readable size (e.g. "1.50 MiB").
#[must_use]
pub fn readable_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.2} {}", value, SIZE_UNITS[unit])
    }
}

/// Render a duration in whole seconds as a compact human-readable string
/// (e.g. "1h 4m 9s"). Zero renders as "0s".
#[must_use]
pub fn readable_duration(total_secs: u64) -> String {
    if total_secs == 0 {
        return "0s".to_string();
    }

    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}

/// Scratch directory for one item, unique per source message.
///
/// Every file an item task writes lives under this directory so cleanup is
/// a single recursive delete.
#[must_use]
pub fn item_scratch_dir(temp_dir: &Path, view: &MessageView) -> PathBuf {
    temp_dir.join(format!("item_{}_{}", view.chat.key(), view.id))
}

/// Default local filename for a message's media, by content kind.
#[must_use]
pub fn default_file_name(view: &MessageView) -> String {
    match view.content {
        Content::Photo { .. } => format!("photo_{}.jpg", view.id),
        Content::Video { .. } => format!("video_{}.mp4", view.id),
        Content::Audio { .. } => format!("audio_{}.mp3", view.id),
        Content::Document { .. } => format!("document_{}.bin", view.id),
        Content::Text | Content::Empty => format!("message_{}.txt", view.id),
    }
}

/// Delete an item's scratch directory.
///
/// Idempotent: a directory that is already gone is a no-op; other failures
/// are logged and swallowed so cleanup never masks the real outcome.
pub async fn cleanup_scratch(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "Failed to delete scratch directory");
        }
    }
}
