//! Media probing and thumbnail extraction via external binaries
//!
//! Both operations are fail-soft: absent metadata is a valid outcome, not
//! an error. A missing or broken prober degrades uploads (no duration, no
//! thumbnail) but never fails them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

/// Metadata probed from a downloaded media file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MediaInfo {
    /// Container duration in seconds, if declared
    pub duration_secs: Option<f64>,

    /// Artist tag, if present
    pub artist: Option<String>,

    /// Title tag, if present
    pub title: Option<String>,

    /// Width of the first video stream, if any
    pub width: Option<u32>,

    /// Height of the first video stream, if any
    pub height: Option<u32>,
}

/// Abstraction over media probing, enabling testability
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Probe duration, tags, and dimensions from a local file.
    async fn probe(&self, path: &Path) -> MediaInfo;

    /// Extract a single frame at `at` seconds into the file, returning the
    /// written image path, or `None` if extraction failed or timed out.
    async fn extract_frame(&self, path: &Path, at: Duration) -> Option<PathBuf>;

    /// Name of the prober implementation.
    fn name(&self) -> &'static str;
}

/// CLI-based prober using external ffprobe and ffmpeg binaries
pub struct CliMediaProber {
    ffprobe_path: PathBuf,
    ffmpeg_path: PathBuf,
    frame_timeout: Duration,
}

impl CliMediaProber {
    /// Create a prober with explicit binary paths.
    pub fn new(ffprobe_path: PathBuf, ffmpeg_path: PathBuf, frame_timeout: Duration) -> Self {
        Self {
            ffprobe_path,
            ffmpeg_path,
            frame_timeout,
        }
    }

    /// Attempt to find ffprobe and ffmpeg in PATH.
    ///
    /// Returns `None` unless both binaries are found.
    pub fn from_path(frame_timeout: Duration) -> Option<Self> {
        let ffprobe = which::which("ffprobe").ok()?;
        let ffmpeg = which::which("ffmpeg").ok()?;
        Some(Self::new(ffprobe, ffmpeg, frame_timeout))
    }
}

#[async_trait]
impl MediaProber for CliMediaProber {
    async fn probe(&self, path: &Path) -> MediaInfo {
        let output = Command::new(&self.ffprobe_path)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(path)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => parse_probe_output(&out.stdout),
            Ok(out) => {
                tracing::debug!(
                    path = %path.display(),
                    stderr = %String::from_utf8_lossy(&out.stderr),
                    "ffprobe exited non-zero"
                );
                MediaInfo::default()
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Failed to execute ffprobe");
                MediaInfo::default()
            }
        }
    }

    async fn extract_frame(&self, path: &Path, at: Duration) -> Option<PathBuf> {
        let stem = path.file_stem()?.to_string_lossy();
        let output_path = path.with_file_name(format!("{stem}_frame.jpg"));

        let run = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-ss")
            .arg(format!("{:.2}", at.as_secs_f64()))
            .arg("-i")
            .arg(path)
            .arg("-vframes")
            .arg("1")
            .arg("-q:v")
            .arg("2")
            .arg("-y")
            .arg(&output_path)
            .output();

        // The extraction timeout is independent of any per-item timing; a
        // stuck ffmpeg never stalls the upload beyond this bound.
        let output = match tokio::time::timeout(self.frame_timeout, run).await {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to execute ffmpeg");
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    path = %path.display(),
                    timeout_secs = self.frame_timeout.as_secs(),
                    "Thumbnail extraction timed out"
                );
                return None;
            }
        };

        if !output.status.success() || !output_path.exists() {
            tracing::warn!(
                path = %path.display(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "Thumbnail extraction failed"
            );
            return None;
        }
        Some(output_path)
    }

    fn name(&self) -> &'static str {
        "cli-ffmpeg"
    }
}

/// Prober that reports no metadata and extracts no frames
///
/// Used when the external binaries are not configured or not found.
pub struct NoOpProber;

#[async_trait]
impl MediaProber for NoOpProber {
    async fn probe(&self, _path: &Path) -> MediaInfo {
        MediaInfo::default()
    }

    async fn extract_frame(&self, _path: &Path, _at: Duration) -> Option<PathBuf> {
        None
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Select the best available prober for the given configuration.
///
/// Explicitly configured binary paths win; otherwise PATH is searched when
/// allowed. Falls back to [`NoOpProber`] so a missing toolchain degrades
/// uploads instead of failing construction.
pub fn prober_from_config(media: &crate::config::MediaConfig) -> std::sync::Arc<dyn MediaProber> {
    let timeout = media.thumbnail_timeout();
    match (&media.ffprobe_path, &media.ffmpeg_path) {
        (Some(ffprobe), Some(ffmpeg)) => std::sync::Arc::new(CliMediaProber::new(
            ffprobe.clone(),
            ffmpeg.clone(),
            timeout,
        )),
        _ if media.search_path => CliMediaProber::from_path(timeout)
            .map(|prober| std::sync::Arc::new(prober) as std::sync::Arc<dyn MediaProber>)
            .unwrap_or_else(|| std::sync::Arc::new(NoOpProber)),
        _ => std::sync::Arc::new(NoOpProber),
    }
}

/// Parse ffprobe's JSON output into a [`MediaInfo`].
///
/// Any shape mismatch degrades to defaults; probing never errors.
fn parse_probe_output(stdout: &[u8]) -> MediaInfo {
    let data: serde_json::Value = match serde_json::from_slice(stdout) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse ffprobe output");
            return MediaInfo::default();
        }
    };

    let format = &data["format"];
    let duration_secs = format["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| *d > 0.0);

    // Tag casing varies by container
    let tags = &format["tags"];
    let tag = |names: &[&str]| {
        names
            .iter()
            .find_map(|n| tags[*n].as_str())
            .map(str::to_string)
    };
    let artist = tag(&["artist", "ARTIST", "Artist"]);
    let title = tag(&["title", "TITLE", "Title"]);

    let video_stream = data["streams"]
        .as_array()
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s["codec_type"].as_str() == Some("video"))
        });
    let width = video_stream
        .and_then(|s| s["width"].as_u64())
        .map(|w| w as u32);
    let height = video_stream
        .and_then(|s| s["height"].as_u64())
        .map(|h| h as u32);

    MediaInfo {
        duration_secs,
        artist,
        title,
        width,
        height,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_probe_output() {
        let json = br#"{
            "format": {
                "duration": "12.480000",
                "tags": {"ARTIST": "Someone", "title": "A Track"}
            },
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 1280, "height": 720}
            ]
        }"#;

        let info = parse_probe_output(json);
        assert_eq!(info.duration_secs, Some(12.48));
        assert_eq!(info.artist.as_deref(), Some("Someone"));
        assert_eq!(info.title.as_deref(), Some("A Track"));
        assert_eq!(info.width, Some(1280));
        assert_eq!(info.height, Some(720));
    }

    #[test]
    fn parse_picks_first_video_stream() {
        let json = br#"{
            "format": {},
            "streams": [
                {"codec_type": "video", "width": 640, "height": 480},
                {"codec_type": "video", "width": 1920, "height": 1080}
            ]
        }"#;

        let info = parse_probe_output(json);
        assert_eq!(info.width, Some(640));
        assert_eq!(info.height, Some(480));
    }

    #[test]
    fn parse_zero_duration_is_treated_as_unknown() {
        let json = br#"{"format": {"duration": "0"}, "streams": []}"#;
        assert_eq!(parse_probe_output(json).duration_secs, None);
    }

    #[test]
    fn parse_garbage_degrades_to_defaults() {
        assert_eq!(parse_probe_output(b"not json"), MediaInfo::default());
        assert_eq!(parse_probe_output(b"{}"), MediaInfo::default());
        assert_eq!(
            parse_probe_output(br#"{"format": {"duration": "abc"}}"#),
            MediaInfo::default()
        );
    }

    #[test]
    fn from_path_returns_none_for_missing_binaries() {
        // Only meaningful when at least one of the binaries is absent; the
        // which lookup itself is what we exercise here.
        let missing = which::which("nonexistent-ffprobe-binary-xyz");
        assert!(missing.is_err());
    }

    #[test]
    fn prober_selection_honors_explicit_paths_and_search_flag() {
        let mut media = crate::config::MediaConfig::default();

        media.ffprobe_path = Some(PathBuf::from("/opt/ffprobe"));
        media.ffmpeg_path = Some(PathBuf::from("/opt/ffmpeg"));
        assert_eq!(
            prober_from_config(&media).name(),
            "cli-ffmpeg",
            "explicit binary paths must select the CLI prober without a PATH search"
        );

        media.ffprobe_path = None;
        media.ffmpeg_path = None;
        media.search_path = false;
        assert_eq!(
            prober_from_config(&media).name(),
            "noop",
            "with no paths and PATH search disabled, probing is a no-op"
        );
    }

    #[tokio::test]
    async fn noop_prober_reports_nothing() {
        let prober = NoOpProber;
        let info = prober.probe(Path::new("/tmp/whatever.mp4")).await;
        assert_eq!(info, MediaInfo::default());
        assert!(
            prober
                .extract_frame(Path::new("/tmp/whatever.mp4"), Duration::from_secs(1))
                .await
                .is_none()
        );
        assert_eq!(prober.name(), "noop");
    }
}
