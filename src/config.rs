//! Configuration types for relay-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{AccountTier, TransferDirection};

/// Transfer behavior configuration (temp directory, concurrency, batching)
///
/// Groups settings related to how items are fetched and how batch runs are
/// paced. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Temporary directory for in-flight downloads (default: "./temp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Maximum concurrent transfers — the worker-pool width (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_transfers: usize,

    /// Number of items dispatched per batch chunk (default: 5)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Delay between actions against the remote service, in milliseconds (default: 2000)
    ///
    /// Applied after a successful direct relay and between batch chunks.
    /// This pacing is independent of the worker-pool width.
    #[serde(default = "default_inter_action_delay_ms")]
    pub inter_action_delay_ms: u64,

    /// Upper bound on a single rate-limit sleep, in seconds (default: 60)
    ///
    /// The server-specified backoff is honored up to this cap; after one
    /// sleep the item proceeds to the download fallback rather than
    /// retrying the relay.
    #[serde(default = "default_max_rate_limit_wait_secs")]
    pub max_rate_limit_wait_secs: u64,
}

impl TransferConfig {
    /// Inter-action delay as a [`Duration`].
    pub fn inter_action_delay(&self) -> Duration {
        Duration::from_millis(self.inter_action_delay_ms)
    }

    /// Rate-limit sleep cap as a [`Duration`].
    pub fn max_rate_limit_wait(&self) -> Duration {
        Duration::from_secs(self.max_rate_limit_wait_secs)
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            max_concurrent_transfers: default_max_concurrent(),
            chunk_size: default_chunk_size(),
            inter_action_delay_ms: default_inter_action_delay_ms(),
            max_rate_limit_wait_secs: default_max_rate_limit_wait_secs(),
        }
    }
}

/// Progress reporting configuration (update intervals, bar rendering)
///
/// The update interval adapts to direction and total size: small inbound
/// transfers update every 20s, large ones every 25s; small outbound
/// transfers every 5s, large ones every 9s. All four intervals and both
/// size thresholds are configurable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Width of the rendered progress bar in cells (default: 20)
    #[serde(default = "default_bar_width")]
    pub bar_width: usize,

    /// Update interval for inbound transfers below the size threshold, in seconds (default: 20)
    #[serde(default = "default_download_interval_secs")]
    pub download_interval_secs: u64,

    /// Update interval for inbound transfers at or above the threshold, in seconds (default: 25)
    #[serde(default = "default_download_interval_large_secs")]
    pub download_interval_large_secs: u64,

    /// Size threshold separating small and large inbound transfers (default: 500 MiB)
    #[serde(default = "default_download_large_threshold")]
    pub download_large_threshold_bytes: u64,

    /// Update interval for outbound transfers below the size threshold, in seconds (default: 5)
    #[serde(default = "default_upload_interval_secs")]
    pub upload_interval_secs: u64,

    /// Update interval for outbound transfers at or above the threshold, in seconds (default: 9)
    #[serde(default = "default_upload_interval_large_secs")]
    pub upload_interval_large_secs: u64,

    /// Size threshold separating small and large outbound transfers (default: 300 MiB)
    #[serde(default = "default_upload_large_threshold")]
    pub upload_large_threshold_bytes: u64,
}

impl ProgressConfig {
    /// The suppression interval for a transfer of `total` bytes in the given direction.
    pub fn interval_for(&self, direction: TransferDirection, total: u64) -> Duration {
        let secs = match direction {
            TransferDirection::Download => {
                if total < self.download_large_threshold_bytes {
                    self.download_interval_secs
                } else {
                    self.download_interval_large_secs
                }
            }
            TransferDirection::Upload => {
                if total < self.upload_large_threshold_bytes {
                    self.upload_interval_secs
                } else {
                    self.upload_interval_large_secs
                }
            }
        };
        Duration::from_secs(secs)
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            bar_width: default_bar_width(),
            download_interval_secs: default_download_interval_secs(),
            download_interval_large_secs: default_download_interval_large_secs(),
            download_large_threshold_bytes: default_download_large_threshold(),
            upload_interval_secs: default_upload_interval_secs(),
            upload_interval_large_secs: default_upload_interval_large_secs(),
            upload_large_threshold_bytes: default_upload_large_threshold(),
        }
    }
}

/// Transfer size limits per direction and account tier
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Download limit for standard accounts, in bytes (default: 2 GiB)
    #[serde(default = "default_standard_limit")]
    pub download_limit_bytes: u64,

    /// Download limit for premium accounts, in bytes (default: 4 GiB)
    #[serde(default = "default_premium_limit")]
    pub download_limit_premium_bytes: u64,

    /// Upload limit for standard accounts, in bytes (default: 2 GiB)
    #[serde(default = "default_standard_limit")]
    pub upload_limit_bytes: u64,

    /// Upload limit for premium accounts, in bytes (default: 4 GiB)
    #[serde(default = "default_premium_limit")]
    pub upload_limit_premium_bytes: u64,
}

impl LimitsConfig {
    /// The applicable limit for a direction and account tier.
    pub fn max_for(&self, direction: TransferDirection, tier: AccountTier) -> u64 {
        match (direction, tier) {
            (TransferDirection::Download, AccountTier::Standard) => self.download_limit_bytes,
            (TransferDirection::Download, AccountTier::Premium) => {
                self.download_limit_premium_bytes
            }
            (TransferDirection::Upload, AccountTier::Standard) => self.upload_limit_bytes,
            (TransferDirection::Upload, AccountTier::Premium) => self.upload_limit_premium_bytes,
        }
    }

    /// Whether a transfer of `bytes` is allowed for the direction and tier.
    pub fn allows(&self, bytes: u64, direction: TransferDirection, tier: AccountTier) -> bool {
        bytes <= self.max_for(direction, tier)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            download_limit_bytes: default_standard_limit(),
            download_limit_premium_bytes: default_premium_limit(),
            upload_limit_bytes: default_standard_limit(),
            upload_limit_premium_bytes: default_premium_limit(),
        }
    }
}

/// Media probing and thumbnail configuration (external ffprobe/ffmpeg)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to the ffprobe executable (auto-detected if None)
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Path to the ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for the binaries if explicit paths are not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Timeout for thumbnail extraction, in seconds (default: 60)
    ///
    /// Independent of any per-item timing; a stuck extraction never stalls
    /// the upload for longer than this.
    #[serde(default = "default_thumbnail_timeout_secs")]
    pub thumbnail_timeout_secs: u64,

    /// Assumed video duration when probing finds none, in seconds (default: 3)
    ///
    /// The thumbnail frame is taken at half the duration.
    #[serde(default = "default_fallback_duration_secs")]
    pub fallback_duration_secs: u64,
}

impl MediaConfig {
    /// Thumbnail extraction timeout as a [`Duration`].
    pub fn thumbnail_timeout(&self) -> Duration {
        Duration::from_secs(self.thumbnail_timeout_secs)
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: None,
            ffmpeg_path: None,
            search_path: true,
            thumbnail_timeout_secs: default_thumbnail_timeout_secs(),
            fallback_duration_secs: default_fallback_duration_secs(),
        }
    }
}

/// Main configuration for [`MediaRelay`](crate::MediaRelay)
///
/// Fields are organized into logical sub-configs:
/// - [`transfer`](TransferConfig) — temp directory, concurrency, batch pacing
/// - [`progress`](ProgressConfig) — update intervals and bar rendering
/// - [`limits`](LimitsConfig) — size limits per direction and tier
/// - [`media`](MediaConfig) — external prober binaries and thumbnails
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Transfer behavior settings
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Progress reporting settings
    #[serde(default)]
    pub progress: ProgressConfig,

    /// Transfer size limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Media probing settings
    #[serde(default)]
    pub media: MediaConfig,
}

impl Config {
    /// Validate the configuration, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.transfer.max_concurrent_transfers == 0 {
            return Err(Error::Config {
                message: "max_concurrent_transfers must be at least 1".to_string(),
                key: Some("transfer.max_concurrent_transfers".to_string()),
            });
        }
        if self.transfer.chunk_size == 0 {
            return Err(Error::Config {
                message: "chunk_size must be at least 1".to_string(),
                key: Some("transfer.chunk_size".to_string()),
            });
        }
        if self.progress.bar_width == 0 {
            return Err(Error::Config {
                message: "bar_width must be at least 1".to_string(),
                key: Some("progress.bar_width".to_string()),
            });
        }
        Ok(())
    }
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./temp")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_chunk_size() -> usize {
    5
}

fn default_inter_action_delay_ms() -> u64 {
    2_000
}

fn default_max_rate_limit_wait_secs() -> u64 {
    60
}

fn default_bar_width() -> usize {
    20
}

fn default_download_interval_secs() -> u64 {
    20
}

fn default_download_interval_large_secs() -> u64 {
    25
}

fn default_download_large_threshold() -> u64 {
    500 * 1024 * 1024
}

fn default_upload_interval_secs() -> u64 {
    5
}

fn default_upload_interval_large_secs() -> u64 {
    9
}

fn default_upload_large_threshold() -> u64 {
    300 * 1024 * 1024
}

fn default_standard_limit() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_premium_limit() -> u64 {
    4 * 1024 * 1024 * 1024
}

fn default_thumbnail_timeout_secs() -> u64 {
    60
}

fn default_fallback_duration_secs() -> u64 {
    3
}

fn default_true() -> bool {
    true
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.transfer.max_concurrent_transfers, 3);
        assert_eq!(config.transfer.chunk_size, 5);
        assert_eq!(config.progress.bar_width, 20);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = Config::default();
        config.transfer.max_concurrent_transfers = 0;
        let err = config.validate().unwrap_err();
        match err {
            Error::Config { key, .. } => {
                assert_eq!(key.as_deref(), Some("transfer.max_concurrent_transfers"));
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut config = Config::default();
        config.transfer.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_bar_width_is_rejected() {
        let mut config = Config::default();
        config.progress.bar_width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn progress_interval_adapts_to_direction_and_size() {
        let progress = ProgressConfig::default();

        assert_eq!(
            progress.interval_for(TransferDirection::Download, 100 * 1024 * 1024),
            Duration::from_secs(20),
            "small downloads update every 20s"
        );
        assert_eq!(
            progress.interval_for(TransferDirection::Download, 600 * 1024 * 1024),
            Duration::from_secs(25),
            "large downloads update every 25s"
        );
        assert_eq!(
            progress.interval_for(TransferDirection::Upload, 100 * 1024 * 1024),
            Duration::from_secs(5),
            "small uploads update every 5s"
        );
        assert_eq!(
            progress.interval_for(TransferDirection::Upload, 400 * 1024 * 1024),
            Duration::from_secs(9),
            "large uploads update every 9s"
        );
    }

    #[test]
    fn progress_interval_threshold_is_inclusive_on_large_side() {
        let progress = ProgressConfig::default();
        assert_eq!(
            progress.interval_for(
                TransferDirection::Download,
                progress.download_large_threshold_bytes
            ),
            Duration::from_secs(progress.download_interval_large_secs),
            "a transfer exactly at the threshold counts as large"
        );
    }

    #[test]
    fn limits_respect_direction_and_tier() {
        let limits = LimitsConfig::default();

        assert!(limits.allows(1024, TransferDirection::Download, AccountTier::Standard));
        assert!(
            !limits.allows(
                3 * 1024 * 1024 * 1024,
                TransferDirection::Download,
                AccountTier::Standard
            ),
            "3 GiB exceeds the 2 GiB standard limit"
        );
        assert!(
            limits.allows(
                3 * 1024 * 1024 * 1024,
                TransferDirection::Upload,
                AccountTier::Premium
            ),
            "3 GiB is within the 4 GiB premium limit"
        );
    }

    #[test]
    fn limit_boundary_is_inclusive() {
        let limits = LimitsConfig::default();
        let max = limits.max_for(TransferDirection::Download, AccountTier::Standard);
        assert!(
            limits.allows(max, TransferDirection::Download, AccountTier::Standard),
            "a transfer exactly at the limit is allowed"
        );
        assert!(!limits.allows(max + 1, TransferDirection::Download, AccountTier::Standard));
    }

    #[test]
    fn config_survives_json_round_trip() {
        let mut original = Config::default();
        original.transfer.max_concurrent_transfers = 7;
        original.transfer.chunk_size = 11;
        original.progress.upload_interval_secs = 4;
        original.limits.download_limit_bytes = 123_456;
        original.media.thumbnail_timeout_secs = 30;

        let json = serde_json::to_string(&original).unwrap();
        let restored: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(
            restored.transfer.max_concurrent_transfers,
            original.transfer.max_concurrent_transfers
        );
        assert_eq!(restored.transfer.chunk_size, original.transfer.chunk_size);
        assert_eq!(
            restored.progress.upload_interval_secs,
            original.progress.upload_interval_secs
        );
        assert_eq!(
            restored.limits.download_limit_bytes,
            original.limits.download_limit_bytes
        );
        assert_eq!(
            restored.media.thumbnail_timeout_secs,
            original.media.thumbnail_timeout_secs
        );
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.transfer.max_concurrent_transfers, 3);
        assert_eq!(config.transfer.inter_action_delay_ms, 2_000);
        assert_eq!(config.progress.download_interval_secs, 20);
        assert_eq!(config.media.thumbnail_timeout_secs, 60);
        assert!(config.media.search_path);
    }

    #[test]
    fn duration_accessors_convert_units() {
        let transfer = TransferConfig::default();
        assert_eq!(transfer.inter_action_delay(), Duration::from_millis(2_000));
        assert_eq!(transfer.max_rate_limit_wait(), Duration::from_secs(60));

        let media = MediaConfig::default();
        assert_eq!(media.thumbnail_timeout(), Duration::from_secs(60));
    }
}
