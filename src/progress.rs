//! Adaptive progress-reporting throttle shared across concurrent transfers
//!
//! Many in-flight transfers edit status messages through one throttle.
//! Per-transfer state is a single timestamp keyed by the status message
//! id, so concurrent renders never corrupt each other's timers. Updates
//! are suppressed inside a direction- and size-dependent interval, except
//! at 100% which always renders and then evicts the entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::config::ProgressConfig;
use crate::store::StatusReporter;
use crate::types::{StatusId, TransferDirection};
use crate::utils::{readable_duration, readable_size};

/// Filled and unfilled bar cells
const BAR_FILLED: char = '▓';
const BAR_EMPTY: char = '░';

/// Floor for elapsed time in speed computation, avoiding division by zero
const MIN_ELAPSED: Duration = Duration::from_millis(100);

type UpdateMap = Arc<Mutex<HashMap<StatusId, Instant>>>;

/// Throttled progress renderer shared by all concurrent transfers
#[derive(Clone)]
pub struct ProgressThrottle {
    reporter: Arc<dyn StatusReporter>,
    config: ProgressConfig,
    last_update: UpdateMap,
}

fn lock_updates(map: &UpdateMap) -> MutexGuard<'_, HashMap<StatusId, Instant>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ProgressThrottle {
    /// Create a throttle that renders through the given reporter.
    pub fn new(reporter: Arc<dyn StatusReporter>, config: ProgressConfig) -> Self {
        Self {
            reporter,
            config,
            last_update: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Report transfer progress for the status message `status`.
    ///
    /// Decides whether to render, edits the status message if so, and
    /// evicts the transfer's entry once it completes. Edit failures are
    /// swallowed — a deleted status message never aborts a transfer.
    pub async fn report(
        &self,
        status: StatusId,
        label: &str,
        current: u64,
        total: u64,
        direction: TransferDirection,
        started: Instant,
    ) {
        let finished = current >= total;

        if !finished {
            let interval = self.config.interval_for(direction, total);
            let mut updates = lock_updates(&self.last_update);
            if let Some(last) = updates.get(&status)
                && last.elapsed() < interval
            {
                return;
            }
            updates.insert(status, Instant::now());
        }

        let text = render_progress(label, current, total, started.elapsed(), self.config.bar_width);
        if let Err(e) = self.reporter.edit(status, &text).await {
            tracing::debug!(status = status.0, error = %e, "Progress edit failed");
        }

        if finished {
            lock_updates(&self.last_update).remove(&status);
        }
    }

    /// Drop any entry for `status` without rendering (transfer abandoned).
    pub(crate) fn forget(&self, status: StatusId) {
        lock_updates(&self.last_update).remove(&status);
    }

    #[cfg(test)]
    fn has_entry(&self, status: StatusId) -> bool {
        lock_updates(&self.last_update).contains_key(&status)
    }
}

/// Render the progress text: label, bar, percentage, average speed, ETA.
///
/// Speed is averaged over the whole transfer rather than instantaneous,
/// which keeps the ETA stable.
fn render_progress(
    label: &str,
    current: u64,
    total: u64,
    elapsed: Duration,
    bar_width: usize,
) -> String {
    let percentage = if total > 0 {
        (current as f64 / total as f64) * 100.0
    } else {
        100.0
    };

    let elapsed_secs = elapsed.max(MIN_ELAPSED).as_secs_f64();
    let speed = current as f64 / elapsed_secs;
    let eta_secs = if speed > 0.0 && total > current {
        ((total - current) as f64 / speed) as u64
    } else {
        0
    };

    let filled = ((percentage / 100.0) * bar_width as f64) as usize;
    let filled = filled.min(bar_width);
    let mut bar = String::with_capacity(bar_width * BAR_FILLED.len_utf8());
    for _ in 0..filled {
        bar.push(BAR_FILLED);
    }
    for _ in filled..bar_width {
        bar.push(BAR_EMPTY);
    }

    format!(
        "{label}\n{bar}\nPercentage: {percentage:.2}% | {current_size}/{total_size}\n\
         Speed: {speed_size}/s\nEstimated Time Left: {eta}",
        current_size = readable_size(current),
        total_size = readable_size(total),
        speed_size = readable_size(speed as u64),
        eta = readable_duration(eta_secs),
    )
}

/// Narrow progress interface injected into store download/upload calls
///
/// Bundles the throttle with the transfer's identity so the store client
/// only ever sees `update(current, total)`.
#[derive(Clone)]
pub struct ProgressHandle {
    throttle: ProgressThrottle,
    status: StatusId,
    label: String,
    direction: TransferDirection,
    started: Instant,
}

impl ProgressHandle {
    /// Bind a throttle to one transfer.
    pub fn new(
        throttle: ProgressThrottle,
        status: StatusId,
        label: impl Into<String>,
        direction: TransferDirection,
        started: Instant,
    ) -> Self {
        Self {
            throttle,
            status,
            label: label.into(),
            direction,
            started,
        }
    }

    /// Report the transfer's current position.
    pub async fn update(&self, current: u64, total: u64) {
        self.throttle
            .report(
                self.status,
                &self.label,
                current,
                total,
                self.direction,
                self.started,
            )
            .await;
    }

    /// The status message this handle renders into.
    pub fn status(&self) -> StatusId {
        self.status
    }
}
