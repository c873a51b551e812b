//! Bounded admission gate for network-heavy work
//!
//! Every item task must hold a [`TransferPermit`] before performing any
//! network I/O. The gate is the sole concurrency limiter for transfers:
//! batch pacing and progress throttling are independent of it.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Error, Result};

/// Counting admission gate of fixed width
///
/// At most `width` permits are outstanding at any time. Waiters are served
/// in FIFO order by the underlying semaphore, so no waiter starves once
/// ahead-of-queue holders release.
///
/// The width is fixed at construction from configuration; changing it
/// requires constructing a new gate.
#[derive(Clone)]
pub struct TransferGate {
    permits: Arc<Semaphore>,
    width: usize,
}

/// A held unit of the gate's capacity
///
/// Dropping the permit releases it exactly once, on every exit path —
/// normal completion, error return, panic, or cancellation.
#[derive(Debug)]
pub struct TransferPermit {
    _permit: OwnedSemaphorePermit,
}

impl TransferGate {
    /// Create a gate admitting at most `width` concurrent holders.
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(width)),
            width,
        }
    }

    /// Acquire a permit, suspending until fewer than `width` are held.
    ///
    /// Returns [`Error::ShuttingDown`] once the gate has been closed.
    pub async fn acquire(&self) -> Result<TransferPermit> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::ShuttingDown)?;
        Ok(TransferPermit { _permit: permit })
    }

    /// Close the gate: pending and future `acquire` calls fail.
    ///
    /// Permits already held remain valid until dropped.
    pub fn close(&self) {
        self.permits.close();
    }

    /// The configured width of the gate.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of permits currently available.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
