//! # relay-dl
//!
//! Configurable backend library for relaying and mirroring media from
//! remote message stores.
//!
//! ## Design Philosophy
//!
//! relay-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Store-agnostic** - The remote service is reached only through the
//!   [`MessageStore`]/[`StatusReporter`] traits supplied by the embedder
//! - **Relay-first** - Every item tries the server-side copy before
//!   spending local bandwidth and disk on a download+upload
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use relay_dl::{AccountTier, ChatRef, Config, ItemRequest, MediaRelay, NoOpProber};
//! # use relay_dl::{MessageStore, StatusReporter};
//!
//! # async fn example(store: Arc<dyn MessageStore>, reporter: Arc<dyn StatusReporter>)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let relay = MediaRelay::new(store, reporter, Arc::new(NoOpProber), Config::default()).await?;
//!
//! // Subscribe to events
//! let mut events = relay.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! let task = relay.submit_single(ItemRequest {
//!     reference: "https://t.me/somechannel/120".to_string(),
//!     destination: ChatRef::Internal(42),
//!     tier: AccountTier::Standard,
//! })?;
//! let outcome = task.join().await?;
//! println!("Outcome: {:?}", outcome);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Bounded admission gate for transfers
pub mod gate;
/// Media probing via external binaries
pub mod probe;
/// Throttled progress reporting
pub mod progress;
/// Core relay engine (decomposed into focused submodules)
pub mod relay;
/// External collaborator traits (content store, status surface)
pub mod store;
/// Live-task tracking and cancellation
pub mod tracker;
/// Core types and events
pub mod types;
/// Formatting and scratch-path helpers
pub mod utils;

// Re-export commonly used types
pub use config::{Config, LimitsConfig, MediaConfig, ProgressConfig, TransferConfig};
pub use error::{Error, Result, StoreError};
pub use gate::{TransferGate, TransferPermit};
pub use probe::{CliMediaProber, MediaInfo, MediaProber, NoOpProber, prober_from_config};
pub use progress::{ProgressHandle, ProgressThrottle};
pub use relay::{BatchPrompt, BatchRequest, ItemRequest, MediaRelay, SessionAdvance};
pub use store::{MediaPayload, MessageStore, RelayOutcome, StatusReporter};
pub use tracker::{TaskId, TaskTracker, TrackedTask};
pub use types::{
    AccountTier, BatchReport, ChatRef, Content, Event, ItemOutcome, MessageId, MessageRef,
    MessageView, RequesterId, StatusId, TransferDirection,
};

/// Helper function to run the relay engine with graceful signal handling.
///
/// Waits for a termination signal and then calls the engine's
/// `shutdown()` method, which cancels live tasks and lets them finish
/// their cleanup.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(relay: MediaRelay) -> Result<()> {
    wait_for_signal().await;
    relay.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
