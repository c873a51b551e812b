//! Error types for relay-dl
//!
//! This module provides the error handling for the library:
//! - A top-level [`Error`] covering orchestration concerns (parsing,
//!   integrity, limits, cancellation, shutdown)
//! - A [`StoreError`] sub-enum for failures reported by the remote
//!   content-store client
//!
//! Item-level errors never escape a tracked task; they are converted to a
//! user-visible reply and an outcome at the item boundary.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::TransferDirection;

/// Result type alias for relay-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for relay-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "transfer.chunk_size")
        key: Option<String>,
    },

    /// A message link could not be parsed into a container + message id
    #[error("invalid message reference '{reference}': {reason}")]
    InvalidReference {
        /// The reference string as given by the requester
        reference: String,
        /// Why it failed to parse
        reason: String,
    },

    /// Failure reported by the remote content-store client
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Downloaded output is missing or empty — hard failure, no upload attempt
    #[error("transfer integrity failure at {path}: {reason}")]
    TransferIntegrity {
        /// Local path that failed the post-download check
        path: PathBuf,
        /// What the check found (missing file, zero bytes)
        reason: String,
    },

    /// Transfer size exceeds the configured limit for the direction and tier
    #[error("{direction} of {size} bytes exceeds the {limit} byte limit")]
    LimitExceeded {
        /// Transfer direction the limit applies to
        direction: TransferDirection,
        /// Size of the item in bytes
        size: u64,
        /// The configured limit in bytes
        limit: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation was cancelled cooperatively
    #[error("operation cancelled")]
    Cancelled,

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress: not accepting new work")]
    ShuttingDown,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors reported by the remote content-store client
///
/// These map the opaque failure modes of the external service into the
/// classes the orchestration engine distinguishes: permission problems get
/// a one-line user-visible failure, rate limits trigger a bounded sleep
/// before the download fallback, and everything else falls through to the
/// generic failure path.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The client is not allowed to read the source or write the destination
    #[error("permission denied: {0}")]
    Permission(String),

    /// The referenced message does not exist
    #[error("message not found: {0}")]
    NotFound(String),

    /// The service asked us to back off for the given duration
    #[error("rate limited: retry after {retry_after:?}")]
    RateLimited {
        /// Server-specified backoff duration
        retry_after: Duration,
    },

    /// The direct relay was refused (restricted content, privacy settings)
    #[error("relay rejected: {0}")]
    Rejected(String),

    /// Transport-level failure talking to the remote service
    #[error("network error: {0}")]
    Network(String),

    /// Other store failure
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Whether this error should be surfaced to the requester as a
    /// one-line permission/availability failure (no retry, no fallback).
    pub fn is_user_visible_rejection(&self) -> bool {
        matches!(self, StoreError::Permission(_) | StoreError::NotFound(_))
    }
}

impl Error {
    /// Whether this error represents cooperative cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
