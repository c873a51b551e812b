//! External collaborator seams: the content-store client and the status surface
//!
//! The engine never talks a wire protocol itself. Everything it needs from
//! the remote service is expressed through these traits, implemented by
//! the embedding application (and by mocks in tests).

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::StoreError;
use crate::progress::ProgressHandle;
use crate::types::{ChatRef, MessageId, MessageRef, MessageView, StatusId};

/// Outcome of a direct relay attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The content was copied server-side; no bytes passed through this process
    Relayed,
    /// The service asked us to back off before further actions
    RateLimited(Duration),
    /// The relay was refused (restricted content, privacy settings)
    Rejected(String),
}

/// Media payload for the upload path, built once from the probed file
///
/// Captions default to the empty string rather than being absent; the
/// upload primitives never fail for lack of a caption.
#[derive(Clone, Debug)]
pub enum MediaPayload {
    /// A photo upload
    Photo {
        /// Local file to upload
        path: PathBuf,
        /// Caption text (possibly empty)
        caption: String,
    },
    /// A video upload with probed metadata and an optional thumbnail
    Video {
        /// Local file to upload
        path: PathBuf,
        /// Caption text (possibly empty)
        caption: String,
        /// Probed duration in seconds (0 when unknown)
        duration_secs: u32,
        /// Probed frame width
        width: u32,
        /// Probed frame height
        height: u32,
        /// Extracted thumbnail frame, if any
        thumbnail: Option<PathBuf>,
    },
    /// An audio upload with probed tags
    Audio {
        /// Local file to upload
        path: PathBuf,
        /// Caption text (possibly empty)
        caption: String,
        /// Probed duration in seconds (0 when unknown)
        duration_secs: u32,
        /// Probed artist tag
        performer: Option<String>,
        /// Probed title tag
        title: Option<String>,
    },
    /// A generic document upload
    Document {
        /// Local file to upload
        path: PathBuf,
        /// Caption text (possibly empty)
        caption: String,
    },
}

impl MediaPayload {
    /// The local file backing this payload.
    pub fn path(&self) -> &Path {
        match self {
            MediaPayload::Photo { path, .. }
            | MediaPayload::Video { path, .. }
            | MediaPayload::Audio { path, .. }
            | MediaPayload::Document { path, .. } => path,
        }
    }

    /// The caption text.
    pub fn caption(&self) -> &str {
        match self {
            MediaPayload::Photo { caption, .. }
            | MediaPayload::Video { caption, .. }
            | MediaPayload::Audio { caption, .. }
            | MediaPayload::Document { caption, .. } => caption,
        }
    }
}

/// Client for the remote content store
///
/// Abstraction over fetching, relaying, and transferring message content,
/// enabling testability. All methods are opaque network operations from
/// the engine's point of view.
#[async_trait::async_trait]
pub trait MessageStore: Send + Sync {
    /// Fetch a view of one message. `Ok(None)` means the message does not
    /// exist (deleted or never posted) — a skip, not an error.
    async fn fetch_message(
        &self,
        chat: &ChatRef,
        id: MessageId,
    ) -> Result<Option<MessageView>, StoreError>;

    /// Fetch all constituents of the media group that `id` belongs to.
    async fn fetch_media_group(
        &self,
        chat: &ChatRef,
        id: MessageId,
    ) -> Result<Vec<MessageView>, StoreError>;

    /// Ask the service to copy the message (or its whole media group)
    /// server-side to `destination`, without transferring bytes through
    /// this process.
    async fn relay_direct(
        &self,
        source: &MessageRef,
        destination: &ChatRef,
        whole_group: bool,
    ) -> Result<RelayOutcome, StoreError>;

    /// Download the message's media to `destination` on the local
    /// filesystem, reporting progress through `progress`. Returns the
    /// path actually written.
    async fn download(
        &self,
        message: &MessageView,
        destination: &Path,
        progress: &ProgressHandle,
    ) -> Result<PathBuf, StoreError>;

    /// Upload a media payload to `destination`, reporting progress.
    async fn upload(
        &self,
        destination: &ChatRef,
        payload: &MediaPayload,
        progress: &ProgressHandle,
    ) -> Result<(), StoreError>;

    /// Send a plain text message to `destination`.
    async fn send_text(&self, destination: &ChatRef, text: &str) -> Result<(), StoreError>;

    /// Send several payloads as one album to `destination`.
    async fn send_album(
        &self,
        destination: &ChatRef,
        items: &[MediaPayload],
    ) -> Result<(), StoreError>;
}

/// Surface for transient status messages and one-line replies
///
/// `edit` and `delete` are fail-soft at their call sites: a status message
/// deleted out from under us must never abort a transfer.
#[async_trait::async_trait]
pub trait StatusReporter: Send + Sync {
    /// Post a new transient status message, returning its id for later edits.
    async fn post(&self, destination: &ChatRef, text: &str) -> Result<StatusId, StoreError>;

    /// Replace the text of a previously posted status message.
    async fn edit(&self, status: StatusId, text: &str) -> Result<(), StoreError>;

    /// Delete a previously posted status message.
    async fn delete(&self, status: StatusId) -> Result<(), StoreError>;

    /// Send a one-line reply to the requester.
    async fn reply(&self, destination: &ChatRef, text: &str) -> Result<(), StoreError>;
}
