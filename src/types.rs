//! Core types for relay-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Unique identifier for a message within its container
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl MessageId {
    /// Create a new MessageId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<MessageId> for i64 {
    fn from(id: MessageId) -> Self {
        id.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Identifier of the requester driving a conversational batch session
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RequesterId(pub i64);

impl std::fmt::Display for RequesterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a transient status message being edited with progress text
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StatusId(pub i64);

impl std::fmt::Display for StatusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a container (chat/channel) in the remote store
///
/// Public containers are addressed by handle, private ones by an internal
/// numeric id (the `/c/<id>/` link form).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ChatRef {
    /// Public container addressed by its handle
    Handle(String),
    /// Private container addressed by its internal numeric id
    Internal(i64),
}

impl ChatRef {
    /// A filesystem-safe key for this container, used in scratch paths.
    pub(crate) fn key(&self) -> String {
        match self {
            ChatRef::Handle(name) => name.clone(),
            ChatRef::Internal(id) => format!("c{id}"),
        }
    }
}

impl std::fmt::Display for ChatRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRef::Handle(name) => write!(f, "@{name}"),
            ChatRef::Internal(id) => write!(f, "{id}"),
        }
    }
}

/// Compound key addressing one retrievable item in the remote store
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    /// The container holding the message
    pub chat: ChatRef,
    /// The message id within the container
    pub id: MessageId,
}

impl MessageRef {
    /// Parse a message link into a container + message id.
    ///
    /// Accepts the two common link forms, ignoring any query string:
    /// - `https://<host>/<handle>/<id>` — public container
    /// - `https://<host>/c/<internal>/<id>` — private container
    pub fn parse(link: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidReference {
            reference: link.to_string(),
            reason: reason.to_string(),
        };

        let url = url::Url::parse(link.trim())
            .map_err(|e| invalid(&format!("not a valid URL: {e}")))?;

        let segments: Vec<&str> = url
            .path_segments()
            .ok_or_else(|| invalid("link has no path"))?
            .filter(|s| !s.is_empty())
            .collect();

        let (chat, raw_id) = match segments.as_slice() {
            ["c", internal, raw_id] => {
                let internal: i64 = internal
                    .parse()
                    .map_err(|_| invalid("internal container id is not numeric"))?;
                (ChatRef::Internal(internal), *raw_id)
            }
            [handle, raw_id] => (ChatRef::Handle((*handle).to_string()), *raw_id),
            _ => return Err(invalid("expected <container>/<message id> in the path")),
        };

        let id: i64 = raw_id
            .parse()
            .map_err(|_| invalid("message id is not numeric"))?;
        if id <= 0 {
            return Err(invalid("message id must be positive"));
        }

        Ok(Self {
            chat,
            id: MessageId(id),
        })
    }

    /// The same container with a different message id (batch enumeration).
    pub fn with_id(&self, id: MessageId) -> Self {
        Self {
            chat: self.chat.clone(),
            id,
        }
    }
}

impl std::fmt::Display for MessageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.chat, self.id)
    }
}

/// Transfer direction, used for size limits and progress intervals
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    /// Bytes flowing from the remote store to this process
    Download,
    /// Bytes flowing from this process to the destination
    Upload,
}

impl std::fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferDirection::Download => write!(f, "download"),
            TransferDirection::Upload => write!(f, "upload"),
        }
    }
}

/// Account tier of the store session, which determines transfer size limits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountTier {
    /// Standard account limits
    #[default]
    Standard,
    /// Premium account limits (larger transfers allowed)
    Premium,
}

/// Content of a message, resolved once per item
///
/// Media kinds carry the declared file size so limits can be enforced
/// before any bytes are transferred.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Content {
    /// A photo
    Photo {
        /// Declared size in bytes
        file_size: u64,
    },
    /// A video
    Video {
        /// Declared size in bytes
        file_size: u64,
    },
    /// An audio track
    Audio {
        /// Declared size in bytes
        file_size: u64,
    },
    /// A generic document
    Document {
        /// Declared size in bytes
        file_size: u64,
    },
    /// A text-only message (no media to transfer)
    Text,
    /// Nothing retrievable (service message, deleted content)
    Empty,
}

impl Content {
    /// Declared file size, if this content carries media.
    pub fn file_size(&self) -> Option<u64> {
        match self {
            Content::Photo { file_size }
            | Content::Video { file_size }
            | Content::Audio { file_size }
            | Content::Document { file_size } => Some(*file_size),
            Content::Text | Content::Empty => None,
        }
    }

    /// Whether this content requires a byte transfer on the fallback path.
    pub fn is_media(&self) -> bool {
        self.file_size().is_some()
    }
}

/// View of a remote message as returned by the content-store client
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageView {
    /// Container holding the message
    pub chat: ChatRef,

    /// Message id within the container
    pub id: MessageId,

    /// Resolved content union
    pub content: Content,

    /// Caption attached to media content, if any
    pub caption: Option<String>,

    /// Body text of a text message, if any
    pub text: Option<String>,

    /// Media-group id when this message is part of an album
    pub media_group: Option<String>,
}

impl MessageView {
    /// Whether the message has neither media nor text — skipped by batches.
    pub fn is_empty(&self) -> bool {
        !self.content.is_media() && self.best_text().is_none()
    }

    /// The text to re-send for a text-only item: body first, caption as fallback.
    pub fn best_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.caption.as_deref().filter(|c| !c.is_empty()))
    }

    /// Reference to this message in the remote store.
    pub fn reference(&self) -> MessageRef {
        MessageRef {
            chat: self.chat.clone(),
            id: self.id,
        }
    }
}

/// Terminal outcome of one item task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOutcome {
    /// The item was relayed or downloaded+uploaded successfully
    Processed,
    /// The item had nothing retrievable and was skipped
    Skipped,
    /// The item failed; the requester has been notified
    Failed,
    /// The item was cancelled before completing
    Cancelled,
}

/// Final accounting for one batch run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchReport {
    /// Items relayed or downloaded+uploaded successfully
    pub processed: u64,

    /// Items skipped (missing or empty messages)
    pub skipped: u64,

    /// Items that failed
    pub failed: u64,

    /// Whether the run was aborted by cancellation (partial counts)
    pub cancelled: bool,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished or was aborted
    pub completed_at: DateTime<Utc>,
}

impl BatchReport {
    /// Total items accounted for across all outcome classes.
    pub fn total(&self) -> u64 {
        self.processed + self.skipped + self.failed
    }
}

/// Event emitted during item and batch lifecycles
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An item task has started working on a message
    ItemStarted {
        /// Source message reference
        source: MessageRef,
    },

    /// An item was relayed directly without a byte transfer
    ItemRelayed {
        /// Source message reference
        source: MessageRef,
    },

    /// An item task reached a terminal outcome
    ItemCompleted {
        /// Source message reference
        source: MessageRef,
        /// Terminal outcome
        outcome: ItemOutcome,
    },

    /// A batch run has started
    BatchStarted {
        /// Container being enumerated
        chat: ChatRef,
        /// First message id (inclusive)
        start: MessageId,
        /// Last message id (inclusive)
        end: MessageId,
    },

    /// A batch chunk fully resolved
    ChunkCompleted {
        /// Zero-based chunk index within the run
        index: usize,
        /// Number of items in the chunk
        size: usize,
    },

    /// A batch run finished
    BatchCompleted {
        /// Final accounting
        report: BatchReport,
    },

    /// Live tasks were cancelled via `cancel_all`
    TasksCancelled {
        /// Number of tasks signalled
        count: usize,
    },

    /// Graceful shutdown initiated
    Shutdown,
}
