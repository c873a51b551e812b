//! Shared test helpers: a scriptable mock store, a recording status
//! surface, and a `MediaRelay` factory wired to them.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::StoreError;
use crate::probe::NoOpProber;
use crate::progress::ProgressHandle;
use crate::store::{MediaPayload, MessageStore, RelayOutcome, StatusReporter};
use crate::types::{ChatRef, Content, MessageId, MessageRef, MessageView, StatusId};

use super::MediaRelay;

/// Scripted behavior of `relay_direct` for a message
#[derive(Clone, Copy, Debug)]
pub(crate) enum RelayScript {
    Relayed,
    RateLimited(Duration),
    Rejected,
    Error,
}

/// Scriptable in-memory [`MessageStore`]
pub(crate) struct MockStore {
    messages: Mutex<HashMap<i64, MessageView>>,
    groups: Mutex<HashMap<i64, Vec<MessageView>>>,
    relay_scripts: Mutex<HashMap<i64, RelayScript>>,
    default_relay: Mutex<RelayScript>,
    download_sizes: Mutex<HashMap<i64, u64>>,
    download_delay: Mutex<Option<Duration>>,
    permission_denied: Mutex<HashSet<i64>>,
    fail_album: AtomicBool,

    pub(crate) relay_calls: AtomicUsize,
    pub(crate) download_calls: AtomicUsize,
    pub(crate) upload_calls: AtomicUsize,
    uploads: Mutex<Vec<String>>,
    album_sizes: Mutex<Vec<usize>>,
    texts: Mutex<Vec<String>>,
}

/// Default number of bytes the mock writes for a download
const DEFAULT_DOWNLOAD_BYTES: u64 = 1024;

impl MockStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            messages: Mutex::new(HashMap::new()),
            groups: Mutex::new(HashMap::new()),
            relay_scripts: Mutex::new(HashMap::new()),
            default_relay: Mutex::new(RelayScript::Rejected),
            download_sizes: Mutex::new(HashMap::new()),
            download_delay: Mutex::new(None),
            permission_denied: Mutex::new(HashSet::new()),
            fail_album: AtomicBool::new(false),
            relay_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
            album_sizes: Mutex::new(Vec::new()),
            texts: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn add_view(&self, view: MessageView) {
        self.messages.lock().unwrap().insert(view.id.0, view);
    }

    pub(crate) fn add_media(&self, id: i64) {
        self.add_view(media_view(id, Content::Document { file_size: DEFAULT_DOWNLOAD_BYTES }));
    }

    pub(crate) fn add_text(&self, id: i64, text: &str) {
        let mut view = media_view(id, Content::Text);
        view.text = Some(text.to_string());
        self.add_view(view);
    }

    pub(crate) fn add_empty(&self, id: i64) {
        self.add_view(media_view(id, Content::Empty));
    }

    pub(crate) fn add_group(&self, id: i64, members: Vec<MessageView>) {
        let mut view = media_view(id, Content::Photo { file_size: 10 });
        view.media_group = Some("group".to_string());
        self.add_view(view);
        self.groups.lock().unwrap().insert(id, members);
    }

    pub(crate) fn set_relay(&self, id: i64, script: RelayScript) {
        self.relay_scripts.lock().unwrap().insert(id, script);
    }

    pub(crate) fn set_default_relay(&self, script: RelayScript) {
        *self.default_relay.lock().unwrap() = script;
    }

    pub(crate) fn set_download_size(&self, id: i64, bytes: u64) {
        self.download_sizes.lock().unwrap().insert(id, bytes);
    }

    pub(crate) fn set_download_delay(&self, delay: Duration) {
        *self.download_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn deny(&self, id: i64) {
        self.permission_denied.lock().unwrap().insert(id);
    }

    pub(crate) fn fail_albums(&self) {
        self.fail_album.store(true, Ordering::SeqCst);
    }

    pub(crate) fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub(crate) fn album_sizes(&self) -> Vec<usize> {
        self.album_sizes.lock().unwrap().clone()
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    fn script_for(&self, id: i64) -> RelayScript {
        self.relay_scripts
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .unwrap_or(*self.default_relay.lock().unwrap())
    }
}

#[async_trait::async_trait]
impl MessageStore for MockStore {
    async fn fetch_message(
        &self,
        _chat: &ChatRef,
        id: MessageId,
    ) -> Result<Option<MessageView>, StoreError> {
        if self.permission_denied.lock().unwrap().contains(&id.0) {
            return Err(StoreError::Permission("client not in chat".into()));
        }
        Ok(self.messages.lock().unwrap().get(&id.0).cloned())
    }

    async fn fetch_media_group(
        &self,
        _chat: &ChatRef,
        id: MessageId,
    ) -> Result<Vec<MessageView>, StoreError> {
        self.groups
            .lock()
            .unwrap()
            .get(&id.0)
            .cloned()
            .ok_or_else(|| StoreError::Other("no group".into()))
    }

    async fn relay_direct(
        &self,
        source: &MessageRef,
        _destination: &ChatRef,
        _whole_group: bool,
    ) -> Result<RelayOutcome, StoreError> {
        self.relay_calls.fetch_add(1, Ordering::SeqCst);
        match self.script_for(source.id.0) {
            RelayScript::Relayed => Ok(RelayOutcome::Relayed),
            RelayScript::RateLimited(d) => Ok(RelayOutcome::RateLimited(d)),
            RelayScript::Rejected => Ok(RelayOutcome::Rejected("restricted content".into())),
            RelayScript::Error => Err(StoreError::Network("connection reset".into())),
        }
    }

    async fn download(
        &self,
        message: &MessageView,
        destination: &Path,
        progress: &ProgressHandle,
    ) -> Result<PathBuf, StoreError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.download_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let size = self
            .download_sizes
            .lock()
            .unwrap()
            .get(&message.id.0)
            .copied()
            .unwrap_or(DEFAULT_DOWNLOAD_BYTES);

        progress.update(size / 2, size).await;
        tokio::fs::write(destination, vec![0u8; size as usize])
            .await
            .map_err(|e| StoreError::Other(format!("write failed: {e}")))?;
        progress.update(size, size).await;

        Ok(destination.to_path_buf())
    }

    async fn upload(
        &self,
        _destination: &ChatRef,
        payload: &MediaPayload,
        progress: &ProgressHandle,
    ) -> Result<(), StoreError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let kind = match payload {
            MediaPayload::Photo { .. } => "photo",
            MediaPayload::Video { .. } => "video",
            MediaPayload::Audio { .. } => "audio",
            MediaPayload::Document { .. } => "document",
        };
        self.uploads.lock().unwrap().push(kind.to_string());
        progress.update(1, 1).await;
        Ok(())
    }

    async fn send_text(&self, _destination: &ChatRef, text: &str) -> Result<(), StoreError> {
        self.texts.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn send_album(
        &self,
        _destination: &ChatRef,
        items: &[MediaPayload],
    ) -> Result<(), StoreError> {
        if self.fail_album.load(Ordering::SeqCst) {
            return Err(StoreError::Other("album refused".into()));
        }
        self.album_sizes.lock().unwrap().push(items.len());
        Ok(())
    }
}

/// Recording [`StatusReporter`]
pub(crate) struct MockReporter {
    next_status: AtomicI64,
    posts: Mutex<Vec<(StatusId, String)>>,
    edits: Mutex<Vec<(StatusId, String)>>,
    deleted: Mutex<Vec<StatusId>>,
    replies: Mutex<Vec<String>>,
}

impl MockReporter {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            next_status: AtomicI64::new(1),
            posts: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            replies: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn replies(&self) -> Vec<String> {
        self.replies.lock().unwrap().clone()
    }

    pub(crate) fn posts(&self) -> Vec<(StatusId, String)> {
        self.posts.lock().unwrap().clone()
    }

    pub(crate) fn edits(&self) -> Vec<(StatusId, String)> {
        self.edits.lock().unwrap().clone()
    }

    pub(crate) fn deleted(&self) -> Vec<StatusId> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl StatusReporter for MockReporter {
    async fn post(&self, _destination: &ChatRef, text: &str) -> Result<StatusId, StoreError> {
        let status = StatusId(self.next_status.fetch_add(1, Ordering::SeqCst));
        self.posts.lock().unwrap().push((status, text.to_string()));
        Ok(status)
    }

    async fn edit(&self, status: StatusId, text: &str) -> Result<(), StoreError> {
        self.edits.lock().unwrap().push((status, text.to_string()));
        Ok(())
    }

    async fn delete(&self, status: StatusId) -> Result<(), StoreError> {
        self.deleted.lock().unwrap().push(status);
        Ok(())
    }

    async fn reply(&self, _destination: &ChatRef, text: &str) -> Result<(), StoreError> {
        self.replies.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// A message view in the mock's standard container.
pub(crate) fn media_view(id: i64, content: Content) -> MessageView {
    MessageView {
        chat: ChatRef::Handle("chan".into()),
        id: MessageId(id),
        content,
        caption: None,
        text: None,
        media_group: None,
    }
}

/// Link into the mock's standard container.
pub(crate) fn link(id: i64) -> String {
    format!("https://t.me/chan/{id}")
}

/// Helper to create a test MediaRelay wired to fresh mocks.
/// Returns the relay, both mocks, and the tempdir (which must be kept alive).
pub(crate) async fn create_test_relay() -> (
    MediaRelay,
    Arc<MockStore>,
    Arc<MockReporter>,
    tempfile::TempDir,
) {
    let temp_dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.transfer.temp_dir = temp_dir.path().join("temp");
    config.transfer.max_concurrent_transfers = 3;
    // No pacing in tests
    config.transfer.inter_action_delay_ms = 0;

    let store = MockStore::new();
    let reporter = MockReporter::new();

    let relay = MediaRelay::new(
        Arc::clone(&store) as Arc<dyn MessageStore>,
        Arc::clone(&reporter) as Arc<dyn StatusReporter>,
        Arc::new(NoOpProber),
        config,
    )
    .await
    .unwrap();

    (relay, store, reporter, temp_dir)
}

/// Same as [`create_test_relay`] but with a caller-tweaked config.
pub(crate) async fn create_test_relay_with(
    tweak: impl FnOnce(&mut Config),
) -> (
    MediaRelay,
    Arc<MockStore>,
    Arc<MockReporter>,
    tempfile::TempDir,
) {
    let temp_dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.transfer.temp_dir = temp_dir.path().join("temp");
    config.transfer.inter_action_delay_ms = 0;
    tweak(&mut config);

    let store = MockStore::new();
    let reporter = MockReporter::new();

    let relay = MediaRelay::new(
        Arc::clone(&store) as Arc<dyn MessageStore>,
        Arc::clone(&reporter) as Arc<dyn StatusReporter>,
        Arc::new(NoOpProber),
        config,
    )
    .await
    .unwrap();

    (relay, store, reporter, temp_dir)
}

/// Count files left anywhere under the engine temp dir.
pub(crate) fn scratch_entries(temp_root: &Path) -> usize {
    std::fs::read_dir(temp_root.join("temp"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}
