//! Auto-save and session bookkeeping for open Global scratch buffers.
//!
//! Each tracked path owns one [`Debouncer`]. Buffer-changed notifications
//! arrive keyed by [`BufferId`] and are dispatched through a reverse index,
//! so an edit never scans the tracked set.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use scratchpad_core::{normalize_path, Debouncer, PathKey, ScratchScope};
use scratchpad_project::WorkspaceStore;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use crate::error::SyncError;
use crate::host::{BufferId, EditorHost};
use crate::options::SyncOptions;
use crate::signals::{emit, ScratchSignal, SignalSender};

struct TrackedBuffer {
    path: PathBuf,
    buffer: BufferId,
    autosave: Debouncer,
}

struct TrackerInner {
    store: Arc<WorkspaceStore>,
    host: Arc<dyn EditorHost>,
    signals: SignalSender,
    autosave_delay: Duration,
    runtime: Handle,
    tracked: DashMap<PathKey, TrackedBuffer>,
    by_buffer: DashMap<BufferId, PathKey>,
    closed: AtomicBool,
}

/// 追蹤開啟中的全域暫存檔並自動儲存。 / Tracks open Global scratch files and auto-saves them.
///
/// Cheap to clone; clones share the same tracked set.
#[derive(Clone)]
pub struct BufferSessionTracker {
    inner: Arc<TrackerInner>,
}

impl BufferSessionTracker {
    pub fn new(
        store: Arc<WorkspaceStore>,
        host: Arc<dyn EditorHost>,
        signals: SignalSender,
        options: &SyncOptions,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                store,
                host,
                signals,
                autosave_delay: options.autosave_debounce,
                runtime,
                tracked: DashMap::new(),
                by_buffer: DashMap::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// 開始追蹤；僅限全域範圍內的檔案。 / Starts tracking `path` shown in `buffer`.
    ///
    /// Returns `false` for paths outside the roots, Solution-scope paths and
    /// after shutdown. Re-tracking a path with a new buffer replaces the old
    /// association and drops its pending save.
    pub fn track(&self, path: &Path, buffer: BufferId) -> bool {
        let inner = &self.inner;
        if inner.closed.load(Ordering::SeqCst) {
            return false;
        }
        let path = normalize_path(path);
        if !inner.store.is_in_scope(&path)
            || inner.store.is_root(&path)
            || inner.store.classify_scope(&path) != ScratchScope::Global
        {
            trace!(path = %path.display(), "not tracked: outside the Global scope");
            return false;
        }

        let key = PathKey::new(&path);
        let previous = inner.tracked.insert(
            key.clone(),
            TrackedBuffer {
                path: path.clone(),
                buffer,
                autosave: Debouncer::new("autosave", inner.runtime.clone()),
            },
        );
        if let Some(previous) = previous {
            previous.autosave.cancel();
            if previous.buffer != buffer {
                inner
                    .by_buffer
                    .remove_if(&previous.buffer, |_, mapped| *mapped == key);
            }
        }
        inner.by_buffer.insert(buffer, key);

        if let Err(err) = inner.store.add_to_session(&path) {
            warn!(path = %path.display(), error = %err, "failed to record open scratch file");
        }
        debug!(path = %path.display(), %buffer, "scratch buffer tracked");
        true
    }

    /// 停止追蹤並取消待儲存動作。 / Stops tracking, cancels any pending save and drops the session entry.
    pub fn untrack(&self, path: &Path) -> bool {
        let inner = &self.inner;
        let key = PathKey::new(path);
        let Some((_, tracked)) = inner.tracked.remove(&key) else {
            return false;
        };
        tracked.autosave.cancel();
        inner
            .by_buffer
            .remove_if(&tracked.buffer, |_, mapped| *mapped == key);

        if let Err(err) = inner.store.remove_from_session(&tracked.path) {
            warn!(path = %tracked.path.display(), error = %err, "failed to update session record");
        }
        debug!(path = %tracked.path.display(), "scratch buffer untracked");
        true
    }

    /// Buffer-changed observer. Returns `true` when an auto-save was (re)scheduled.
    pub fn buffer_changed(&self, buffer: BufferId) -> bool {
        let inner = &self.inner;
        if inner.closed.load(Ordering::SeqCst) {
            return false;
        }
        let Some(key) = inner.by_buffer.get(&buffer).map(|entry| entry.value().clone()) else {
            return false;
        };
        let Some(tracked) = inner.tracked.get(&key) else {
            return false;
        };
        if tracked.buffer != buffer {
            return false;
        }

        let weak: Weak<TrackerInner> = Arc::downgrade(&self.inner);
        let path = tracked.path.clone();
        tracked.autosave.schedule(inner.autosave_delay, move || async move {
            if let Some(inner) = weak.upgrade() {
                inner.save(key, path, buffer).await;
            }
        });
        true
    }

    /// 啟動時還原上次開啟的檔案。 / Reopens the files recorded by the previous session.
    ///
    /// The record is cleared first and rebuilt as files are re-tracked.
    /// Paths that no longer exist are dropped without error. Blocking.
    pub fn restore_session(&self) -> Result<Vec<PathBuf>, SyncError> {
        let inner = &self.inner;
        let record = inner.store.read_session_record();
        inner.store.clear_session()?;

        let mut restored = Vec::new();
        for path in record.open_files {
            if !path.is_file() {
                debug!(path = %path.display(), "dropping vanished scratch file from session");
                continue;
            }
            match inner.host.open_document(&path) {
                Ok(buffer) => {
                    if self.track(&path, buffer) {
                        restored.push(path);
                    }
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "could not reopen scratch file");
                }
            }
        }
        Ok(restored)
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.inner.tracked.contains_key(&PathKey::new(path))
    }

    pub fn buffer_for(&self, path: &Path) -> Option<BufferId> {
        self.inner
            .tracked
            .get(&PathKey::new(path))
            .map(|tracked| tracked.buffer)
    }

    pub fn is_save_pending(&self, path: &Path) -> bool {
        self.inner
            .tracked
            .get(&PathKey::new(path))
            .map(|tracked| tracked.autosave.is_pending())
            .unwrap_or(false)
    }

    /// Tracked paths, sorted.
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .inner
            .tracked
            .iter()
            .map(|entry| entry.path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// 取消所有待儲存動作並清除追蹤。 / Cancels every pending save and forgets all buffers.
    ///
    /// The session record is left as is so the next start can restore it.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for entry in inner.tracked.iter() {
            entry.autosave.cancel();
        }
        inner.tracked.clear();
        inner.by_buffer.clear();
        debug!("buffer tracker shut down");
    }
}

impl TrackerInner {
    fn is_current(&self, key: &PathKey, buffer: BufferId) -> bool {
        !self.closed.load(Ordering::SeqCst)
            && self
                .tracked
                .get(key)
                .map(|tracked| tracked.buffer == buffer)
                .unwrap_or(false)
    }

    async fn save(&self, key: PathKey, path: PathBuf, buffer: BufferId) {
        if !self.is_current(&key, buffer) {
            trace!(path = %path.display(), "stale auto-save dropped");
            return;
        }
        let host = Arc::clone(&self.host);
        let target = path.clone();
        match tokio::task::spawn_blocking(move || host.save_in_place(&target, buffer)).await {
            Ok(Ok(())) => {
                debug!(path = %path.display(), "scratch file auto-saved");
                emit(&self.signals, ScratchSignal::AutoSaved(path));
            }
            Ok(Err(err)) => {
                warn!(path = %path.display(), error = %err, "auto-save failed");
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "auto-save task failed");
            }
        }
    }
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        for entry in self.tracked.iter() {
            entry.autosave.cancel();
        }
    }
}
