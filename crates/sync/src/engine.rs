//! Keeps the published scratch tree in step with the disk.
//!
//! Watcher events from either root feed one trailing-edge [`Debouncer`];
//! when it fires the whole tree is re-enumerated and published as a new
//! snapshot. Mutations issued by the host itself run with watcher raising
//! turned off and publish their own rebuild, carrying the selection the
//! host asked for.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use scratchpad_core::{
    is_reserved_name, DebounceState, Debouncer, FileEvent, FileMonitor, FileMonitorEventKind,
    ScratchScope,
};
use scratchpad_project::{ScratchTree, StoreError, WorkspaceStore};
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

use crate::error::SyncError;
use crate::offload::AsyncWorkspaceStore;
use crate::options::SyncOptions;
use crate::signals::{emit, ScratchSignal, SignalSender};

#[derive(Debug, Default)]
struct ViewState {
    snapshot: Option<Arc<ScratchTree>>,
    selection: Option<PathBuf>,
}

#[derive(Default)]
struct Watchers {
    global: Option<FileMonitor>,
    solution: Option<FileMonitor>,
}

struct EngineInner {
    store: AsyncWorkspaceStore,
    options: SyncOptions,
    signals: SignalSender,
    runtime: Handle,
    rebuild: Debouncer,
    raising: Arc<AtomicBool>,
    suppression_depth: AtomicUsize,
    revision: AtomicU64,
    closed: AtomicBool,
    view: Mutex<ViewState>,
    watchers: Mutex<Watchers>,
    // Serializes rebuilds so snapshots are published in revision order.
    rebuild_lock: tokio::sync::Mutex<()>,
}

/// 目錄同步引擎。 / Mirrors both scratch roots into a published tree snapshot.
pub struct DirectorySyncEngine {
    inner: Arc<EngineInner>,
}

impl DirectorySyncEngine {
    /// 建立根目錄、安裝監視器並完成第一次重建。 / Ensures the roots, installs watchers and publishes the first snapshot.
    pub async fn start(
        store: Arc<WorkspaceStore>,
        options: SyncOptions,
        signals: SignalSender,
    ) -> Result<Self, SyncError> {
        let runtime = Handle::current();
        let store = AsyncWorkspaceStore::new(store);
        store.ensure_root(ScratchScope::Global).await?;
        store.ensure_root(ScratchScope::Solution).await?;

        let inner = Arc::new(EngineInner {
            store,
            rebuild: Debouncer::new("rebuild", runtime.clone()),
            options,
            signals,
            runtime,
            raising: Arc::new(AtomicBool::new(true)),
            suppression_depth: AtomicUsize::new(0),
            revision: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            view: Mutex::new(ViewState::default()),
            watchers: Mutex::new(Watchers::default()),
            rebuild_lock: tokio::sync::Mutex::new(()),
        });

        if inner.options.watch_roots {
            inner.install_watcher(ScratchScope::Global)?;
            inner.install_watcher(ScratchScope::Solution)?;
        }
        inner.rebuild(None).await?;
        info!(
            global = %inner.store.inner().roots().global().display(),
            "directory sync engine started"
        );
        Ok(Self { inner })
    }

    pub fn store(&self) -> &Arc<WorkspaceStore> {
        self.inner.store.inner()
    }

    pub fn async_store(&self) -> &AsyncWorkspaceStore {
        &self.inner.store
    }

    /// 處理一個原始監視事件。 / Entry point for raw watcher events.
    ///
    /// Events for reserved names are ignored, as is everything while raising
    /// is off. Returns `true` when a rebuild was (re)scheduled.
    pub fn handle_watcher_event(&self, event: &FileEvent) -> bool {
        self.inner.on_event(event)
    }

    /// Restarts the rebuild debounce window.
    pub fn request_rebuild(&self) {
        self.inner.schedule_rebuild();
    }

    pub fn rebuild_state(&self) -> DebounceState {
        self.inner.rebuild.state()
    }

    /// Rebuilds immediately, then applies `select` once the tree is published.
    pub async fn rebuild_now(&self, select: Option<PathBuf>) -> Result<Arc<ScratchTree>, SyncError> {
        self.inner.rebuild(select).await
    }

    pub async fn rebuild_and_select(&self, path: impl Into<PathBuf>) -> Result<Arc<ScratchTree>, SyncError> {
        self.inner.rebuild(Some(path.into())).await
    }

    pub fn snapshot(&self) -> Option<Arc<ScratchTree>> {
        self.inner.view.lock().snapshot.clone()
    }

    pub fn selection(&self) -> Option<PathBuf> {
        self.inner.view.lock().selection.clone()
    }

    /// 選取目前快照中的節點。 / Selects a node of the current snapshot.
    ///
    /// A path the snapshot does not contain leaves the selection unchanged.
    pub fn set_selection(&self, path: &Path) -> bool {
        let selected = {
            let mut view = self.inner.view.lock();
            let found = view
                .snapshot
                .as_ref()
                .and_then(|tree| tree.find(path))
                .map(|node| node.path.clone());
            if let Some(found) = &found {
                view.selection = Some(found.clone());
            }
            found
        };
        match selected {
            Some(path) => {
                emit(&self.inner.signals, ScratchSignal::SelectPath(path));
                true
            }
            None => false,
        }
    }

    pub fn is_raising_events(&self) -> bool {
        self.inner.raising.load(Ordering::SeqCst)
    }

    pub fn suppression_depth(&self) -> usize {
        self.inner.suppression_depth.load(Ordering::SeqCst)
    }

    /// 暫停監視並執行自身發起的變更。 / Runs a host-initiated mutation with watcher raising off.
    ///
    /// The mutation runs on the blocking pool. Afterwards the tree is
    /// rebuilt once and the path returned by `select` is applied. Raising
    /// comes back `settle_delay` later, once every overlapping suppression
    /// has finished.
    pub async fn run_suppressed<T, F, S>(&self, op: F, select: S) -> Result<T, SyncError>
    where
        F: FnOnce(&WorkspaceStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
        S: FnOnce(&T) -> Option<PathBuf>,
    {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SyncError::ShutDown);
        }
        let _suppressed = Suppression::begin(&self.inner);

        let value = match self.inner.store.run(op).await {
            Ok(value) => value,
            Err(err) => {
                if let Err(rebuild_err) = self.inner.rebuild(None).await {
                    warn!(error = %rebuild_err, "rebuild after failed mutation failed");
                }
                return Err(err);
            }
        };
        let target = select(&value);
        self.inner.rebuild(target).await?;
        Ok(value)
    }

    /// 刪除並選取相鄰節點。 / Deletes a file or folder and selects its neighbour.
    ///
    /// The neighbour comes from the snapshot taken before the delete: next
    /// sibling, previous sibling, then the parent.
    pub async fn delete_and_select_sibling(&self, path: impl Into<PathBuf>) -> Result<bool, SyncError> {
        let path = path.into();
        let sibling = self
            .snapshot()
            .and_then(|tree| tree.sibling_after_removal(&path));
        self.run_suppressed(
            move |store| {
                if path.is_dir() {
                    store.delete_folder(&path)
                } else {
                    store.delete_file(&path)
                }
            },
            move |deleted| if *deleted { sibling } else { None },
        )
        .await
    }

    /// Creates a numbered file and selects it once the tree shows it.
    pub async fn create_and_select(
        &self,
        scope: ScratchScope,
        content: Option<String>,
    ) -> Result<Option<PathBuf>, SyncError> {
        self.run_suppressed(
            move |store| store.create_file(scope, content.as_deref()),
            |created| created.clone(),
        )
        .await
    }

    /// 開啟工作區：解析方案根目錄並加上監視。 / Opens a workspace: resolves, creates and watches its Solution root.
    pub async fn open_workspace(&self, workspace_dir: impl Into<PathBuf>) -> Result<(), SyncError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SyncError::ShutDown);
        }
        let workspace_dir = workspace_dir.into();
        self.inner.watchers.lock().solution = None;
        self.store().set_workspace(Some(workspace_dir.as_path()));
        self.inner.store.ensure_root(ScratchScope::Solution).await?;
        if self.inner.options.watch_roots {
            self.inner.install_watcher(ScratchScope::Solution)?;
        }
        self.inner.rebuild(None).await?;
        Ok(())
    }

    pub async fn close_workspace(&self) -> Result<(), SyncError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SyncError::ShutDown);
        }
        self.inner.watchers.lock().solution = None;
        self.store().set_workspace(None);
        self.inner.rebuild(None).await?;
        Ok(())
    }

    /// 取消待重建並釋放監視器。 / Cancels the pending rebuild and releases the watchers.
    ///
    /// Later events and rebuild requests are ignored.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl Drop for DirectorySyncEngine {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl EngineInner {
    fn install_watcher(self: &Arc<Self>, scope: ScratchScope) -> Result<(), SyncError> {
        let Some(root) = self.store.inner().root_for(scope) else {
            return Ok(());
        };
        let weak: Weak<EngineInner> = Arc::downgrade(self);
        let monitor = FileMonitor::watch_gated(&root, Arc::clone(&self.raising), move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_event(&event);
            }
        })?;
        debug!(%scope, root = %root.display(), "watching scratch root");

        let mut watchers = self.watchers.lock();
        match scope {
            ScratchScope::Global => watchers.global = Some(monitor),
            ScratchScope::Solution => watchers.solution = Some(monitor),
        }
        Ok(())
    }

    fn on_event(self: &Arc<Self>, event: &FileEvent) -> bool {
        if self.closed.load(Ordering::SeqCst) || !self.raising.load(Ordering::SeqCst) {
            return false;
        }
        let reserved = match &event.kind {
            FileMonitorEventKind::Renamed { from, to } => {
                is_reserved_name(from) && is_reserved_name(to)
            }
            _ => is_reserved_name(&event.path),
        };
        if reserved {
            trace!(path = %event.path.display(), "ignoring housekeeping event");
            return false;
        }
        self.schedule_rebuild();
        true
    }

    fn schedule_rebuild(self: &Arc<Self>) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let weak = Arc::downgrade(self);
        self.rebuild.schedule(self.options.rebuild_debounce, move || async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Err(err) = inner.rebuild(None).await {
                warn!(error = %err, "debounced rebuild failed");
            }
        });
    }

    async fn rebuild(&self, select: Option<PathBuf>) -> Result<Arc<ScratchTree>, SyncError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SyncError::ShutDown);
        }
        let _serial = self.rebuild_lock.lock().await;
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        let tree = Arc::new(
            self.store
                .run(move |store| ScratchTree::build(store, revision))
                .await?,
        );

        let selected = {
            let mut view = self.view.lock();
            view.snapshot = Some(Arc::clone(&tree));
            let requested = select
                .as_deref()
                .and_then(|path| tree.find(path))
                .map(|node| node.path.clone());
            match requested {
                Some(path) => {
                    view.selection = Some(path.clone());
                    Some(path)
                }
                None => {
                    let retained = view
                        .selection
                        .as_deref()
                        .map(|path| tree.contains(path))
                        .unwrap_or(false);
                    if !retained {
                        view.selection = None;
                    }
                    None
                }
            }
        };

        debug!(revision, files = tree.file_count(), "scratch tree rebuilt");
        emit(&self.signals, ScratchSignal::TreeChanged(Arc::clone(&tree)));
        if let Some(path) = selected {
            emit(&self.signals, ScratchSignal::SelectPath(path));
        }
        Ok(tree)
    }

    fn resume_after_suppression(&self) {
        let previous = self.suppression_depth.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 && !self.closed.load(Ordering::SeqCst) {
            self.raising.store(true, Ordering::SeqCst);
            trace!("watcher raising resumed");
        }
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.raising.store(false, Ordering::SeqCst);
        self.rebuild.cancel();
        let mut watchers = self.watchers.lock();
        watchers.global = None;
        watchers.solution = None;
        debug!("directory sync engine shut down");
    }
}

/// Holds watcher raising off; dropping it schedules the settle-delayed resume.
struct Suppression {
    inner: Arc<EngineInner>,
}

impl Suppression {
    fn begin(inner: &Arc<EngineInner>) -> Self {
        inner.suppression_depth.fetch_add(1, Ordering::SeqCst);
        inner.raising.store(false, Ordering::SeqCst);
        inner.rebuild.cancel();
        Self {
            inner: Arc::clone(inner),
        }
    }
}

impl Drop for Suppression {
    fn drop(&mut self) {
        let inner = Arc::clone(&self.inner);
        let settle = inner.options.settle_delay;
        if settle.is_zero() {
            inner.resume_after_suppression();
            return;
        }
        self.inner.runtime.spawn(async move {
            tokio::time::sleep(settle).await;
            inner.resume_after_suppression();
        });
    }
}
