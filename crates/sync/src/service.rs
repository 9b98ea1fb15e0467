use std::path::PathBuf;
use std::sync::Arc;

use scratchpad_project::WorkspaceStore;
use scratchpad_settings::ScratchPreferences;
use tokio::runtime::Handle;
use tracing::info;

use crate::engine::DirectorySyncEngine;
use crate::error::SyncError;
use crate::host::EditorHost;
use crate::offload::AsyncWorkspaceStore;
use crate::options::SyncOptions;
use crate::signals::{self, SignalReceiver};
use crate::tracker::BufferSessionTracker;

/// 一個工作階段的暫存服務。 / Session-scoped composition of store, engine and tracker.
///
/// Built explicitly and torn down explicitly; nothing here is global.
pub struct ScratchService {
    store: Arc<WorkspaceStore>,
    engine: DirectorySyncEngine,
    tracker: BufferSessionTracker,
}

impl ScratchService {
    /// Builds everything from preferences, restores the previous session and
    /// hands back the signal stream for the presentation layer.
    pub async fn start(
        preferences: &ScratchPreferences,
        host: Arc<dyn EditorHost>,
    ) -> Result<(Self, SignalReceiver), SyncError> {
        let store = Arc::new(WorkspaceStore::from_preferences(preferences));
        Self::start_with(store, SyncOptions::from(preferences), host).await
    }

    pub async fn start_with(
        store: Arc<WorkspaceStore>,
        options: SyncOptions,
        host: Arc<dyn EditorHost>,
    ) -> Result<(Self, SignalReceiver), SyncError> {
        let (sender, receiver) = signals::channel();
        let engine =
            DirectorySyncEngine::start(Arc::clone(&store), options.clone(), sender.clone()).await?;
        let tracker = BufferSessionTracker::new(
            Arc::clone(&store),
            host,
            sender,
            &options,
            Handle::current(),
        );

        let restoring = tracker.clone();
        let restored = tokio::task::spawn_blocking(move || restoring.restore_session()).await??;
        info!(restored = restored.len(), "scratch session restored");

        Ok((
            Self {
                store,
                engine,
                tracker,
            },
            receiver,
        ))
    }

    pub fn store(&self) -> &Arc<WorkspaceStore> {
        &self.store
    }

    pub fn async_store(&self) -> &AsyncWorkspaceStore {
        self.engine.async_store()
    }

    pub fn engine(&self) -> &DirectorySyncEngine {
        &self.engine
    }

    pub fn tracker(&self) -> &BufferSessionTracker {
        &self.tracker
    }

    pub async fn open_workspace(&self, workspace_dir: impl Into<PathBuf>) -> Result<(), SyncError> {
        self.engine.open_workspace(workspace_dir).await
    }

    pub async fn close_workspace(&self) -> Result<(), SyncError> {
        self.engine.close_workspace().await
    }

    /// Stops auto-saves first, then the watchers.
    pub fn shutdown(self) {
        self.tracker.shutdown();
        self.engine.shutdown();
        info!("scratch service shut down");
    }
}
