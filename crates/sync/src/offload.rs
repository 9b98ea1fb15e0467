use std::path::PathBuf;
use std::sync::Arc;

use scratchpad_core::ScratchScope;
use scratchpad_project::{
    ListMode, ScratchEntry, SessionRecord, StoreError, WorkspaceStore,
};

use crate::error::SyncError;

/// 將阻塞的儲存操作移到背景執行緒。 / Runs blocking store operations on the blocking pool.
///
/// Every method has the semantics of the matching [`WorkspaceStore`] call;
/// only the thread it runs on differs.
#[derive(Debug, Clone)]
pub struct AsyncWorkspaceStore {
    store: Arc<WorkspaceStore>,
}

impl AsyncWorkspaceStore {
    pub fn new(store: Arc<WorkspaceStore>) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &Arc<WorkspaceStore> {
        &self.store
    }

    /// Runs an arbitrary store closure off the async executor.
    pub async fn run<T, F>(&self, op: F) -> Result<T, SyncError>
    where
        F: FnOnce(&WorkspaceStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        Ok(tokio::task::spawn_blocking(move || op(&store)).await??)
    }

    pub async fn ensure_root(&self, scope: ScratchScope) -> Result<Option<PathBuf>, SyncError> {
        self.run(move |store| store.ensure_root(scope)).await
    }

    pub async fn create_file(
        &self,
        scope: ScratchScope,
        content: Option<String>,
    ) -> Result<Option<PathBuf>, SyncError> {
        self.run(move |store| store.create_file(scope, content.as_deref()))
            .await
    }

    pub async fn create_file_in(
        &self,
        folder: impl Into<PathBuf>,
        content: Option<String>,
    ) -> Result<Option<PathBuf>, SyncError> {
        let folder = folder.into();
        self.run(move |store| store.create_file_in(&folder, content.as_deref()))
            .await
    }

    pub async fn read_file(&self, path: impl Into<PathBuf>) -> Result<Option<String>, SyncError> {
        let path = path.into();
        self.run(move |store| store.read_file(&path)).await
    }

    pub async fn write_file(
        &self,
        path: impl Into<PathBuf>,
        content: String,
    ) -> Result<bool, SyncError> {
        let path = path.into();
        self.run(move |store| store.write_file(&path, &content)).await
    }

    pub async fn delete_file(&self, path: impl Into<PathBuf>) -> Result<bool, SyncError> {
        let path = path.into();
        self.run(move |store| store.delete_file(&path)).await
    }

    pub async fn delete_folder(&self, path: impl Into<PathBuf>) -> Result<bool, SyncError> {
        let path = path.into();
        self.run(move |store| store.delete_folder(&path)).await
    }

    pub async fn rename_file(
        &self,
        path: impl Into<PathBuf>,
        new_name: String,
    ) -> Result<Option<PathBuf>, SyncError> {
        let path = path.into();
        self.run(move |store| store.rename_file(&path, &new_name)).await
    }

    pub async fn change_extension(
        &self,
        path: impl Into<PathBuf>,
        extension: String,
    ) -> Result<Option<PathBuf>, SyncError> {
        let path = path.into();
        self.run(move |store| store.change_extension(&path, &extension))
            .await
    }

    pub async fn move_file(
        &self,
        source: impl Into<PathBuf>,
        dest_folder: impl Into<PathBuf>,
    ) -> Result<Option<PathBuf>, SyncError> {
        let (source, dest_folder) = (source.into(), dest_folder.into());
        self.run(move |store| store.move_file(&source, &dest_folder))
            .await
    }

    pub async fn move_to_scope(
        &self,
        source: impl Into<PathBuf>,
        scope: ScratchScope,
    ) -> Result<Option<PathBuf>, SyncError> {
        let source = source.into();
        self.run(move |store| store.move_to_scope(&source, scope)).await
    }

    pub async fn create_sub_folder(
        &self,
        parent: impl Into<PathBuf>,
        name: String,
    ) -> Result<Option<PathBuf>, SyncError> {
        let parent = parent.into();
        self.run(move |store| store.create_sub_folder(&parent, &name))
            .await
    }

    pub async fn rename_folder(
        &self,
        path: impl Into<PathBuf>,
        new_name: String,
    ) -> Result<Option<PathBuf>, SyncError> {
        let path = path.into();
        self.run(move |store| store.rename_folder(&path, &new_name)).await
    }

    pub async fn move_folder(
        &self,
        source: impl Into<PathBuf>,
        dest_parent: impl Into<PathBuf>,
    ) -> Result<Option<PathBuf>, SyncError> {
        let (source, dest_parent) = (source.into(), dest_parent.into());
        self.run(move |store| store.move_folder(&source, &dest_parent))
            .await
    }

    pub async fn list_entries(
        &self,
        dir: impl Into<PathBuf>,
        mode: ListMode,
    ) -> Result<Vec<ScratchEntry>, SyncError> {
        let dir = dir.into();
        self.run(move |store| store.list_entries(&dir, mode)).await
    }

    pub async fn read_session_record(&self) -> Result<SessionRecord, SyncError> {
        self.run(|store| Ok(store.read_session_record())).await
    }

    pub async fn write_session_record(&self, record: SessionRecord) -> Result<(), SyncError> {
        self.run(move |store| store.write_session_record(&record))
            .await
    }

    pub async fn add_to_session(&self, path: impl Into<PathBuf>) -> Result<bool, SyncError> {
        let path = path.into();
        self.run(move |store| store.add_to_session(&path)).await
    }

    pub async fn remove_from_session(&self, path: impl Into<PathBuf>) -> Result<bool, SyncError> {
        let path = path.into();
        self.run(move |store| store.remove_from_session(&path)).await
    }

    pub async fn clear_session(&self) -> Result<(), SyncError> {
        self.run(|store| store.clear_session()).await
    }
}
