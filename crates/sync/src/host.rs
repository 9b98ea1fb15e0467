use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use scratchpad_project::{StoreError, WorkspaceStore};
use thiserror::Error;

/// Opaque handle to an open editor buffer.
/// 編輯器緩衝區的不透明識別碼。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

impl BufferId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("could not open {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("could not save {path}: {reason}")]
    Save { path: PathBuf, reason: String },
    #[error("unknown buffer {0}")]
    UnknownBuffer(BufferId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 宿主編輯器提供的操作。 / What the hosting editor provides.
///
/// Both calls are made from blocking worker threads, never from the async
/// executor.
pub trait EditorHost: Send + Sync + 'static {
    /// Opens `path` in the editor and returns the buffer showing it.
    fn open_document(&self, path: &Path) -> Result<BufferId, HostError>;

    /// Writes the buffer's current content to `path` without changing its
    /// "scratch" presentation.
    fn save_in_place(&self, path: &Path, buffer: BufferId) -> Result<(), HostError>;
}

/// 以記憶體文字緩衝區實作的宿主。 / Host keeping buffer text in memory and saving through the store.
///
/// Used by the command line front-end and by tests; a GUI host supplies its
/// own implementation.
#[derive(Debug)]
pub struct StoreBackedHost {
    store: Arc<WorkspaceStore>,
    next_id: AtomicU64,
    buffers: DashMap<BufferId, String>,
    saves: AtomicU64,
}

impl StoreBackedHost {
    pub fn new(store: Arc<WorkspaceStore>) -> Self {
        Self {
            store,
            next_id: AtomicU64::new(1),
            buffers: DashMap::new(),
            saves: AtomicU64::new(0),
        }
    }

    /// Replaces the buffer's text, as a keystroke would.
    pub fn set_text(&self, buffer: BufferId, text: impl Into<String>) -> Result<(), HostError> {
        match self.buffers.get_mut(&buffer) {
            Some(mut current) => {
                *current = text.into();
                Ok(())
            }
            None => Err(HostError::UnknownBuffer(buffer)),
        }
    }

    pub fn text(&self, buffer: BufferId) -> Option<String> {
        self.buffers.get(&buffer).map(|text| text.clone())
    }

    pub fn open_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Number of successful `save_in_place` calls.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

impl EditorHost for StoreBackedHost {
    fn open_document(&self, path: &Path) -> Result<BufferId, HostError> {
        let text = self
            .store
            .read_file(path)?
            .ok_or_else(|| HostError::Open {
                path: path.to_path_buf(),
                reason: "not a scratch file".to_string(),
            })?;
        let id = BufferId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.buffers.insert(id, text);
        Ok(id)
    }

    fn save_in_place(&self, path: &Path, buffer: BufferId) -> Result<(), HostError> {
        let text = self.text(buffer).ok_or(HostError::UnknownBuffer(buffer))?;
        if !self.store.write_file(path, &text)? {
            return Err(HostError::Save {
                path: path.to_path_buf(),
                reason: "outside the scratch roots".to_string(),
            });
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
