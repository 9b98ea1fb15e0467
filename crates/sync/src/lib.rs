//! Live synchronization for scratch workspaces: debounced tree rebuilds,
//! auto-save of open buffers and the session-scoped service tying them together.
//! 暫存工作區的即時同步：防彈跳重建、自動儲存與工作階段服務。

pub mod engine;
pub mod error;
pub mod host;
pub mod offload;
pub mod options;
pub mod service;
pub mod signals;
pub mod tracker;

pub use engine::DirectorySyncEngine;
pub use error::SyncError;
pub use host::{BufferId, EditorHost, HostError, StoreBackedHost};
pub use offload::AsyncWorkspaceStore;
pub use options::SyncOptions;
pub use service::ScratchService;
pub use signals::{ScratchSignal, SignalReceiver, SignalSender};
pub use tracker::BufferSessionTracker;
