use scratchpad_core::FileMonitorError;
use scratchpad_project::StoreError;
use thiserror::Error;

use crate::host::HostError;

/// 同步層的錯誤。 / Errors surfaced by the sync layer.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Monitor(#[from] FileMonitorError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("sync engine has been shut down")]
    ShutDown,
}
