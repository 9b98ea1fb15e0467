//! Scratch workspace storage: guarded CRUD, the open-file session record and tree snapshots.
//! 暫存工作區儲存：受範圍保護的檔案操作、開啟檔案紀錄與樹狀快照。

mod serde_path;

pub mod session;
pub mod store;
pub mod tree;

pub use session::{SessionError, SessionRecord, SessionStore, SESSION_FILE_NAME};
pub use store::{
    is_valid_entry_name, EntryKind, ListMode, ScratchEntry, StoreError, StoreOptions,
    WorkspaceStore,
};
pub use tree::{ScratchNode, ScratchTree};
