//! Path policy, naming, debounce and watcher primitives for Scratchpad.
//! Scratchpad 的路徑範圍、命名、防彈跳與檔案監看基礎模組。

pub mod debounce;
pub mod file_monitor;
pub mod naming;
pub mod scope;
pub mod util;

pub use debounce::{DebounceState, Debouncer};
pub use file_monitor::{FileEvent, FileMonitor, FileMonitorError, FileMonitorEventKind};
pub use naming::{collision_prefix, next_number, normalize_extension, numbered_name};
pub use scope::{
    is_reserved_name, is_same_or_descendant, normalize_path, paths_equal, ParseScopeError,
    PathKey, ScratchRoots, ScratchScope, DEFAULT_SOLUTION_SUBDIR, GLOBAL_ROOT_DIR,
    RESERVED_MARKER,
};
pub use util::write_atomic;
