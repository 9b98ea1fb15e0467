//! Versioned preferences for Scratchpad: storage roots, naming and timing.
//! Scratchpad 偏好設定：儲存位置、命名與時間參數。

pub mod preferences;

pub use preferences::{
    default_global_root, NamingPreferences, PreferencesError, PreferencesStore,
    ScratchPreferences, StoragePreferences, TimingPreferences,
};
