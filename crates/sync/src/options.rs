use std::time::Duration;

use scratchpad_settings::{ScratchPreferences, TimingPreferences};

/// 防彈跳與穩定時間。 / Timing knobs for the tracker and the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub rebuild_debounce: Duration,
    pub autosave_debounce: Duration,
    /// How long watcher raising stays off after a suppressed mutation.
    pub settle_delay: Duration,
    /// Install native watchers on the roots. Hosts that forward their own
    /// events through `handle_watcher_event` can turn this off.
    pub watch_roots: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&TimingPreferences::default())
    }
}

impl From<&TimingPreferences> for SyncOptions {
    fn from(timing: &TimingPreferences) -> Self {
        Self {
            rebuild_debounce: timing.rebuild_debounce(),
            autosave_debounce: timing.autosave_debounce(),
            settle_delay: timing.settle_delay(),
            watch_roots: true,
        }
    }
}

impl From<&ScratchPreferences> for SyncOptions {
    fn from(prefs: &ScratchPreferences) -> Self {
        Self::from(&prefs.timing)
    }
}
