use scratchpad_core::{write_atomic, GLOBAL_ROOT_DIR};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const PREFERENCES_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("failed to read preferences {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse preferences {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize preferences {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write preferences {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchPreferences {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub storage: StoragePreferences,
    #[serde(default)]
    pub naming: NamingPreferences,
    #[serde(default)]
    pub timing: TimingPreferences,
}

fn default_version() -> u32 {
    PREFERENCES_VERSION
}

impl Default for ScratchPreferences {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            storage: StoragePreferences::default(),
            naming: NamingPreferences::default(),
            timing: TimingPreferences::default(),
        }
    }
}

impl ScratchPreferences {
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = PREFERENCES_VERSION;
        }
        self.storage.sanitize();
        self.naming.sanitize();
        self.timing.sanitize();
    }

    /// 解析全域根目錄：設定值優先，否則使用使用者資料夾。 / Resolves the Global root: explicit override first, then the per-user data dir.
    pub fn global_root(&self) -> PathBuf {
        if let Some(root) = &self.storage.global_root {
            return root.clone();
        }
        default_global_root()
    }
}

/// Per-user application-data location of the Global root.
pub fn default_global_root() -> PathBuf {
    match dirs::data_local_dir() {
        Some(data) => data.join(GLOBAL_ROOT_DIR),
        None => dirs::home_dir()
            .unwrap_or_default()
            .join(".scratchpad")
            .join(GLOBAL_ROOT_DIR),
    }
}

/// 儲存位置設定。 / Where scratch files live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_root: Option<PathBuf>,
    #[serde(default = "default_solution_subdir")]
    pub solution_subdir: PathBuf,
}

fn default_solution_subdir() -> PathBuf {
    PathBuf::from(".vs").join(GLOBAL_ROOT_DIR)
}

impl Default for StoragePreferences {
    fn default() -> Self {
        Self {
            global_root: None,
            solution_subdir: default_solution_subdir(),
        }
    }
}

impl StoragePreferences {
    fn sanitize(&mut self) {
        if self
            .global_root
            .as_ref()
            .map(|root| root.as_os_str().is_empty())
            .unwrap_or(false)
        {
            self.global_root = None;
        }
        if self.solution_subdir.as_os_str().is_empty() || self.solution_subdir.is_absolute() {
            self.solution_subdir = default_solution_subdir();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingPreferences {
    #[serde(default = "default_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_extension")]
    pub default_extension: String,
}

fn default_prefix() -> String {
    "scratch".to_string()
}

fn default_extension() -> String {
    ".txt".to_string()
}

impl Default for NamingPreferences {
    fn default() -> Self {
        Self {
            file_prefix: default_prefix(),
            default_extension: default_extension(),
        }
    }
}

impl NamingPreferences {
    fn sanitize(&mut self) {
        let prefix = self.file_prefix.trim();
        if prefix.is_empty() || prefix.contains(['/', '\\']) || prefix.starts_with('.') {
            self.file_prefix = default_prefix();
        } else {
            self.file_prefix = prefix.to_string();
        }

        let extension = self.default_extension.trim().trim_start_matches('.');
        if extension.is_empty() || extension.contains(['/', '\\']) {
            self.default_extension = default_extension();
        } else {
            self.default_extension = format!(".{extension}");
        }
    }
}

/// 防彈跳與穩定等待時間（毫秒）。 / Debounce and settle windows in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingPreferences {
    #[serde(default = "default_rebuild_debounce")]
    pub rebuild_debounce_ms: u64,
    #[serde(default = "default_autosave_debounce")]
    pub autosave_debounce_ms: u64,
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

fn default_rebuild_debounce() -> u64 {
    300
}

fn default_autosave_debounce() -> u64 {
    1000
}

fn default_settle_delay() -> u64 {
    500
}

impl Default for TimingPreferences {
    fn default() -> Self {
        Self {
            rebuild_debounce_ms: default_rebuild_debounce(),
            autosave_debounce_ms: default_autosave_debounce(),
            settle_delay_ms: default_settle_delay(),
        }
    }
}

impl TimingPreferences {
    fn sanitize(&mut self) {
        if self.rebuild_debounce_ms == 0 {
            self.rebuild_debounce_ms = default_rebuild_debounce();
        }
        if self.autosave_debounce_ms == 0 {
            self.autosave_debounce_ms = default_autosave_debounce();
        }
        self.rebuild_debounce_ms = self.rebuild_debounce_ms.clamp(10, 10_000);
        self.autosave_debounce_ms = self.autosave_debounce_ms.clamp(50, 60_000);
        self.settle_delay_ms = self.settle_delay_ms.min(10_000);
    }

    pub fn rebuild_debounce(&self) -> Duration {
        Duration::from_millis(self.rebuild_debounce_ms)
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    data: ScratchPreferences,
}

impl PreferencesStore {
    pub fn new(path: impl Into<PathBuf>, preferences: ScratchPreferences) -> Self {
        Self {
            path: path.into(),
            data: preferences,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PreferencesError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            let mut data = ScratchPreferences::default();
            data.sanitize();
            return Ok(Self { path, data });
        }

        let contents = fs::read_to_string(&path).map_err(|source| PreferencesError::Read {
            path: path.clone(),
            source,
        })?;
        let mut data: ScratchPreferences =
            serde_json::from_str(&contents).map_err(|source| PreferencesError::Parse {
                path: path.clone(),
                source,
            })?;
        data.sanitize();
        Ok(Self { path, data })
    }

    pub fn preferences(&self) -> &ScratchPreferences {
        &self.data
    }

    pub fn into_preferences(self) -> ScratchPreferences {
        self.data
    }

    pub fn update<F>(&mut self, mut op: F) -> Result<(), PreferencesError>
    where
        F: FnMut(&mut ScratchPreferences),
    {
        op(&mut self.data);
        self.data.sanitize();
        self.save()
    }

    pub fn overwrite(&mut self, preferences: ScratchPreferences) -> Result<(), PreferencesError> {
        self.data = preferences;
        self.data.sanitize();
        self.save()
    }

    /// 以隱藏暫存檔原子寫入。 / Writes through a hidden temp sibling and rename.
    pub fn save(&self) -> Result<(), PreferencesError> {
        let payload = serde_json::to_string_pretty(&self.data).map_err(|source| {
            PreferencesError::Serialize {
                path: self.path.clone(),
                source,
            }
        })?;
        write_atomic(&self.path, payload.as_bytes()).map_err(|source| PreferencesError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
