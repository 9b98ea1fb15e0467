use std::fs;
use std::io;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use scratchpad_core::{normalize_path, write_atomic, PathKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// File name of the session record inside the Global root.
/// 工作階段紀錄在全域根目錄中的檔名。
pub const SESSION_FILE_NAME: &str = ".session.json";

/// Paths considered "open" across restarts.
/// 跨重新啟動仍視為「開啟中」的檔案清單。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default, with = "crate::serde_path::vec")]
    pub open_files: Vec<PathBuf>,
}

impl SessionRecord {
    pub fn is_empty(&self) -> bool {
        self.open_files.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        let key = PathKey::new(path);
        self.open_files.iter().any(|entry| PathKey::new(entry) == key)
    }

    /// Adds the path unless an equivalent entry already exists.
    /// 加入路徑；若已存在同等路徑則略過。
    pub fn insert(&mut self, path: &Path) -> bool {
        if self.contains(path) {
            return false;
        }
        self.open_files.push(normalize_path(path));
        true
    }

    pub fn remove(&mut self, path: &Path) -> bool {
        let key = PathKey::new(path);
        let before = self.open_files.len();
        self.open_files.retain(|entry| PathKey::new(entry) != key);
        before != self.open_files.len()
    }

    fn dedup(&mut self) {
        let mut seen = Vec::with_capacity(self.open_files.len());
        self.open_files.retain(|entry| {
            let key = PathKey::new(entry);
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });
    }
}

/// Error type for session persistence.
/// 工作階段持久化時可能出現的錯誤。
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid session payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Reads and rewrites the session record on disk.
/// 管理磁碟上的工作階段紀錄。
///
/// Read/modify/write cycles are serialized inside the process; across
/// processes the last writer wins.
#[derive(Debug)]
pub struct SessionStore {
    session_path: PathBuf,
    guard: Mutex<()>,
}

impl SessionStore {
    pub fn new(session_path: impl AsRef<Path>) -> Self {
        Self {
            session_path: session_path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    /// Store bound to `<global_root>/.session.json`.
    pub fn in_root(global_root: &Path) -> Self {
        Self::new(global_root.join(SESSION_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.session_path
    }

    /// Loads the record; a missing or unreadable file is an empty session.
    /// 載入紀錄；檔案不存在或無法解析時視為空白工作階段。
    pub fn read(&self) -> SessionRecord {
        let _guard = self.guard.lock();
        self.read_unlocked()
    }

    /// Persists the record using atomic writes.
    /// 以原子寫入方式儲存紀錄。
    pub fn write(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let _guard = self.guard.lock();
        self.write_unlocked(record)
    }

    pub fn add(&self, path: &Path) -> Result<bool, SessionError> {
        self.modify(|record| record.insert(path))
    }

    pub fn remove(&self, path: &Path) -> Result<bool, SessionError> {
        self.modify(|record| record.remove(path))
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        let _guard = self.guard.lock();
        self.write_unlocked(&SessionRecord::default())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.read().contains(path)
    }

    fn modify<F>(&self, op: F) -> Result<bool, SessionError>
    where
        F: FnOnce(&mut SessionRecord) -> bool,
    {
        let _guard = self.guard.lock();
        let mut record = self.read_unlocked();
        let changed = op(&mut record);
        if changed {
            self.write_unlocked(&record)?;
        }
        Ok(changed)
    }

    fn read_unlocked(&self) -> SessionRecord {
        let contents = match fs::read_to_string(&self.session_path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return SessionRecord::default(),
            Err(err) => {
                warn!(path = %self.session_path.display(), error = %err, "session record unreadable, starting empty");
                return SessionRecord::default();
            }
        };
        match serde_json::from_str::<SessionRecord>(&contents) {
            Ok(mut record) => {
                record.dedup();
                record
            }
            Err(err) => {
                warn!(path = %self.session_path.display(), error = %err, "session record malformed, starting empty");
                SessionRecord::default()
            }
        }
    }

    fn write_unlocked(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let json = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.session_path, &json)?;
        debug!(path = %self.session_path.display(), entries = record.open_files.len(), "session record written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn record_round_trips_through_disk() {
        let tmp = tempdir().unwrap();
        let store = SessionStore::in_root(tmp.path());
        let alpha = tmp.path().join("alpha.txt");
        let beta = tmp.path().join("beta.txt");

        assert!(store.add(&alpha).unwrap());
        assert!(store.add(&beta).unwrap());

        let loaded = store.read();
        assert_eq!(loaded.open_files, vec![alpha.clone(), beta.clone()]);
        assert!(store.contains(&alpha));

        let raw = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["open_files"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn missing_file_is_empty_session() {
        let tmp = tempdir().unwrap();
        let store = SessionStore::in_root(&tmp.path().join("absent"));
        assert!(store.read().is_empty());
    }

    #[test]
    fn malformed_file_is_empty_session() {
        let tmp = tempdir().unwrap();
        let store = SessionStore::in_root(tmp.path());
        fs::write(store.path(), "{ \"open_files\": [1, 2").unwrap();
        assert!(store.read().is_empty());

        fs::write(store.path(), "[]").unwrap();
        assert!(store.read().is_empty());
    }

    #[test]
    fn duplicates_collapse_case_insensitively() {
        let tmp = tempdir().unwrap();
        let store = SessionStore::in_root(tmp.path());
        let path = tmp.path().join("Note.txt");
        assert!(store.add(&path).unwrap());
        assert!(!store.add(&tmp.path().join("note.TXT")).unwrap());
        assert_eq!(store.read().open_files.len(), 1);

        assert!(store.remove(&tmp.path().join("NOTE.txt")).unwrap());
        assert!(store.read().is_empty());
        assert!(!store.remove(&path).unwrap());
    }

    #[test]
    fn clear_empties_the_record() {
        let tmp = tempdir().unwrap();
        let store = SessionStore::in_root(tmp.path());
        store.add(&tmp.path().join("a.txt")).unwrap();
        store.clear().unwrap();
        assert!(store.read().is_empty());
        assert!(store.path().exists());
    }
}
