use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use scratchpad_core::{
    collision_prefix, is_same_or_descendant, next_number, normalize_extension, normalize_path,
    numbered_name, paths_equal, ScratchRoots, ScratchScope, DEFAULT_SOLUTION_SUBDIR,
    write_atomic, RESERVED_MARKER,
};
use scratchpad_settings::ScratchPreferences;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::session::{SessionError, SessionRecord, SessionStore};

/// Upper bound on exclusive-create retries when a numbered name is taken.
const MAX_CREATE_ATTEMPTS: u32 = 64;

/// Errors raised by [`WorkspaceStore`]. Policy violations are not errors;
/// they come back as `Ok(None)` / `Ok(false)`.
/// [`WorkspaceStore`] 的錯誤；範圍違規不屬於錯誤，而是回傳 `None`/`false`。
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("scratch store IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl StoreError {
    /// Underlying IO error kind, when there is one.
    pub fn io_kind(&self) -> Option<ErrorKind> {
        match self {
            StoreError::Io { source, .. } => Some(source.kind()),
            StoreError::Session(SessionError::Io(source)) => Some(source.kind()),
            StoreError::Session(_) => None,
        }
    }
}

trait IoContext<T> {
    fn at(self, path: &Path) -> Result<T, StoreError>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T, StoreError> {
        self.map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Naming and layout knobs for the store.
/// 儲存區的命名與目錄設定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub file_prefix: String,
    pub default_extension: String,
    pub solution_subdir: PathBuf,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            file_prefix: "scratch".to_string(),
            default_extension: ".txt".to_string(),
            solution_subdir: PathBuf::from(DEFAULT_SOLUTION_SUBDIR),
        }
    }
}

impl From<&ScratchPreferences> for StoreOptions {
    fn from(prefs: &ScratchPreferences) -> Self {
        Self {
            file_prefix: prefs.naming.file_prefix.clone(),
            default_extension: prefs.naming.default_extension.clone(),
            solution_subdir: prefs.storage.solution_subdir.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

/// One enumerated file or folder.
/// 列舉出的單一檔案或資料夾。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchEntry {
    pub path: PathBuf,
    pub name: String,
    pub kind: EntryKind,
    /// Nesting below the listed directory, `0` for its immediate children.
    pub depth: usize,
}

impl ScratchEntry {
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    OneLevel,
    Recursive,
}

/// CRUD over scratch entries, guarded by the root path policy.
/// 受根目錄範圍規則保護的暫存項目操作。
///
/// Every operation normalizes its inputs and checks them against the
/// current roots before touching the disk. Roots themselves can be listed
/// and used as destinations, but never deleted, renamed or moved.
#[derive(Debug)]
pub struct WorkspaceStore {
    roots: RwLock<ScratchRoots>,
    options: StoreOptions,
    session: SessionStore,
}

impl WorkspaceStore {
    pub fn new(global_root: impl AsRef<Path>, options: StoreOptions) -> Self {
        let roots = ScratchRoots::new(global_root);
        let session = SessionStore::in_root(roots.global());
        Self {
            roots: RwLock::new(roots),
            options,
            session,
        }
    }

    pub fn from_preferences(prefs: &ScratchPreferences) -> Self {
        Self::new(prefs.global_root(), StoreOptions::from(prefs))
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Snapshot of the current roots.
    pub fn roots(&self) -> ScratchRoots {
        self.roots.read().clone()
    }

    /// 工作區開啟/關閉時重新解析方案根目錄。 / Re-resolves the Solution root on workspace open/close.
    pub fn set_workspace(&self, workspace_dir: Option<&Path>) {
        let mut roots = self.roots.write();
        roots.set_workspace(workspace_dir, &self.options.solution_subdir);
        info!(solution = ?roots.solution(), "solution root resolved");
    }

    pub fn root_for(&self, scope: ScratchScope) -> Option<PathBuf> {
        self.roots.read().root_for(scope).map(Path::to_path_buf)
    }

    /// Creates the root for `scope` if needed. `None` when it has no root.
    pub fn ensure_root(&self, scope: ScratchScope) -> Result<Option<PathBuf>, StoreError> {
        let Some(root) = self.root_for(scope) else {
            return Ok(None);
        };
        fs::create_dir_all(&root).at(&root)?;
        Ok(Some(root))
    }

    pub fn is_in_scope(&self, path: &Path) -> bool {
        self.roots.read().is_in_scope(path)
    }

    pub fn is_root(&self, path: &Path) -> bool {
        self.roots.read().is_root(path)
    }

    pub fn classify_scope(&self, path: &Path) -> ScratchScope {
        self.roots.read().classify_scope(path)
    }

    fn is_strict_descendant(&self, path: &Path) -> bool {
        self.roots.read().is_strict_descendant(path)
    }

    // ----- files -----------------------------------------------------------

    /// 在範圍根目錄建立下一個編號檔案。 / Creates the next numbered file at the root of `scope`.
    ///
    /// `Ok(None)` when the scope has no resolvable root.
    pub fn create_file(
        &self,
        scope: ScratchScope,
        content: Option<&str>,
    ) -> Result<Option<PathBuf>, StoreError> {
        let Some(root) = self.ensure_root(scope)? else {
            return Ok(None);
        };
        self.create_file_in(&root, content)
    }

    /// Creates the next numbered file inside an existing in-scope folder.
    pub fn create_file_in(
        &self,
        folder: &Path,
        content: Option<&str>,
    ) -> Result<Option<PathBuf>, StoreError> {
        let folder = normalize_path(folder);
        if !self.is_in_scope(&folder) {
            return Ok(None);
        }
        if self.is_root(&folder) {
            fs::create_dir_all(&folder).at(&folder)?;
        } else if !folder.is_dir() {
            return Ok(None);
        }

        let prefix = &self.options.file_prefix;
        let mut number = next_number(&folder, prefix);
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let path = folder.join(numbered_name(prefix, number, &self.options.default_extension));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(content.unwrap_or_default().as_bytes())
                        .at(&path)?;
                    debug!(path = %path.display(), "scratch file created");
                    return Ok(Some(path));
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    number = number.saturating_add(1);
                }
                Err(err) => return Err(err).at(&path),
            }
        }

        Err(StoreError::Io {
            path: folder,
            source: io::Error::new(
                ErrorKind::AlreadyExists,
                "no free scratch file name after repeated attempts",
            ),
        })
    }

    /// Reads a scratch file. `None` when out of scope or missing.
    pub fn read_file(&self, path: &Path) -> Result<Option<String>, StoreError> {
        let path = normalize_path(path);
        if !self.is_strict_descendant(&path) {
            return Ok(None);
        }
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).at(&path),
        }
    }

    /// 以原子寫入儲存內容。 / Persists content in place; the save path used for auto-save.
    pub fn write_file(&self, path: &Path, content: &str) -> Result<bool, StoreError> {
        let path = normalize_path(path);
        if !self.is_strict_descendant(&path) || path.is_dir() {
            return Ok(false);
        }
        match path.parent() {
            Some(parent) if parent.is_dir() => {}
            _ => return Ok(false),
        }
        write_atomic(&path, content.as_bytes()).at(&path)?;
        Ok(true)
    }

    pub fn delete_file(&self, path: &Path) -> Result<bool, StoreError> {
        let path = normalize_path(path);
        if !self.is_strict_descendant(&path) || !path.is_file() {
            return Ok(false);
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "scratch file deleted");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).at(&path),
        }
    }

    /// Same-folder rename. `None` when the target exists or the source is out of scope.
    pub fn rename_file(&self, path: &Path, new_name: &str) -> Result<Option<PathBuf>, StoreError> {
        let path = normalize_path(path);
        if !self.is_strict_descendant(&path) || !path.is_file() {
            return Ok(None);
        }
        self.rename_entry(&path, new_name)
    }

    /// 只更換副檔名。 / Renames in place, changing only the extension.
    ///
    /// A leading dot is optional; an empty extension strips it. An unchanged
    /// extension (compared case-insensitively) returns the original path.
    pub fn change_extension(
        &self,
        path: &Path,
        new_extension: &str,
    ) -> Result<Option<PathBuf>, StoreError> {
        let path = normalize_path(path);
        if !self.is_strict_descendant(&path) || !path.is_file() {
            return Ok(None);
        }
        let extension = normalize_extension(new_extension);
        if extension.contains(['/', '\\']) {
            return Ok(None);
        }
        let current = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        if current.eq_ignore_ascii_case(&extension) {
            return Ok(Some(path));
        }
        let Some(stem) = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()) else {
            return Ok(None);
        };
        self.rename_entry(&path, &format!("{stem}{extension}"))
    }

    /// 搬移檔案；名稱衝突時自動編號。 / Moves a file into `dest_folder`, numbering around name collisions.
    pub fn move_file(
        &self,
        source: &Path,
        dest_folder: &Path,
    ) -> Result<Option<PathBuf>, StoreError> {
        let source = normalize_path(source);
        let dest_folder = normalize_path(dest_folder);
        if !self.is_strict_descendant(&source) || !source.is_file() {
            return Ok(None);
        }
        if !self.is_in_scope(&dest_folder) || (dest_folder.exists() && !dest_folder.is_dir()) {
            return Ok(None);
        }
        if source
            .parent()
            .map(|parent| paths_equal(parent, &dest_folder))
            .unwrap_or(false)
        {
            return Ok(Some(source));
        }
        let Some(name) = source.file_name().map(|name| name.to_string_lossy().into_owned()) else {
            return Ok(None);
        };

        fs::create_dir_all(&dest_folder).at(&dest_folder)?;
        let mut target = dest_folder.join(&name);
        if target.exists() {
            let (prefix, extension) = collision_prefix(&name);
            let mut number = next_number(&dest_folder, &prefix);
            target = dest_folder.join(numbered_name(&prefix, number, &extension));
            while target.exists() {
                number = number.saturating_add(1);
                target = dest_folder.join(numbered_name(&prefix, number, &extension));
            }
        }

        relocate_file(&source, &target)?;
        debug!(from = %source.display(), to = %target.display(), "scratch file moved");
        Ok(Some(target))
    }

    /// Moves a file to the root of another scope. `None` when that scope has no root.
    pub fn move_to_scope(
        &self,
        source: &Path,
        scope: ScratchScope,
    ) -> Result<Option<PathBuf>, StoreError> {
        let source = normalize_path(source);
        if !self.is_strict_descendant(&source) || !source.is_file() {
            return Ok(None);
        }
        let Some(root) = self.ensure_root(scope)? else {
            return Ok(None);
        };
        self.move_file(&source, &root)
    }

    // ----- folders ---------------------------------------------------------

    pub fn create_sub_folder(
        &self,
        parent: &Path,
        name: &str,
    ) -> Result<Option<PathBuf>, StoreError> {
        let parent = normalize_path(parent);
        if !self.is_in_scope(&parent) || !is_valid_entry_name(name) {
            return Ok(None);
        }
        if self.is_root(&parent) {
            fs::create_dir_all(&parent).at(&parent)?;
        } else if !parent.is_dir() {
            return Ok(None);
        }
        let target = parent.join(name);
        if target.exists() {
            return Ok(None);
        }
        match fs::create_dir(&target) {
            Ok(()) => Ok(Some(target)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(err) => Err(err).at(&target),
        }
    }

    pub fn rename_folder(
        &self,
        path: &Path,
        new_name: &str,
    ) -> Result<Option<PathBuf>, StoreError> {
        let path = normalize_path(path);
        if !self.is_strict_descendant(&path) || !path.is_dir() {
            return Ok(None);
        }
        self.rename_entry(&path, new_name)
    }

    /// 搬移資料夾；拒絕搬入自身或其子孫。 / Moves a folder under `dest_parent`, refusing its own subtree.
    pub fn move_folder(
        &self,
        source: &Path,
        dest_parent: &Path,
    ) -> Result<Option<PathBuf>, StoreError> {
        let source = normalize_path(source);
        let dest_parent = normalize_path(dest_parent);
        if !self.is_strict_descendant(&source) || !source.is_dir() {
            return Ok(None);
        }
        if !self.is_in_scope(&dest_parent) || is_same_or_descendant(&dest_parent, &source) {
            return Ok(None);
        }
        if source
            .parent()
            .map(|parent| paths_equal(parent, &dest_parent))
            .unwrap_or(false)
        {
            return Ok(Some(source));
        }
        if self.is_root(&dest_parent) {
            fs::create_dir_all(&dest_parent).at(&dest_parent)?;
        } else if !dest_parent.is_dir() {
            return Ok(None);
        }
        let Some(name) = source.file_name() else {
            return Ok(None);
        };
        let target = dest_parent.join(name);
        if target.exists() {
            return Ok(None);
        }

        relocate_folder(&source, &target)?;
        debug!(from = %source.display(), to = %target.display(), "scratch folder moved");
        Ok(Some(target))
    }

    /// Recursive delete. Roots are refused.
    pub fn delete_folder(&self, path: &Path) -> Result<bool, StoreError> {
        let path = normalize_path(path);
        if !self.is_strict_descendant(&path) || !path.is_dir() {
            return Ok(false);
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "scratch folder deleted");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).at(&path),
        }
    }

    fn rename_entry(&self, path: &Path, new_name: &str) -> Result<Option<PathBuf>, StoreError> {
        if !is_valid_entry_name(new_name) {
            return Ok(None);
        }
        let Some(parent) = path.parent() else {
            return Ok(None);
        };
        let target = parent.join(new_name);
        if target == path {
            return Ok(Some(target));
        }
        if target.exists() {
            // A case-only rename finds the source itself on case-insensitive
            // filesystems; any entry spelled exactly like `new_name` is another file.
            if !paths_equal(&target, path) || has_exact_entry(parent, new_name).at(parent)? {
                return Ok(None);
            }
        }
        fs::rename(path, &target).at(path)?;
        debug!(from = %path.display(), to = %target.display(), "scratch entry renamed");
        Ok(Some(target))
    }

    // ----- enumeration -----------------------------------------------------

    /// 依名稱（不分大小寫）列出資料夾再列出檔案。 / Lists sub-folders then files, each ordered case-insensitively.
    ///
    /// Names starting with the reserved marker are skipped. In recursive mode
    /// every folder is followed by its own contents.
    pub fn list_entries(&self, dir: &Path, mode: ListMode) -> Result<Vec<ScratchEntry>, StoreError> {
        let dir = normalize_path(dir);
        let mut entries = Vec::new();
        if self.is_in_scope(&dir) {
            collect_entries(&dir, mode, 0, &mut entries)?;
        }
        Ok(entries)
    }

    // ----- session record --------------------------------------------------

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn read_session_record(&self) -> SessionRecord {
        self.session.read()
    }

    pub fn write_session_record(&self, record: &SessionRecord) -> Result<(), StoreError> {
        Ok(self.session.write(record)?)
    }

    pub fn add_to_session(&self, path: &Path) -> Result<bool, StoreError> {
        Ok(self.session.add(path)?)
    }

    pub fn remove_from_session(&self, path: &Path) -> Result<bool, StoreError> {
        Ok(self.session.remove(path)?)
    }

    pub fn clear_session(&self) -> Result<(), StoreError> {
        Ok(self.session.clear()?)
    }
}

/// Plain single-component names that do not start with the reserved marker.
pub fn is_valid_entry_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name != ".."
        && !name.starts_with(RESERVED_MARKER)
        && !name.contains(['/', '\\', '\0'])
}

fn has_exact_entry(dir: &Path, name: &str) -> io::Result<bool> {
    for entry in fs::read_dir(dir)? {
        if entry?.file_name() == name {
            return Ok(true);
        }
    }
    Ok(false)
}

fn collect_entries(
    dir: &Path,
    mode: ListMode,
    depth: usize,
    out: &mut Vec<ScratchEntry>,
) -> Result<(), StoreError> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err).at(dir),
    };

    let mut folders = Vec::new();
    let mut files = Vec::new();
    for entry in read_dir {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(err).at(dir),
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(RESERVED_MARKER) {
            continue;
        }
        let is_dir = entry.file_type().map(|ty| ty.is_dir()).unwrap_or(false);
        let item = ScratchEntry {
            path: entry.path(),
            name,
            kind: if is_dir { EntryKind::Folder } else { EntryKind::File },
            depth,
        };
        if is_dir {
            folders.push(item);
        } else {
            files.push(item);
        }
    }

    let by_name = |a: &ScratchEntry, b: &ScratchEntry| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    };
    folders.sort_by(by_name);
    files.sort_by(by_name);

    for folder in folders {
        let path = folder.path.clone();
        out.push(folder);
        if mode == ListMode::Recursive {
            collect_entries(&path, mode, depth + 1, out)?;
        }
    }
    out.extend(files);
    Ok(())
}

/// Rename, falling back to copy + remove when the rename is refused
/// (typically a move across devices).
fn relocate_file(source: &Path, target: &Path) -> Result<(), StoreError> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if !source.is_file() || target.exists() {
                return Err(rename_err).at(source);
            }
            if fs::copy(source, target).is_err() {
                let _ = fs::remove_file(target);
                return Err(rename_err).at(source);
            }
            fs::remove_file(source).at(source)
        }
    }
}

fn relocate_folder(source: &Path, target: &Path) -> Result<(), StoreError> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if !source.is_dir() || target.exists() {
                return Err(rename_err).at(source);
            }
            if copy_dir_recursive(source, target).is_err() {
                let _ = fs::remove_dir_all(target);
                return Err(rename_err).at(source);
            }
            fs::remove_dir_all(source).at(source)
        }
    }
}

fn copy_dir_recursive(source: &Path, target: &Path) -> io::Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let destination = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &destination)?;
        } else {
            fs::copy(entry.path(), destination)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _tmp: TempDir,
        store: WorkspaceStore,
        global: PathBuf,
        workspace: PathBuf,
    }

    fn fixture() -> Fixture {
        let tmp = tempdir().unwrap();
        let global = tmp.path().join("data").join("ScratchFiles");
        let workspace = tmp.path().join("project");
        fs::create_dir_all(&workspace).unwrap();
        let store = WorkspaceStore::new(&global, StoreOptions::default());
        Fixture {
            _tmp: tmp,
            store,
            global,
            workspace,
        }
    }

    #[test]
    fn create_allocates_sequential_names() {
        let fx = fixture();
        let first = fx.store.create_file(ScratchScope::Global, None).unwrap().unwrap();
        let second = fx
            .store
            .create_file(ScratchScope::Global, Some("hello"))
            .unwrap()
            .unwrap();

        assert_eq!(first, fx.global.join("scratch1.txt"));
        assert_eq!(second, fx.global.join("scratch2.txt"));
        assert_eq!(fs::read_to_string(&first).unwrap(), "");
        assert_eq!(fs::read_to_string(&second).unwrap(), "hello");
    }

    #[test]
    fn solution_scope_requires_open_workspace() {
        let fx = fixture();
        assert!(fx.store.create_file(ScratchScope::Solution, None).unwrap().is_none());

        fx.store.set_workspace(Some(fx.workspace.as_path()));
        let created = fx
            .store
            .create_file(ScratchScope::Solution, None)
            .unwrap()
            .unwrap();
        assert!(created.starts_with(fx.workspace.join(".vs").join("ScratchFiles")));
        assert_eq!(fx.store.classify_scope(&created), ScratchScope::Solution);

        fx.store.set_workspace(None);
        assert!(!fx.store.is_in_scope(&created));
    }

    #[test]
    fn rename_onto_existing_name_is_refused() {
        let fx = fixture();
        let one = fx.store.create_file(ScratchScope::Global, Some("1")).unwrap().unwrap();
        let two = fx.store.create_file(ScratchScope::Global, Some("2")).unwrap().unwrap();

        assert!(fx.store.rename_file(&two, "scratch1.txt").unwrap().is_none());
        assert_eq!(fs::read_to_string(&one).unwrap(), "1");
        assert_eq!(fs::read_to_string(&two).unwrap(), "2");

        let renamed = fx.store.rename_file(&two, "todo.md").unwrap().unwrap();
        assert_eq!(renamed, fx.global.join("todo.md"));
        assert!(!two.exists());
    }

    #[test]
    fn case_only_rename_never_replaces_a_distinct_file() {
        let fx = fixture();
        fs::create_dir_all(&fx.global).unwrap();
        let lower = fx.global.join("a.txt");
        let upper = fx.global.join("A.txt");
        fs::write(&lower, "lower").unwrap();
        fs::write(&upper, "UPPER").unwrap();

        if fs::read_to_string(&lower).unwrap() == "lower" {
            // Case-sensitive filesystem: both files exist side by side.
            assert!(fx.store.rename_file(&lower, "A.txt").unwrap().is_none());
            assert_eq!(fs::read_to_string(&lower).unwrap(), "lower");
            assert_eq!(fs::read_to_string(&upper).unwrap(), "UPPER");
        } else {
            let renamed = fx.store.rename_file(&lower, "A.txt").unwrap().unwrap();
            assert_eq!(renamed, upper);
        }

        let solo = fx.global.join("solo.txt");
        fs::write(&solo, "only").unwrap();
        let renamed = fx.store.rename_file(&solo, "SOLO.txt").unwrap().unwrap();
        assert_eq!(renamed, fx.global.join("SOLO.txt"));
        assert_eq!(fs::read_to_string(&renamed).unwrap(), "only");
    }

    #[test]
    fn rename_rejects_bad_names_and_outside_paths() {
        let fx = fixture();
        let file = fx.store.create_file(ScratchScope::Global, None).unwrap().unwrap();
        for name in ["", "a/b", "..", ".hidden"] {
            assert!(fx.store.rename_file(&file, name).unwrap().is_none(), "{name:?}");
        }
        let outside = fx.workspace.join("main.rs");
        fs::write(&outside, "fn main() {}").unwrap();
        assert!(fx.store.rename_file(&outside, "x.rs").unwrap().is_none());
        assert!(outside.exists());
    }

    #[test]
    fn change_extension_normalizes_dot() {
        let fx = fixture();
        let file = fx.store.create_file(ScratchScope::Global, None).unwrap().unwrap();

        let same = fx.store.change_extension(&file, "TXT").unwrap().unwrap();
        assert_eq!(same, file);

        let md = fx.store.change_extension(&file, "md").unwrap().unwrap();
        assert_eq!(md, fx.global.join("scratch1.md"));
        let json = fx.store.change_extension(&md, ".json").unwrap().unwrap();
        assert_eq!(json, fx.global.join("scratch1.json"));
        let bare = fx.store.change_extension(&json, "").unwrap().unwrap();
        assert_eq!(bare, fx.global.join("scratch1"));
    }

    #[test]
    fn delete_refuses_roots_and_outside_paths() {
        let fx = fixture();
        fx.store.ensure_root(ScratchScope::Global).unwrap();
        assert!(!fx.store.delete_folder(&fx.global).unwrap());
        assert!(!fx.store.delete_file(&fx.global).unwrap());
        assert!(fx.global.is_dir());

        let outside = fx.workspace.join("keep.txt");
        fs::write(&outside, "keep").unwrap();
        assert!(!fx.store.delete_file(&outside).unwrap());
        assert!(!fx.store.delete_folder(&fx.workspace).unwrap());
        assert!(outside.exists());

        assert!(!fx.store.delete_file(&fx.global.join("missing.txt")).unwrap());
    }

    #[test]
    fn delete_folder_is_recursive() {
        let fx = fixture();
        let folder = fx
            .store
            .create_sub_folder(&fx.global, "notes")
            .unwrap()
            .unwrap();
        let nested = fx.store.create_sub_folder(&folder, "deep").unwrap().unwrap();
        fx.store.create_file_in(&nested, Some("x")).unwrap().unwrap();

        assert!(fx.store.delete_folder(&folder).unwrap());
        assert!(!folder.exists());
        assert!(fx.global.exists());
    }

    #[test]
    fn move_file_numbers_around_collisions() {
        let fx = fixture();
        let folder = fx.store.create_sub_folder(&fx.global, "inbox").unwrap().unwrap();
        fs::write(folder.join("scratch1.txt"), "old").unwrap();
        fs::write(folder.join("scratch4.txt"), "old").unwrap();
        let source = fx.store.create_file(ScratchScope::Global, Some("new")).unwrap().unwrap();

        let moved = fx.store.move_file(&source, &folder).unwrap().unwrap();
        assert_eq!(moved, folder.join("scratch5.txt"));
        assert_eq!(fs::read_to_string(&moved).unwrap(), "new");
        assert!(!source.exists());
    }

    #[test]
    fn move_file_uses_full_stem_without_digits() {
        let fx = fixture();
        let folder = fx.store.create_sub_folder(&fx.global, "inbox").unwrap().unwrap();
        fs::write(folder.join("notes.md"), "old").unwrap();
        let source = fx.global.join("notes.md");
        fs::write(&source, "new").unwrap();

        let moved = fx.store.move_file(&source, &folder).unwrap().unwrap();
        assert_eq!(moved, folder.join("notes1.md"));
    }

    #[test]
    fn move_file_creates_destination_and_skips_same_folder() {
        let fx = fixture();
        let source = fx.store.create_file(ScratchScope::Global, None).unwrap().unwrap();
        assert_eq!(
            fx.store.move_file(&source, &fx.global).unwrap().unwrap(),
            source
        );

        let dest = fx.global.join("a").join("b");
        let moved = fx.store.move_file(&source, &dest).unwrap().unwrap();
        assert_eq!(moved, dest.join("scratch1.txt"));
    }

    #[test]
    fn move_to_scope_needs_resolvable_root() {
        let fx = fixture();
        let source = fx.store.create_file(ScratchScope::Global, None).unwrap().unwrap();
        assert!(fx
            .store
            .move_to_scope(&source, ScratchScope::Solution)
            .unwrap()
            .is_none());
        assert!(source.exists());

        fx.store.set_workspace(Some(fx.workspace.as_path()));
        let moved = fx
            .store
            .move_to_scope(&source, ScratchScope::Solution)
            .unwrap()
            .unwrap();
        assert_eq!(fx.store.classify_scope(&moved), ScratchScope::Solution);
        assert!(!source.exists());
    }

    #[test]
    fn move_folder_refuses_own_subtree() {
        let fx = fixture();
        let a = fx.store.create_sub_folder(&fx.global, "A").unwrap().unwrap();
        let b = fx.store.create_sub_folder(&a, "B").unwrap().unwrap();
        fx.store.create_file_in(&b, Some("x")).unwrap();

        assert!(fx.store.move_folder(&a, &b).unwrap().is_none());
        assert!(fx.store.move_folder(&a, &a).unwrap().is_none());
        assert!(b.is_dir());
        assert!(b.join("scratch1.txt").is_file());
    }

    #[test]
    fn move_folder_relocates_contents() {
        let fx = fixture();
        let a = fx.store.create_sub_folder(&fx.global, "A").unwrap().unwrap();
        let c = fx.store.create_sub_folder(&fx.global, "C").unwrap().unwrap();
        fx.store.create_file_in(&a, Some("x")).unwrap();

        let moved = fx.store.move_folder(&a, &c).unwrap().unwrap();
        assert_eq!(moved, c.join("A"));
        assert!(moved.join("scratch1.txt").is_file());
        assert!(!a.exists());

        assert!(fx.store.move_folder(&fx.global, &c).unwrap().is_none());
    }

    #[test]
    fn folder_name_collisions_are_refused() {
        let fx = fixture();
        let a = fx.store.create_sub_folder(&fx.global, "A").unwrap().unwrap();
        assert!(fx.store.create_sub_folder(&fx.global, "A").unwrap().is_none());
        let b = fx.store.create_sub_folder(&fx.global, "B").unwrap().unwrap();
        assert!(fx.store.rename_folder(&b, "A").unwrap().is_none());
        assert_eq!(
            fx.store.rename_folder(&b, "Archive").unwrap().unwrap(),
            fx.global.join("Archive")
        );
        assert!(fx.store.rename_folder(&fx.global, "Other").unwrap().is_none());
        assert!(a.is_dir());
    }

    #[test]
    fn list_orders_folders_then_files_case_insensitively() {
        let fx = fixture();
        fx.store.ensure_root(ScratchScope::Global).unwrap();
        for name in ["b.txt", "A.txt", "c.txt"] {
            fs::write(fx.global.join(name), "").unwrap();
        }
        fs::write(fx.global.join(".session.json"), "{}").unwrap();
        let zeta = fx.store.create_sub_folder(&fx.global, "zeta").unwrap().unwrap();
        fx.store.create_sub_folder(&fx.global, "Alpha").unwrap();
        fs::write(zeta.join("inner.txt"), "").unwrap();

        let flat: Vec<_> = fx
            .store
            .list_entries(&fx.global, ListMode::OneLevel)
            .unwrap()
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(flat, vec!["Alpha", "zeta", "A.txt", "b.txt", "c.txt"]);

        let deep = fx
            .store
            .list_entries(&fx.global, ListMode::Recursive)
            .unwrap();
        let names: Vec<_> = deep.iter().map(|entry| (entry.name.as_str(), entry.depth)).collect();
        assert_eq!(
            names,
            vec![
                ("Alpha", 0),
                ("zeta", 0),
                ("inner.txt", 1),
                ("A.txt", 0),
                ("b.txt", 0),
                ("c.txt", 0)
            ]
        );
    }

    #[test]
    fn list_outside_scope_is_empty() {
        let fx = fixture();
        fs::write(fx.workspace.join("main.rs"), "").unwrap();
        assert!(fx
            .store
            .list_entries(&fx.workspace, ListMode::OneLevel)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn write_and_read_round_trip_in_scope_only() {
        let fx = fixture();
        let file = fx.store.create_file(ScratchScope::Global, None).unwrap().unwrap();
        assert!(fx.store.write_file(&file, "saved").unwrap());
        assert_eq!(fx.store.read_file(&file).unwrap().as_deref(), Some("saved"));

        let outside = fx.workspace.join("x.txt");
        assert!(!fx.store.write_file(&outside, "nope").unwrap());
        assert!(!outside.exists());
        assert!(fx.store.read_file(&fx.global.join("gone.txt")).unwrap().is_none());
    }

    #[test]
    fn session_record_lives_in_global_root() {
        let fx = fixture();
        let file = fx.store.create_file(ScratchScope::Global, None).unwrap().unwrap();
        assert!(fx.store.add_to_session(&file).unwrap());
        assert!(fx.global.join(".session.json").is_file());
        assert_eq!(fx.store.read_session_record().open_files, vec![file.clone()]);

        assert!(fx.store.remove_from_session(&file).unwrap());
        fx.store.add_to_session(&file).unwrap();
        fx.store.clear_session().unwrap();
        assert!(fx.store.read_session_record().is_empty());
    }
}
