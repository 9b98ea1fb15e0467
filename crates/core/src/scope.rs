use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

/// 暫存檔根目錄下的子路徑名稱。 / Directory name used under the per-user data folder.
pub const GLOBAL_ROOT_DIR: &str = "ScratchFiles";

/// 工作區內暫存資料夾的預設相對路徑。 / Default workspace-relative location of the Solution root.
pub const DEFAULT_SOLUTION_SUBDIR: &str = ".vs/ScratchFiles";

/// 以此字元開頭的名稱屬於內部簿記檔案。 / Names starting with this marker are internal bookkeeping files.
pub const RESERVED_MARKER: char = '.';

/// 暫存項目所屬的範圍。 / Scope a scratch entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScratchScope {
    Global,
    Solution,
}

impl ScratchScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScratchScope::Global => "global",
            ScratchScope::Solution => "solution",
        }
    }
}

impl fmt::Display for ScratchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown scratch scope: {0}")]
pub struct ParseScopeError(String);

impl FromStr for ScratchScope {
    type Err = ParseScopeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(ScratchScope::Global),
            "solution" | "workspace" => Ok(ScratchScope::Solution),
            other => Err(ParseScopeError(other.to_string())),
        }
    }
}

/// 目前解析出的兩個根目錄。 / The two currently resolved scratch roots.
///
/// The Global root always exists for the lifetime of the process; the
/// Solution root is only present while a workspace is open and is
/// re-resolved on every open/close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchRoots {
    global: PathBuf,
    solution: Option<PathBuf>,
}

impl ScratchRoots {
    /// 只含全域根目錄。 / Roots with no workspace open.
    pub fn new(global: impl AsRef<Path>) -> Self {
        Self {
            global: normalize_path(global.as_ref()),
            solution: None,
        }
    }

    /// 依工作區資料夾推導方案根目錄。 / Resolves the Solution root beneath an open workspace.
    pub fn for_workspace(
        global: impl AsRef<Path>,
        workspace_dir: impl AsRef<Path>,
        solution_subdir: impl AsRef<Path>,
    ) -> Self {
        let mut roots = Self::new(global);
        roots.set_workspace(Some(workspace_dir.as_ref()), solution_subdir.as_ref());
        roots
    }

    /// 工作區開啟或關閉時重新解析。 / Re-resolves the Solution root on workspace open/close.
    pub fn set_workspace(&mut self, workspace_dir: Option<&Path>, solution_subdir: &Path) {
        self.solution = workspace_dir.map(|dir| normalize_path(&dir.join(solution_subdir)));
    }

    pub fn global(&self) -> &Path {
        &self.global
    }

    pub fn solution(&self) -> Option<&Path> {
        self.solution.as_deref()
    }

    pub fn root_for(&self, scope: ScratchScope) -> Option<&Path> {
        match scope {
            ScratchScope::Global => Some(&self.global),
            ScratchScope::Solution => self.solution(),
        }
    }

    /// Iterates the resolvable roots, Global first.
    pub fn iter(&self) -> impl Iterator<Item = (ScratchScope, &Path)> {
        std::iter::once((ScratchScope::Global, self.global.as_path())).chain(
            self.solution
                .as_deref()
                .map(|root| (ScratchScope::Solution, root)),
        )
    }

    /// 路徑是否位於任一根目錄之下（含根目錄本身）。 / True when the path is a root or lies beneath one.
    pub fn is_in_scope(&self, path: &Path) -> bool {
        if !path.is_absolute() {
            return false;
        }
        self.iter()
            .any(|(_, root)| is_same_or_descendant(path, root))
    }

    /// 路徑是否剛好是某個根目錄。 / True when the path is exactly one of the roots.
    pub fn is_root(&self, path: &Path) -> bool {
        self.iter().any(|(_, root)| paths_equal(path, root))
    }

    /// 可被刪除、搬移或更名的項目：在範圍內且不是根目錄。 / In scope and not a root itself.
    pub fn is_strict_descendant(&self, path: &Path) -> bool {
        self.is_in_scope(path) && !self.is_root(path)
    }

    /// Solution wins when both roots match; anything else falls back to Global.
    pub fn classify_scope(&self, path: &Path) -> ScratchScope {
        match self.solution.as_deref() {
            Some(solution) if is_same_or_descendant(path, solution) => ScratchScope::Solution,
            _ => ScratchScope::Global,
        }
    }
}

/// 不觸碰磁碟的詞法正規化。 / Lexical normalization: drops `.` and folds `..` without touching the disk.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_anchor = matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                );
                if at_anchor {
                    if !out.has_root() {
                        out.push("..");
                    }
                } else if out.file_name().is_some() {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn folded_components(path: &Path) -> Vec<String> {
    normalize_path(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy().to_lowercase())
        .collect()
}

/// 不分大小寫比較兩個路徑。 / Case-insensitive comparison of two normalized paths.
pub fn paths_equal(a: &Path, b: &Path) -> bool {
    folded_components(a) == folded_components(b)
}

/// `path` 等於 `ancestor` 或位於其下。 / Component-wise, case-insensitive prefix test.
pub fn is_same_or_descendant(path: &Path, ancestor: &Path) -> bool {
    let path = folded_components(path);
    let ancestor = folded_components(ancestor);
    !ancestor.is_empty() && path.len() >= ancestor.len() && path[..ancestor.len()] == ancestor[..]
}

/// 名稱是否以保留字元開頭。 / True when the file name starts with the reserved marker.
pub fn is_reserved_name(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with(RESERVED_MARKER))
        .unwrap_or(false)
}

/// 以不分大小寫的正規化路徑作為識別鍵。 / Identity key of a scratch path (normalized, case-folded).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(String);

impl PathKey {
    pub fn new(path: &Path) -> Self {
        Self(
            normalize_path(path)
                .to_string_lossy()
                .replace('\\', "/")
                .to_lowercase(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Path> for PathKey {
    fn from(path: &Path) -> Self {
        PathKey::new(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> ScratchRoots {
        ScratchRoots::for_workspace("/data/ScratchFiles", "/work/app", DEFAULT_SOLUTION_SUBDIR)
    }

    #[test]
    fn normalize_folds_dots() {
        assert_eq!(
            normalize_path(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn in_scope_covers_both_roots() {
        let roots = roots();
        assert!(roots.is_in_scope(Path::new("/data/ScratchFiles/scratch1.txt")));
        assert!(roots.is_in_scope(Path::new("/work/app/.vs/ScratchFiles/notes/a.md")));
        assert!(!roots.is_in_scope(Path::new("/work/app/src/main.rs")));
        assert!(!roots.is_in_scope(Path::new("/data/ScratchFilesOther/a.txt")));
        assert!(!roots.is_in_scope(Path::new("relative/a.txt")));
    }

    #[test]
    fn traversal_out_of_root_is_rejected() {
        let roots = roots();
        assert!(!roots.is_in_scope(Path::new("/data/ScratchFiles/../secret.txt")));
        assert!(!roots.is_strict_descendant(Path::new("/data/ScratchFiles/sub/..")));
    }

    #[test]
    fn comparison_ignores_case() {
        let roots = roots();
        assert!(roots.is_in_scope(Path::new("/DATA/scratchfiles/Scratch1.TXT")));
        assert!(roots.is_root(Path::new("/data/SCRATCHFILES")));
        assert_eq!(
            PathKey::new(Path::new("/Data/A.txt")),
            PathKey::new(Path::new("/data/./a.TXT"))
        );
    }

    #[test]
    fn roots_are_not_strict_descendants() {
        let roots = roots();
        assert!(!roots.is_strict_descendant(Path::new("/data/ScratchFiles")));
        assert!(!roots.is_strict_descendant(Path::new("/work/app/.vs/ScratchFiles/")));
        assert!(roots.is_strict_descendant(Path::new("/data/ScratchFiles/x")));
    }

    #[test]
    fn classification_defaults_to_global() {
        let roots = roots();
        assert_eq!(
            roots.classify_scope(Path::new("/work/app/.vs/ScratchFiles/a.txt")),
            ScratchScope::Solution
        );
        assert_eq!(
            roots.classify_scope(Path::new("/data/ScratchFiles/a.txt")),
            ScratchScope::Global
        );

        let closed = ScratchRoots::new("/data/ScratchFiles");
        assert_eq!(
            closed.classify_scope(Path::new("/work/app/.vs/ScratchFiles/a.txt")),
            ScratchScope::Global
        );
        assert!(!closed.is_in_scope(Path::new("/work/app/.vs/ScratchFiles/a.txt")));
    }

    #[test]
    fn workspace_close_drops_solution_root() {
        let mut roots = roots();
        roots.set_workspace(None, Path::new(DEFAULT_SOLUTION_SUBDIR));
        assert!(roots.solution().is_none());
        assert_eq!(roots.iter().count(), 1);
    }

    #[test]
    fn scope_parses_from_cli_text() {
        assert_eq!("Global".parse::<ScratchScope>().unwrap(), ScratchScope::Global);
        assert_eq!("solution".parse::<ScratchScope>().unwrap(), ScratchScope::Solution);
        assert!("elsewhere".parse::<ScratchScope>().is_err());
    }

    #[test]
    fn reserved_names_are_detected() {
        assert!(is_reserved_name(Path::new("/data/ScratchFiles/.session.json")));
        assert!(!is_reserved_name(Path::new("/data/ScratchFiles/scratch1.txt")));
    }
}
