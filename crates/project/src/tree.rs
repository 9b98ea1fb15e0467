use std::path::{Path, PathBuf};

use scratchpad_core::{paths_equal, ScratchScope};
use serde::{Serialize, Serializer};

use crate::serde_path;
use crate::store::{EntryKind, ListMode, StoreError, WorkspaceStore};

/// One node of the scratch tree.
/// 暫存樹中的單一節點。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScratchNode {
    #[serde(serialize_with = "serde_path::serialize")]
    pub path: PathBuf,
    pub name: String,
    pub kind: EntryKind,
    #[serde(serialize_with = "serialize_scope")]
    pub scope: ScratchScope,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ScratchNode>,
}

impl ScratchNode {
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    /// Depth-first walk; the callback receives each node with its depth.
    pub fn walk<'a, F>(&'a self, depth: usize, visit: &mut F)
    where
        F: FnMut(&'a ScratchNode, usize),
    {
        visit(self, depth);
        for child in &self.children {
            child.walk(depth + 1, visit);
        }
    }
}

/// Immutable snapshot of both roots, published after every rebuild.
/// 兩個根目錄的不可變快照，每次重建後發布。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScratchTree {
    pub revision: u64,
    pub global: ScratchNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<ScratchNode>,
}

impl ScratchTree {
    /// Enumerates both roots from disk. Missing roots yield empty nodes.
    /// 從磁碟列舉兩個根目錄；根目錄不存在時為空節點。
    pub fn build(store: &WorkspaceStore, revision: u64) -> Result<Self, StoreError> {
        let roots = store.roots();
        let global = build_root(store, roots.global(), ScratchScope::Global)?;
        let solution = match roots.solution() {
            Some(root) => Some(build_root(store, root, ScratchScope::Solution)?),
            None => None,
        };
        Ok(Self {
            revision,
            global,
            solution,
        })
    }

    pub fn roots(&self) -> impl Iterator<Item = &ScratchNode> {
        std::iter::once(&self.global).chain(self.solution.as_ref())
    }

    /// Pre-order over every node, roots included.
    pub fn iter(&self) -> impl Iterator<Item = &ScratchNode> {
        let mut out = Vec::new();
        for root in self.roots() {
            root.walk(0, &mut |node, _| out.push(node));
        }
        out.into_iter()
    }

    pub fn find(&self, path: &Path) -> Option<&ScratchNode> {
        self.roots().find_map(|root| find_recursive(root, path))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.find(path).is_some()
    }

    pub fn file_count(&self) -> usize {
        self.iter().filter(|node| !node.is_folder()).count()
    }

    /// 刪除後應選取的節點：下一個兄弟、前一個兄弟，否則父節點。 / Where selection should land once `path` is gone.
    ///
    /// Next sibling first, then the previous one, then the parent. `None`
    /// when `path` is not in the tree or is a root.
    pub fn sibling_after_removal(&self, path: &Path) -> Option<PathBuf> {
        self.roots()
            .find_map(|root| sibling_recursive(root, path))
    }
}

fn build_root(
    store: &WorkspaceStore,
    root: &Path,
    scope: ScratchScope,
) -> Result<ScratchNode, StoreError> {
    Ok(ScratchNode {
        path: root.to_path_buf(),
        name: scope.to_string(),
        kind: EntryKind::Folder,
        scope,
        children: build_children(store, root, scope)?,
    })
}

fn build_children(
    store: &WorkspaceStore,
    dir: &Path,
    scope: ScratchScope,
) -> Result<Vec<ScratchNode>, StoreError> {
    store
        .list_entries(dir, ListMode::OneLevel)?
        .into_iter()
        .map(|entry| {
            let children = if entry.is_folder() {
                build_children(store, &entry.path, scope)?
            } else {
                Vec::new()
            };
            Ok(ScratchNode {
                path: entry.path,
                name: entry.name,
                kind: entry.kind,
                scope,
                children,
            })
        })
        .collect()
}

fn find_recursive<'a>(node: &'a ScratchNode, path: &Path) -> Option<&'a ScratchNode> {
    if paths_equal(&node.path, path) {
        return Some(node);
    }
    node.children
        .iter()
        .find_map(|child| find_recursive(child, path))
}

fn sibling_recursive(node: &ScratchNode, path: &Path) -> Option<PathBuf> {
    if let Some(index) = node
        .children
        .iter()
        .position(|child| paths_equal(&child.path, path))
    {
        let next = node
            .children
            .get(index + 1)
            .or_else(|| index.checked_sub(1).and_then(|prev| node.children.get(prev)))
            .map(|sibling| sibling.path.clone());
        return Some(next.unwrap_or_else(|| node.path.clone()));
    }
    node.children
        .iter()
        .find_map(|child| sibling_recursive(child, path))
}

fn serialize_scope<S>(scope: &ScratchScope, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(scope.as_str())
}
