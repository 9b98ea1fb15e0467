use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use notify::event::{EventKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tracing::trace;

/// 監控檔案變更時可能回傳的錯誤。 / Error type for file monitoring operations.
#[derive(Debug, Error)]
pub enum FileMonitorError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}

/// 監控到的事件種類。 / Classifies observed file system changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileMonitorEventKind {
    Modified,
    Removed,
    Created,
    Renamed { from: PathBuf, to: PathBuf },
    Other,
}

/// 檔案事件的詳細資料。 / File event payload with resolved path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileMonitorEventKind,
}

impl FileEvent {
    pub fn new(path: impl Into<PathBuf>, kind: FileMonitorEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// 封裝 `notify` 的遞迴監視器，可暫停事件傳遞。 / Recursive `notify` watcher whose event delivery can be paused.
///
/// Events are pushed into the handler on the watcher's own thread. While
/// raising is disabled they are dropped at the source.
pub struct FileMonitor {
    watcher: RecommendedWatcher,
    root: PathBuf,
    raising: Arc<AtomicBool>,
}

impl FileMonitor {
    /// 建立監視器並遞迴監看 `root`。 / Creates a monitor watching `root` recursively.
    pub fn watch<H>(root: impl AsRef<Path>, handler: H) -> Result<Self, FileMonitorError>
    where
        H: Fn(FileEvent) + Send + 'static,
    {
        Self::watch_gated(root, Arc::new(AtomicBool::new(true)), handler)
    }

    /// Same as [`FileMonitor::watch`], sharing an external raising flag.
    pub fn watch_gated<H>(
        root: impl AsRef<Path>,
        raising: Arc<AtomicBool>,
        handler: H,
    ) -> Result<Self, FileMonitorError>
    where
        H: Fn(FileEvent) + Send + 'static,
    {
        let root = root.as_ref().to_path_buf();
        let gate = Arc::clone(&raising);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                if !gate.load(Ordering::SeqCst) {
                    return;
                }
                match res {
                    Ok(event) => {
                        if let Some(mapped) = map_event(event) {
                            handler(mapped);
                        }
                    }
                    Err(err) => trace!(error = %err, "watcher reported an error"),
                }
            },
            Config::default(),
        )?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok(Self {
            watcher,
            root,
            raising,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 開啟或暫停事件傳遞。 / Enables or pauses event delivery.
    pub fn set_raising_events(&self, enabled: bool) {
        self.raising.store(enabled, Ordering::SeqCst);
    }

    pub fn is_raising_events(&self) -> bool {
        self.raising.load(Ordering::SeqCst)
    }
}

// The raising flag may be shared with other monitors; dropping only unwatches.
impl Drop for FileMonitor {
    fn drop(&mut self) {
        let _ = self.watcher.unwatch(&self.root);
    }
}

fn map_event(event: notify::Event) -> Option<FileEvent> {
    if event.paths.is_empty() {
        return None;
    }

    let primary = event.paths[0].clone();
    let kind = match event.kind {
        EventKind::Access(_) => return None,
        EventKind::Modify(ModifyKind::Name(_)) if event.paths.len() >= 2 => {
            let to = event.paths[1].clone();
            FileMonitorEventKind::Renamed {
                from: primary.clone(),
                to,
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => FileMonitorEventKind::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => FileMonitorEventKind::Created,
        EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Metadata(_))
        | EventKind::Modify(ModifyKind::Any) => FileMonitorEventKind::Modified,
        EventKind::Create(_) => FileMonitorEventKind::Created,
        EventKind::Remove(RemoveKind::File)
        | EventKind::Remove(RemoveKind::Folder)
        | EventKind::Remove(RemoveKind::Any) => FileMonitorEventKind::Removed,
        _ => FileMonitorEventKind::Other,
    };

    let mut path = primary;
    if let FileMonitorEventKind::Renamed { to, .. } = &kind {
        path = to.clone();
    }

    Some(FileEvent { path, kind })
}
