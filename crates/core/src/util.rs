use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::scope::RESERVED_MARKER;

/// Writes data atomically by using a hidden sibling file followed by rename.  
/// 以隱藏的臨時檔案搭配 rename 實現原子寫入。
///
/// The temporary name starts with the reserved marker so watchers and
/// listings skip it.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = temp_sibling(path);
    fs::write(&tmp_path, data)?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{RESERVED_MARKER}{name}.tmp"))
}
