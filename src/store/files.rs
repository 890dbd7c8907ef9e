//! Plain-text file primitives.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{ControlError, ControlResult};

/// Read a file as UTF-8, treating a missing file as empty.
pub async fn read_text_or_empty(path: &Path) -> ControlResult<String> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(ControlError::io(path, e)),
    }
}

/// Read a file, distinguishing a missing file from an empty one.
pub async fn read_text_if_exists(path: &Path) -> ControlResult<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ControlError::io(path, e)),
    }
}

pub async fn ensure_dir(path: &Path) -> ControlResult<()> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| ControlError::io(path, e))
}

/// Replace `path` with `content` via a sibling temp file and a rename, so the
/// canonical path never exposes a half-written file.
pub async fn write_atomic(path: &Path, content: &str) -> ControlResult<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }

    let temp = temp_path(path);
    fs::write(&temp, content)
        .await
        .map_err(|e| ControlError::io(&temp, e))?;

    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(ControlError::io(path, e));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
