//! Crash-safe file writes shared by the credential and profile stores.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Create `dir` (and parents) if it does not exist yet.
pub(crate) fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    if dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    tracing::info!(dir = %dir.display(), "Created storage directory");
    Ok(())
}

/// Write `contents` to a sibling temp file, fsync it, then rename over `path`.
///
/// Readers observe either the previous file or the complete new one.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let tmp = temp_sibling(path);

    let result = (|| {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(StoreError::io(path, e));
    }
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub(crate) fn write_json_atomic<T: serde::Serialize>(
    path: &Path,
    value: &T,
    what: &str,
) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialization {
        what: what.to_string(),
        reason: e.to_string(),
    })?;
    write_atomic(path, &json)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}
