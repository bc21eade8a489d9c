//! Crash-safe persistence for the account database.
//!
//! Writes go to a temp sibling, get flushed and synced, the previous file is
//! copied to `<file>.bak`, then the temp file is renamed over the target. A
//! crash mid-write leaves either the old or the new document, never a
//! truncated one.

use serde_json::Value;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};
use crate::store::document::DatabaseDocument;

/// `accounts.json` -> `accounts.json<suffix>`
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

pub fn backup_sibling(path: &Path) -> PathBuf {
    with_suffix(path, ".bak")
}

fn corrupt(path: &Path, message: impl Into<String>) -> GatewayError {
    GatewayError::CorruptState {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Read the raw JSON tree of a database file.
///
/// Returns `None` if the file doesn't exist.
pub fn read_raw(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|e| corrupt(path, format!("read failed: {}", e)))?;
    let value = serde_json::from_str(&contents).map_err(|e| corrupt(path, format!("parse failed: {}", e)))?;
    Ok(Some(value))
}

/// Read and parse a database file.
///
/// Returns `None` if the file doesn't exist, `CorruptState` if it can't be read.
pub fn read_document(path: &Path) -> Result<Option<DatabaseDocument>> {
    match read_raw(path)? {
        None => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| corrupt(path, format!("unexpected shape: {}", e))),
    }
}

/// Write the document atomically, rotating the previous version to `.bak`
pub fn write_document(path: &Path, document: &DatabaseDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let serialized = serde_json::to_string_pretty(document)?;
    let temp_path = with_suffix(path, &format!(".{}.tmp", process::id()));

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(serialized.as_bytes())?;
        file.flush()?;
        file.sync_all()?;
    }

    if path.exists() {
        let backup_path = backup_sibling(path);
        if let Err(e) = fs::copy(path, &backup_path) {
            warn!("Failed to create backup {}: {}", backup_path.display(), e);
        } else {
            debug!("Created backup: {}", backup_path.display());
        }
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    debug!("Saved account database: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        assert!(read_document(&dir.path().join("absent.json")).unwrap().is_none());
    }

    #[test]
    fn test_read_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        fs::write(&path, "{ not json").unwrap();

        match read_document(&path) {
            Err(GatewayError::CorruptState { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected CorruptState, got {:?}", other),
        }
    }

    #[test]
    fn test_write_rotates_previous_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.json");

        let mut first = DatabaseDocument::empty();
        first.metadata.description = "first".to_string();
        write_document(&path, &first).unwrap();
        assert!(!backup_sibling(&path).exists());

        let mut second = DatabaseDocument::empty();
        second.metadata.description = "second".to_string();
        write_document(&path, &second).unwrap();

        let current = read_document(&path).unwrap().unwrap();
        let previous = read_document(&backup_sibling(&path)).unwrap().unwrap();
        assert_eq!(current.metadata.description, "second");
        assert_eq!(previous.metadata.description, "first");

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_suffix_paths() {
        let path = Path::new("/data/accounts.json");
        assert_eq!(backup_sibling(path), PathBuf::from("/data/accounts.json.bak"));
        assert_eq!(with_suffix(path, ".before_restore"), PathBuf::from("/data/accounts.json.before_restore"));
    }
}
