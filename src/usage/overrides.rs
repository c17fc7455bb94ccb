//! Persisted session → project overrides

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::debug;

/// Session id → project name
pub type OverrideMap = BTreeMap<String, String>;

/// Error type for override store writes
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialize error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read the override map; a missing or corrupt file counts as empty
pub fn load_overrides(path: &Path) -> OverrideMap {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("No session overrides at {:?}: {}", path, e);
            return OverrideMap::new();
        }
    };

    serde_json::from_str(&raw).unwrap_or_else(|e| {
        debug!("Ignoring malformed session overrides {:?}: {}", path, e);
        OverrideMap::new()
    })
}

/// Write the override map as pretty-printed JSON
pub fn save_overrides(path: &Path, overrides: &OverrideMap) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(overrides)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_and_corrupt_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session-overrides.json");
        assert!(load_overrides(&path).is_empty());

        fs::write(&path, "[1, 2").unwrap();
        assert!(load_overrides(&path).is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session-overrides.json");

        let mut overrides = OverrideMap::new();
        overrides.insert("abc123".to_string(), "other-project".to_string());
        save_overrides(&path, &overrides).unwrap();

        assert_eq!(load_overrides(&path), overrides);
        assert!(fs::read_to_string(&path).unwrap().contains("\n  \"abc123\""));
    }
}
