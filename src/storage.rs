//! Storage layer for trackzero
//!
//! All persistent state lives under one data root.
//!
//! # Directory Structure
//!
//! ```text
//! <root>/
//!   trackzero.toml              # Optional configuration
//!   identity.json               # Signed-in user, if any
//!   cache/<session-key>/        # Local cache, one file per field
//!     tasks                     # JSON array
//!     completedTasks            # JSON object, YYYY-MM-DD -> count
//!     journalEntries            # JSON object, YYYY-MM-DD -> entries
//!     username                  # plain text
//!     lastAccessDate            # YYYY-MM-DD
//!     lastResetDate             # YYYY-MM-DD
//!   remote/users/<uid>.json     # File-backed remote documents
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

/// Configuration file name inside the data root
pub const CONFIG_FILE: &str = "trackzero.toml";

/// Environment variable overriding the data root
pub const ROOT_ENV: &str = "TRACKZERO_ROOT";

const IDENTITY_FILE: &str = "identity.json";
const CACHE_DIR: &str = "cache";
const REMOTE_DIR: &str = "remote";

/// Storage manager for trackzero state
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve the data root: explicit path, then `TRACKZERO_ROOT`, then the
    /// platform data directory.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path.to_path_buf()));
        }
        if let Ok(raw) = std::env::var(ROOT_ENV) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Ok(Self::new(PathBuf::from(trimmed)));
            }
        }
        let dirs = directories::ProjectDirs::from("", "", "trackzero").ok_or_else(|| {
            Error::InvalidConfig(format!(
                "cannot determine a data directory; pass --root or set {ROOT_ENV}"
            ))
        })?;
        Ok(Self::new(dirs.data_dir().to_path_buf()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn identity_file(&self) -> PathBuf {
        self.root.join(IDENTITY_FILE)
    }

    pub fn cache_root(&self) -> PathBuf {
        self.root.join(CACHE_DIR)
    }

    /// Cache directory for one session key. The key is sanitized so it can
    /// never escape the cache root.
    pub fn cache_dir(&self, session_key: &str) -> PathBuf {
        self.cache_root().join(sanitize_key(session_key))
    }

    pub fn default_remote_dir(&self) -> PathBuf {
        self.root.join(REMOTE_DIR)
    }

    // =========================================================================
    // File I/O helpers (atomic writes for safety)
    // =========================================================================

    /// Write JSON data atomically (write to temp, then rename)
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        self.write_atomic(path, json.as_bytes())
    }

    /// Read JSON data from a file, `None` when the file is absent
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let data: T = serde_json::from_str(&content)?;
        Ok(Some(data))
    }

    /// Write a single-line text value atomically
    pub fn write_text(&self, path: &Path, value: &str) -> Result<()> {
        self.write_atomic(path, format!("{}\n", value.trim()).as_bytes())
    }

    /// Read a single-line text value; missing or blank files read as `None`
    pub fn read_text(&self, path: &Path) -> Result<Option<String>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        let value = raw.trim();
        if value.is_empty() {
            return Ok(None);
        }
        Ok(Some(value.to_string()))
    }

    /// Write data atomically using temp file + rename
    ///
    /// Readers either see the previous content or the new content, never a
    /// partial write.
    pub fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");

        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;

        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Remove a file if it exists
    pub fn remove_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::Io(err)),
        }
    }
}

/// Keep only characters safe for a single path component.
pub fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_paths() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();
        let storage = Storage::new(root.clone());

        assert_eq!(storage.config_file(), root.join("trackzero.toml"));
        assert_eq!(storage.identity_file(), root.join("identity.json"));
        assert_eq!(storage.cache_dir("user-1"), root.join("cache/user-1"));
        assert_eq!(storage.default_remote_dir(), root.join("remote"));
    }

    #[test]
    fn test_cache_dir_cannot_escape_root() {
        let storage = Storage::new(PathBuf::from("/data"));
        assert_eq!(storage.cache_dir("../../etc"), PathBuf::from("/data/cache/______etc"));
        assert_eq!(storage.cache_dir("  "), PathBuf::from("/data/cache/_"));
    }

    #[test]
    fn test_atomic_write() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().to_path_buf());
        let test_file = storage.root().join("nested/test.json");

        #[derive(Serialize, serde::Deserialize, PartialEq, Debug)]
        struct TestData {
            name: String,
            value: i32,
        }

        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        storage.write_json(&test_file, &data).unwrap();
        let read_back: Option<TestData> = storage.read_json(&test_file).unwrap();

        assert_eq!(Some(data), read_back);
        assert!(!test_file.with_extension("tmp").exists());
    }

    #[test]
    fn test_text_values() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().to_path_buf());
        let path = storage.root().join("username");

        assert_eq!(storage.read_text(&path).unwrap(), None);
        storage.write_text(&path, "  ada ").unwrap();
        assert_eq!(storage.read_text(&path).unwrap(), Some("ada".to_string()));

        storage.remove_file(&path).unwrap();
        storage.remove_file(&path).unwrap();
        assert_eq!(storage.read_text(&path).unwrap(), None);
    }
}
