//! Configuration loading and management
//!
//! Handles parsing of the `trackzero.toml` file in the data root.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::calendar::DEFAULT_HISTORY_DAYS;
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::storage::{Storage, CONFIG_FILE};
use crate::streak::DEFAULT_WINDOW_DAYS;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Streak calculation
    #[serde(default)]
    pub streak: StreakConfig,

    /// Calendar rendering
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Remote store location
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local cache behaviour
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakConfig {
    /// How many days back the streak scan looks
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

fn default_window_days() -> u32 {
    DEFAULT_WINDOW_DAYS
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Days before today still rendered with activity colour
    #[serde(default = "default_history_days")]
    pub history_days: u32,
}

fn default_history_days() -> u32 {
    DEFAULT_HISTORY_DAYS
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            history_days: default_history_days(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Directory of the file-backed remote store; `<root>/remote` when unset.
    /// Relative paths resolve against the data root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl RemoteConfig {
    pub fn resolve_dir(&self, storage: &Storage) -> PathBuf {
        match &self.dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => storage.root().join(dir),
            None => storage.default_remote_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long to wait for the cache lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a `trackzero.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the data root, or return defaults
    pub fn load_from_root(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        Self::load(&config_path).unwrap_or_else(|err| {
            warn!(path = %config_path.display(), error = %err, "ignoring invalid configuration");
            Self::default()
        })
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.streak.window_days == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "streak.window_days must be >= 1".to_string(),
            ));
        }
        if self.cache.lock_timeout_ms == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "cache.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        if let Some(dir) = &self.remote.dir {
            if dir.as_os_str().is_empty() {
                return Err(crate::error::Error::InvalidConfig(
                    "remote.dir cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.streak.window_days, 365);
        assert_eq!(cfg.calendar.history_days, 365);
        assert_eq!(cfg.remote.dir, None);
        assert_eq!(cfg.cache.lock_timeout_ms, 5000);
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[streak]
window_days = 730

[calendar]
history_days = 90

[remote]
dir = "/srv/trackzero"

[cache]
lock_timeout_ms = 250
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.streak.window_days, 730);
        assert_eq!(cfg.calendar.history_days, 90);
        assert_eq!(cfg.remote.dir, Some(PathBuf::from("/srv/trackzero")));
        assert_eq!(cfg.cache.lock_timeout_ms, 250);
    }

    #[test]
    fn zero_window_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[streak]\nwindow_days = 0").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            crate::error::Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_from_root_defaults_when_missing_or_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(Config::load_from_root(dir.path()), Config::default());

        fs::write(dir.path().join(CONFIG_FILE), "[streak\nwindow_days = ").expect("write config");
        assert_eq!(Config::load_from_root(dir.path()), Config::default());
    }

    #[test]
    fn remote_dir_resolves_against_root() {
        let storage = Storage::new(PathBuf::from("/data"));
        let mut remote = RemoteConfig::default();
        assert_eq!(remote.resolve_dir(&storage), PathBuf::from("/data/remote"));

        remote.dir = Some(PathBuf::from("shared"));
        assert_eq!(remote.resolve_dir(&storage), PathBuf::from("/data/shared"));

        remote.dir = Some(PathBuf::from("/mnt/sync"));
        assert_eq!(remote.resolve_dir(&storage), PathBuf::from("/mnt/sync"));
    }
}
