//! Executable path storage.
//!
//! Every operation on a managed application needs exactly one thing from
//! configuration: the path to its executable. [`PathStore`] supplies it and
//! is injected into [`crate::LauncherApi`]; [`JsonPathStore`] persists the
//! paths to `data/config.json`, [`MemoryPathStore`] keeps them in memory.

mod atomic;

pub use atomic::{atomic_read_json, atomic_write_json};

use crate::config::{AppConfig, AppId, PathsConfig};
use crate::error::{LaunchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{info, warn};

/// Source of executable paths per managed application.
pub trait PathStore: Send + Sync {
    /// Configured path, or `None` when unset.
    fn get(&self, app: AppId) -> Option<String>;

    /// Set the path. A blank path clears it.
    fn set(&self, app: AppId, path: &str) -> Result<()>;

    /// Remove the path.
    fn clear(&self, app: AppId) -> Result<()> {
        self.set(app, "")
    }

    /// Every configured path.
    fn all(&self) -> BTreeMap<AppId, String>;
}

/// On-disk settings layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub paths: BTreeMap<AppId, String>,
}

fn default_version() -> u32 {
    AppConfig::SETTINGS_VERSION
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            version: AppConfig::SETTINGS_VERSION,
            paths: BTreeMap::new(),
        }
    }
}

fn apply(paths: &mut BTreeMap<AppId, String>, app: AppId, path: &str) {
    let path = path.trim();
    if path.is_empty() {
        paths.remove(&app);
    } else {
        paths.insert(app, path.to_string());
    }
}

/// Paths held in memory only.
#[derive(Debug, Default)]
pub struct MemoryPathStore {
    paths: RwLock<BTreeMap<AppId, String>>,
}

impl MemoryPathStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter for tests and embedding.
    pub fn with_path(self, app: AppId, path: impl AsRef<str>) -> Self {
        {
            let mut paths = self.paths.write().unwrap_or_else(|e| e.into_inner());
            apply(&mut paths, app, path.as_ref());
        }
        self
    }
}

impl PathStore for MemoryPathStore {
    fn get(&self, app: AppId) -> Option<String> {
        let paths = self.paths.read().unwrap_or_else(|e| e.into_inner());
        paths.get(&app).cloned()
    }

    fn set(&self, app: AppId, path: &str) -> Result<()> {
        let mut paths = self.paths.write().unwrap_or_else(|e| e.into_inner());
        apply(&mut paths, app, path);
        Ok(())
    }

    fn all(&self) -> BTreeMap<AppId, String> {
        self.paths.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Paths persisted to a JSON settings file.
#[derive(Debug)]
pub struct JsonPathStore {
    file: PathBuf,
    settings: RwLock<SettingsFile>,
}

impl JsonPathStore {
    /// Open `data_dir/config.json`. A missing file starts empty; an
    /// unreadable one is logged and replaced on the next write.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let file = data_dir.as_ref().join(PathsConfig::SETTINGS_FILE_NAME);
        let settings = match atomic_read_json::<SettingsFile>(&file) {
            Ok(Some(settings)) => {
                if settings.version > AppConfig::SETTINGS_VERSION {
                    warn!(
                        "{} was written by a newer version ({}), reading what is understood",
                        file.display(),
                        settings.version
                    );
                }
                settings
            }
            Ok(None) => SettingsFile::default(),
            Err(e @ LaunchError::Json { .. }) => {
                warn!("Ignoring unreadable settings: {}", e);
                SettingsFile::default()
            }
            Err(e) => return Err(e),
        };

        info!(
            "Loaded {} configured path(s) from {}",
            settings.paths.len(),
            file.display()
        );
        Ok(Self {
            file,
            settings: RwLock::new(settings),
        })
    }

    /// Settings file location.
    pub fn file(&self) -> &Path {
        &self.file
    }
}

impl PathStore for JsonPathStore {
    fn get(&self, app: AppId) -> Option<String> {
        let settings = self.settings.read().unwrap_or_else(|e| e.into_inner());
        settings.paths.get(&app).cloned()
    }

    fn set(&self, app: AppId, path: &str) -> Result<()> {
        let mut settings = self.settings.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = settings.clone();
        apply(&mut updated.paths, app, path);
        updated.version = AppConfig::SETTINGS_VERSION;

        // Memory only changes once the file is safely written.
        atomic_write_json(&self.file, &updated, true)?;
        *settings = updated;
        info!("Set {} path to '{}'", app.display_name(), path.trim());
        Ok(())
    }

    fn all(&self) -> BTreeMap<AppId, String> {
        let settings = self.settings.read().unwrap_or_else(|e| e.into_inner());
        settings.paths.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store() {
        let store = MemoryPathStore::new().with_path(AppId::Evz, r"D:\EVZ\EVZ.exe");
        assert_eq!(store.get(AppId::Evz).as_deref(), Some(r"D:\EVZ\EVZ.exe"));
        assert_eq!(store.get(AppId::Neurolings), None);

        store.set(AppId::Evz, "   ").unwrap();
        assert_eq!(store.get(AppId::Evz), None);
    }

    #[test]
    fn test_json_store_persists() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = JsonPathStore::open(temp_dir.path()).unwrap();
            store.set(AppId::NeuroSongSpider, " C:/nsp/NeuroSongSpider.exe ").unwrap();
            store.set(AppId::Neurolings, "C:/nl/Neurolings.exe").unwrap();
            store.clear(AppId::Neurolings).unwrap();
        }

        let store = JsonPathStore::open(temp_dir.path()).unwrap();
        assert_eq!(
            store.get(AppId::NeuroSongSpider).as_deref(),
            Some("C:/nsp/NeuroSongSpider.exe")
        );
        assert_eq!(store.get(AppId::Neurolings), None);
        assert_eq!(store.all().len(), 1);

        let raw = std::fs::read_to_string(store.file()).unwrap();
        assert!(raw.contains("\"nsp\""));
    }

    #[test]
    fn test_json_store_missing_dir_is_created_on_write() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join(PathsConfig::DATA_DIR_NAME);
        let store = JsonPathStore::open(&data_dir).unwrap();
        assert!(store.all().is_empty());

        store.set(AppId::Evz, "/opt/evz/evz").unwrap();
        assert!(data_dir.join(PathsConfig::SETTINGS_FILE_NAME).exists());
    }

    #[test]
    fn test_json_store_ignores_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(PathsConfig::SETTINGS_FILE_NAME),
            "{ broken",
        )
        .unwrap();

        let store = JsonPathStore::open(temp_dir.path()).unwrap();
        assert!(store.all().is_empty());
        store.set(AppId::Evz, "/opt/evz/evz").unwrap();
        assert_eq!(store.get(AppId::Evz).as_deref(), Some("/opt/evz/evz"));
    }
}
