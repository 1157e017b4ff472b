//! Settings persistence backends.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{ModuleSettings, SettingsError};

/// Where module settings live between process restarts.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<ModuleSettings, SettingsError>;
    async fn save(&self, settings: &ModuleSettings) -> Result<(), SettingsError>;
}

/// YAML file store. A missing file loads as defaults.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Result<ModuleSettings, SettingsError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                debug!(path = %self.path.display(), "loaded module settings");
                Ok(serde_yaml::from_str(&raw)?)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "settings file missing, using defaults");
                Ok(ModuleSettings::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, settings: &ModuleSettings) -> Result<(), SettingsError> {
        let raw = serde_yaml::to_string(settings)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write-then-rename so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Process-local store, used by tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    inner: Mutex<ModuleSettings>,
}

impl MemorySettingsStore {
    pub fn new(initial: ModuleSettings) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<ModuleSettings, SettingsError> {
        Ok(self.inner.lock().map(|s| s.clone()).unwrap_or_default())
    }

    async fn save(&self, settings: &ModuleSettings) -> Result<(), SettingsError> {
        if let Ok(mut s) = self.inner.lock() {
            *s = settings.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("absent.yaml"));
        assert_eq!(store.load().await.unwrap(), ModuleSettings::default());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("nested/settings.yaml"));
        let settings = ModuleSettings {
            chat_url: "https://chat.example.com".into(),
            admin_username: "admin".into(),
            token_expire_days: 7,
            ..Default::default()
        };
        store.save(&settings).await.unwrap();
        assert_eq!(store.load().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "ChatUrl: [unclosed").unwrap();
        let store = FileSettingsStore::new(path);
        assert!(matches!(store.load().await, Err(SettingsError::Yaml(_))));
    }
}
