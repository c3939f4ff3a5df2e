use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info};

use crate::error::ConfigError;
use crate::settings::AppSettings;
use crate::traits::ConfigStore;

/// Settings backed by a YAML file. A missing file reads as defaults.
pub struct YamlConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl YamlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<String>, ConfigError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "settings file missing, using defaults");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "settings".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<AppSettings, ConfigError> {
        match self.read()? {
            Some(text) => AppSettings::parse(&text),
            None => Ok(AppSettings::default()),
        }
    }

    fn load_raw(&self) -> Result<String, ConfigError> {
        match self.read()? {
            Some(text) => Ok(text),
            None => AppSettings::default().to_yaml(),
        }
    }

    fn save(&self, raw: &str) -> Result<AppSettings, ConfigError> {
        let settings = AppSettings::parse(raw)?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ConfigError::Invalid("settings writer poisoned".into()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.temp_path();
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(raw.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;

        info!(
            path = %self.path.display(),
            feeds = settings.feeds.len(),
            schedule_enabled = settings.scheduling.enabled,
            "settings saved"
        );
        Ok(settings)
    }
}
