use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::{Config, ConfigError};

/// Holds the live configuration; readers never block writers.
pub struct ConfigManager<T: Config> {
    config: ArcSwap<T>,
    path: Option<PathBuf>,
}

impl<T: Config> ConfigManager<T> {
    pub fn new(config: T) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            path: None,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = read_config::<T>(path)?;
        tracing::info!(path = %path.display(), "Config loaded");
        Ok(Self {
            config: ArcSwap::from_pointee(config),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn get(&self) -> arc_swap::Guard<Arc<T>> {
        self.config.load()
    }

    pub fn update(&self, new_config: T) -> Result<(), ConfigError> {
        new_config.validate()?;
        self.config.store(Arc::new(new_config));
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl<T: Config + Clone> ConfigManager<T> {
    /// Re-read the file and apply only hot-updatable fields.
    ///
    /// Returns `false` when the manager was not loaded from a file.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        let Some(ref path) = self.path else {
            return Ok(false);
        };
        let new_config = read_config::<T>(path)?;

        let mut current = (*self.config.load_full()).clone();
        current.hot_update(&new_config);
        current.validate()?;
        self.config.store(Arc::new(current));

        tracing::info!(path = %path.display(), "Config reloaded");
        Ok(true)
    }

    pub fn snapshot(&self) -> T {
        (*self.config.load_full()).clone()
    }
}

fn read_config<T: Config>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let value: toml::Value = content.parse()?;
    let config = T::from_toml(&value)?;
    config.validate()?;
    Ok(config)
}
