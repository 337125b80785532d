//! Configuration loading with validation and hot update.

pub mod manager;

pub use manager::ConfigManager;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A configuration type that can be built from TOML and checked.
pub trait Config: Send + Sync + Sized + 'static {
    fn from_toml(value: &toml::Value) -> Result<Self, ConfigError>;

    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Copy the fields that may change at runtime from `other`.
    fn hot_update(&mut self, _other: &Self) {}
}
