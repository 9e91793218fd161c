//! `labnote.toml` loading.
//!
//! Every section is optional; a missing file path means "all defaults".
//!
//! ```toml
//! [store]
//! backend = "sqlite"
//! path = "labnote.db"
//! owner = "0190f3c2-6d1e-7b4a-9c55-2f0f4f6d8a11"
//!
//! [backup]
//! path = "labnote-backup.json"
//!
//! [export]
//! dir = "."
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use labnote_core::OwnerId;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NotebookConfig {
    pub store: StoreConfig,
    pub backup: BackupConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StoreConfig {
    pub backend: Backend,
    pub path: PathBuf,
    /// Owner stamped on new rows. Without one the SQLite store refuses creates.
    pub owner: Option<OwnerId>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            path: PathBuf::from("labnote.db"),
            owner: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BackupConfig {
    pub path: Option<PathBuf>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("labnote-backup.json")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExportConfig {
    pub dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl NotebookConfig {
    /// Read `path` if given, otherwise use defaults. An `owner` given on the
    /// command line replaces the file's. The result is validated.
    pub fn load(path: Option<&Path>, owner: Option<OwnerId>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        if owner.is_some() {
            config.store.owner = owner;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "store.path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.store.backend == Backend::Sqlite && self.store.path.to_str().is_none() {
            return Err(ConfigError::InvalidValue {
                field: "store.path",
                reason: "must be valid UTF-8 for the sqlite backend".to_string(),
            });
        }
        if self.store.backend == Backend::Local && self.store.owner.is_some() {
            return Err(ConfigError::InvalidValue {
                field: "store.owner",
                reason: "only the sqlite backend records an owner".to_string(),
            });
        }
        if let Some(backup) = &self.backup.path
            && backup.as_os_str().is_empty()
        {
            return Err(ConfigError::InvalidValue {
                field: "backup.path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.backup.path.as_deref() == Some(self.store.path.as_path()) {
            return Err(ConfigError::InvalidValue {
                field: "backup.path",
                reason: "must differ from store.path".to_string(),
            });
        }
        if self.export.dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "export.dir",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
