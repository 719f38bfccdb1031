use std::path::PathBuf;
use std::sync::Arc;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use crate::constants::DEFAULT_ROOT_KEY;
use crate::constants::KEY_SEPARATOR;
use crate::DocumentStore;
use crate::Error;
use crate::MemStore;
use crate::Result;
use crate::SledStore;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map, lost on restart
    Memory,
    /// Embedded sled database under `db_root_dir`
    Sled,
}

/// Document store location and backend
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    /// Key root under which documents are stored
    ///
    /// Default: `default_root_key()` ("osdconfig")
    #[serde(default = "default_root_key")]
    pub root_key: String,

    /// Default: `default_backend()` (memory)
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Database directory, used by the sled backend
    ///
    /// Default: `default_db_dir()` (/tmp/clusterconf/db)
    #[serde(default = "default_db_dir")]
    pub db_root_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_key: default_root_key(),
            backend: default_backend(),
            db_root_dir: default_db_dir(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.root_key.trim_matches(KEY_SEPARATOR).is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "root_key cannot be empty".into(),
            )));
        }

        if self.root_key.starts_with(KEY_SEPARATOR) || self.root_key.ends_with(KEY_SEPARATOR) {
            return Err(Error::Config(ConfigError::Message(format!(
                "root_key {} must not start or end with '{}'",
                self.root_key, KEY_SEPARATOR
            ))));
        }

        if self.backend == StoreBackend::Sled && self.db_root_dir.as_os_str().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "db_root_dir path cannot be empty for the sled backend".into(),
            )));
        }

        Ok(())
    }
}

/// Opens the document store selected by `config`.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    info!(backend = ?config.backend, "open document store");
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemStore::new())),
        StoreBackend::Sled => Ok(Arc::new(SledStore::open(&config.db_root_dir)?)),
    }
}

fn default_root_key() -> String {
    DEFAULT_ROOT_KEY.to_string()
}
fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}
fn default_db_dir() -> PathBuf {
    PathBuf::from("/tmp/clusterconf/db")
}
