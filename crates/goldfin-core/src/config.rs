// Runtime configuration for a session. Built by `goldfin-config` from
// on-disk settings, or directly by tests and embedders.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use goldfin_api::TransportConfig;

use crate::local::{FileStorage, KeyValueStorage, MemoryStorage};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory for local collection files. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// How often the REST backend polls each listened collection.
    pub poll_interval: Duration,
    pub transport: TransportConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            poll_interval: Duration::from_secs(5),
            transport: TransportConfig::default(),
        }
    }
}

impl SessionConfig {
    /// The local storage backend this config describes.
    pub fn storage(&self) -> Arc<dyn KeyValueStorage> {
        match &self.data_dir {
            Some(dir) => Arc::new(FileStorage::new(dir.clone())),
            None => Arc::new(MemoryStorage::new()),
        }
    }
}
