//! Configuration loaded from YAML
//!
//! ```yaml
//! store:
//!   repository: /data/taxograph
//!   batch_size: 5000
//! archive_repository: /data/archives
//! lookup:
//!   file: /data/taxograph/lookup.db
//!   policy: lowest_key
//! ```

use crate::lookup::AmbiguityPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub const DEFAULT_BATCH_SIZE: usize = 10_000;

fn default_repository() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taxograph")
}

/// Where dataset graphs and blob stores live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub repository: PathBuf,
    /// Number of writes per committed batch
    pub batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl StoreConfig {
    pub fn with_repository(mut self, repository: impl Into<PathBuf>) -> Self {
        self.repository = repository.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Directory holding the graph of one dataset
    pub fn dataset_dir(&self, dataset: &Uuid) -> PathBuf {
        self.repository.join(dataset.to_string())
    }

    pub fn graph_path(&self, dataset: &Uuid) -> PathBuf {
        self.dataset_dir(dataset).join("graph.db")
    }

    /// Blob store file of one dataset
    pub fn kvp_path(&self, dataset: &Uuid) -> PathBuf {
        self.repository.join("kvp").join(dataset.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Persistent lookup file; memory resident when absent
    pub file: Option<PathBuf>,
    pub policy: AmbiguityPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    /// Directory with one unpacked archive directory per dataset key
    pub archive_repository: PathBuf,
    pub lookup: LookupConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            archive_repository: default_repository().join("archives"),
            lookup: LookupConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn archive_dir(&self, dataset: &Uuid) -> PathBuf {
        self.archive_repository.join(dataset.to_string())
    }
}
