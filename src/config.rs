use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Storage configuration, loaded from TOML. Every field has a default so
/// an empty (or missing) file yields a working single-user setup under
/// the home directory.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_db_file")]
    pub db_file: String,
    #[serde(default = "default_replica_file")]
    pub replica_file: String,
    #[serde(default)]
    pub replica: ReplicaConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplicaConfig {
    /// Seconds between successful snapshot copies.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    /// Longer wait after a failed copy before the next attempt.
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".blobstash")
}

fn default_db_file() -> String {
    "blob_data.db".to_string()
}

fn default_replica_file() -> String {
    "blob_data_replica.db".to_string()
}

fn default_sync_interval_secs() -> u64 {
    30
}

fn default_error_backoff_secs() -> u64 {
    60
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: default_sync_interval_secs(),
            error_backoff_secs: default_error_backoff_secs(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_file: default_db_file(),
            replica_file: default_replica_file(),
            replica: ReplicaConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Load from a TOML file; a missing file falls back to the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: StoreConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }

    pub fn primary_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }

    pub fn replica_path(&self) -> PathBuf {
        self.data_dir.join(&self.replica_file)
    }
}
