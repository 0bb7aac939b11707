// ABOUTME: Daemon configuration types and parsing for quayd.yml.
// ABOUTME: Handles YAML parsing, discovery, and defaults derived from the data directory.

mod listen;
mod retry;
mod storage;

pub use listen::ListenAddress;
pub use retry::RetryConfig;
pub use storage::StorageConfig;

use crate::error::{Error, Result};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "quayd.yml";
pub const CONFIG_FILENAME_ALT: &str = "quayd.yaml";
pub const DEFAULT_DATA_DIR: &str = "/var/lib/quayd";

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_listen", deserialize_with = "deserialize_listen")]
    pub listen: NonEmpty<ListenAddress>,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub operations: OperationsConfig,

    /// Duplicate every JSON response body into the debug log.
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    /// LXC path holding container configurations (`lxc-* -P`).
    #[serde(default)]
    pub lxc_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationsConfig {
    #[serde(default = "default_retention", with = "humantime_serde")]
    pub retention: Duration,

    #[serde(default = "default_reap_interval", with = "humantime_serde")]
    pub reap_interval: Duration,
}

impl Default for OperationsConfig {
    fn default() -> Self {
        OperationsConfig {
            retention: default_retention(),
            reap_interval: default_reap_interval(),
        }
    }
}

fn default_retention() -> Duration {
    Duration::from_secs(300)
}

fn default_reap_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_listen() -> NonEmpty<ListenAddress> {
    NonEmpty::new(ListenAddress::Unix(
        default_data_dir().join("unix.socket"),
    ))
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            listen: default_listen(),
            data_dir: default_data_dir(),
            log_dir: None,
            storage: StorageConfig::default(),
            runtime: RuntimeConfig::default(),
            retry: RetryConfig::default(),
            operations: OperationsConfig::default(),
            debug: false,
        }
    }
}

impl DaemonConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Locate the configuration file.
    ///
    /// An explicit path must exist. Without one, `quayd.yml` and `quayd.yaml`
    /// are looked up in `dir`; if neither exists the defaults are used.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::ConfigNotFound(path.to_path_buf()));
            }
            return Self::load(path);
        }

        let candidates = [dir.join(CONFIG_FILENAME), dir.join(CONFIG_FILENAME_ALT)];
        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        tracing::debug!("no configuration file in {}, using defaults", dir.display());
        Ok(Self::default())
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("logs"))
    }

    pub fn storage_root(&self) -> PathBuf {
        self.storage
            .root
            .clone()
            .unwrap_or_else(|| self.data_dir.join("storage"))
    }

    pub fn image_source(&self) -> PathBuf {
        self.storage
            .image_source
            .clone()
            .unwrap_or_else(|| self.data_dir.join("images"))
    }

    pub fn lxc_path(&self) -> PathBuf {
        self.runtime
            .lxc_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("containers"))
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("quayd.json")
    }
}

fn deserialize_listen<'de, D>(
    deserializer: D,
) -> std::result::Result<NonEmpty<ListenAddress>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<ListenAddress> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("at least one listen address is required"))
}
