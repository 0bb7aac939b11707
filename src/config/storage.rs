// ABOUTME: Storage backend selection and driver options.
// ABOUTME: Validated by storage::init when the backend is constructed.

use crate::storage::StorageType;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageType,

    /// Root directory (dir) or mounted filesystem (btrfs) holding container storage.
    /// Defaults to `<data_dir>/storage`.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Directory holding `<fingerprint>.tar.gz` image tarballs.
    /// Defaults to `<data_dir>/images`.
    #[serde(default)]
    pub image_source: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            backend: StorageType::Dir,
            root: None,
            image_source: None,
        }
    }
}
