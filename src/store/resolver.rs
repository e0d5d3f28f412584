use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::image_id::ImageId;

/// Backing storage location for one image, as named by its `cache-id` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDir {
    /// Trimmed contents of the pointer file.
    pub cache_id: String,
    /// `<graph_root>/<driver>/<cache_id>`.
    pub path: PathBuf,
}

impl CacheDir {
    /// Whether the backing directory is present. Errors other than
    /// not-found are surfaced.
    pub fn exists(&self) -> Result<bool> {
        Ok(self.path.try_exists()?)
    }
}

/// Resolve the backing storage directory for `id`.
///
/// Returns `MigrationNeeded` when the image has no `cache-id` pointer file.
pub fn resolve(config: &GraphConfig, id: &ImageId) -> Result<CacheDir> {
    let driver_dir = config.driver_dir()?;

    let raw = match fs::read_to_string(config.cache_id_path(id)) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(GraphError::MigrationNeeded(id.to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    let cache_id = raw.trim().to_string();
    Ok(CacheDir {
        path: driver_dir.join(&cache_id),
        cache_id,
    })
}
