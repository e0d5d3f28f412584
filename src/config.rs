use std::path::{Path, PathBuf};

use crate::error::{GraphError, Result};
use crate::image_id::ImageId;

pub const DEFAULT_GRAPH_ROOT: &str = "/var/lib/docker";
pub const DRIVER_ENV: &str = "DOCKER_GRAPHDRIVER";

const GRAPH_DIR: &str = "graph";
const CACHE_ID_FILE: &str = "cache-id";
const METADATA_FILE: &str = "json";

/// What to do with an image directory that has no `cache-id` pointer yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmigratedPolicy {
    /// Stop the whole run before anything is renamed.
    #[default]
    Abort,
    /// Leave the image alone and keep scanning.
    Skip,
}

/// Run configuration, built once at startup and passed to every component.
///
/// On-disk layout under `graph_root`:
///   - `graph/{id}/`             image directory
///   - `graph/{id}/cache-id`     pointer to the backing storage id
///   - `graph/{id}/json`         image metadata
///   - `{driver}/{cache-id}/`    backing storage directory
///   - `repositories-{driver}`   repositories index
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub graph_root: PathBuf,
    pub driver: Option<String>,
    pub unmigrated: UnmigratedPolicy,
}

impl GraphConfig {
    pub fn new(graph_root: impl Into<PathBuf>, driver: Option<String>) -> Self {
        Self {
            graph_root: graph_root.into(),
            driver: driver.filter(|d| !d.trim().is_empty()),
            unmigrated: UnmigratedPolicy::default(),
        }
    }

    pub fn with_unmigrated(mut self, policy: UnmigratedPolicy) -> Self {
        self.unmigrated = policy;
        self
    }

    /// The configured storage driver, or `NoGraphDriver` when none was given.
    pub fn driver(&self) -> Result<&str> {
        self.driver.as_deref().ok_or(GraphError::NoGraphDriver)
    }

    pub fn graph_dir(&self) -> PathBuf {
        self.graph_root.join(GRAPH_DIR)
    }

    pub fn image_dir(&self, id: impl AsRef<Path>) -> PathBuf {
        self.graph_dir().join(id)
    }

    pub fn cache_id_path(&self, id: &ImageId) -> PathBuf {
        self.image_dir(id.as_str()).join(CACHE_ID_FILE)
    }

    pub fn metadata_path(&self, id: &ImageId) -> PathBuf {
        self.image_dir(id.as_str()).join(METADATA_FILE)
    }

    pub fn driver_dir(&self) -> Result<PathBuf> {
        Ok(self.graph_root.join(self.driver()?))
    }

    pub fn repositories_path(&self) -> Result<PathBuf> {
        Ok(self
            .graph_root
            .join(format!("repositories-{}", self.driver()?)))
    }
}
