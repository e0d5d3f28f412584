use thiserror::Error;

use crate::image_id::ImageIdGenerationError;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("no graph driver set (pass --driver or set DOCKER_GRAPHDRIVER)")]
    NoGraphDriver,

    #[error("migration needed: image {0} has no cache-id pointer file")]
    MigrationNeeded(String),

    #[error("failed to read graph directory '{0}': {1}")]
    GraphDirUnreadable(String, std::io::Error),

    #[error("failed to allocate unique image id for {0} after {1} attempts")]
    IdAllocation(String, usize),

    #[error(transparent)]
    IdGeneration(#[from] ImageIdGenerationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoGraphDriver => "no_graph_driver",
            Self::MigrationNeeded(_) => "migration_needed",
            Self::GraphDirUnreadable(_, _) => "graph_dir_unreadable",
            Self::IdAllocation(_, _) => "id_allocation",
            Self::IdGeneration(_) => "id_generation",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
