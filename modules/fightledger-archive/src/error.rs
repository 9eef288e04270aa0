use std::path::PathBuf;

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("No stored document for entity: {0}")]
    NotFound(String),

    #[error("Artifact {} belongs to another entity, refusing to store {entity}", path.display())]
    KeyCollision { entity: String, path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Corrupt metadata {}: {source}", path.display())]
    Meta {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| ArchiveError::Io { path, source }
    }
}
