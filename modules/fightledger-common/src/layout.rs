use std::path::{Path, PathBuf};

use crate::config::ConfigError;
use crate::types::DatasetKind;

pub const DOCUMENTS_DIR: &str = "FighterHTMLs";
pub const BACKUPS_DIR: &str = "backups";

/// Where a run keeps its files under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.root.join(DOCUMENTS_DIR)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join(BACKUPS_DIR)
    }

    pub fn dataset_path(&self, kind: DatasetKind) -> PathBuf {
        self.root.join(kind.file_name())
    }

    /// Create the directory tree and check the root accepts writes.
    pub fn ensure(&self) -> Result<(), ConfigError> {
        for dir in [self.root.clone(), self.documents_dir(), self.backups_dir()] {
            std::fs::create_dir_all(&dir)
                .map_err(|source| ConfigError::DataDir { path: dir, source })?;
        }
        tempfile::NamedTempFile::new_in(&self.root)
            .map(drop)
            .map_err(|source| ConfigError::DataDir {
                path: self.root.clone(),
                source,
            })
    }
}
