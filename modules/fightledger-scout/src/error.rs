use std::path::PathBuf;

use espn_client::EspnError;
use fightledger_archive::ArchiveError;
use thiserror::Error;

/// Why a single entity failed during a run. Never aborts the run.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error(transparent)]
    Source(#[from] EspnError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("Embedded profile block not found")]
    MissingProfile,

    #[error("Malformed profile block: {0}")]
    MalformedProfile(String),

    #[error("Invalid selector {selector}: {message}")]
    Selector { selector: String, message: String },
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },

    #[error("Dataset {} lacks key column {column:?}", path.display())]
    MissingKeyColumn { path: PathBuf, column: String },
}

impl LedgerError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| LedgerError::Io { path, source }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>) -> impl FnOnce(csv::Error) -> Self {
        let path = path.into();
        move |source| LedgerError::Csv { path, source }
    }
}
