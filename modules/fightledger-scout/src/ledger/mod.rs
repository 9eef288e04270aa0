//! Living datasets on disk. Each merge reads the current file, upserts the
//! batch by key, backs the old file up and replaces it atomically.

pub mod dataset;

use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use fightledger_common::{DataLayout, DatasetKind, LedgerRecord};
use tracing::info;

pub use dataset::{upsert, upsert_records, Dataset, UpsertOutcome};

use crate::error::LedgerError;

/// What one merge did to one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetReport {
    pub kind: DatasetKind,
    pub rows_before: usize,
    pub rows_after: usize,
    pub inserted: usize,
    pub updated: usize,
    pub written: bool,
    pub backup: Option<PathBuf>,
}

impl fmt::Display for DatasetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<26} {:>6} -> {:<6} (+{} new, {} updated){}",
            self.kind.file_name(),
            self.rows_before,
            self.rows_after,
            self.inserted,
            self.updated,
            if self.written { "" } else { " not written" }
        )
    }
}

pub struct Ledger {
    layout: DataLayout,
    dry_run: bool,
}

impl Ledger {
    pub fn new(layout: DataLayout) -> Self {
        Self {
            layout,
            dry_run: false,
        }
    }

    /// Merge without touching any file.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn load(&self, kind: DatasetKind) -> Result<Dataset, LedgerError> {
        Dataset::read(kind, &self.layout.dataset_path(kind))
    }

    /// Upsert `records` into their dataset and persist the result.
    ///
    /// Nothing is written when the batch changes nothing. Any error leaves
    /// the previous file in place.
    pub fn merge_records<R: LedgerRecord>(&self, records: &[R]) -> Result<DatasetReport, LedgerError> {
        let kind = R::DATASET;
        let existing = self.load(kind)?;
        let rows_before = existing.len();
        let outcome = upsert_records(existing, records);

        let mut report = DatasetReport {
            kind,
            rows_before,
            rows_after: outcome.dataset.len(),
            inserted: outcome.inserted,
            updated: outcome.updated,
            written: false,
            backup: None,
        };
        if !outcome.changed() || self.dry_run {
            info!(
                dataset = %kind,
                inserted = report.inserted,
                updated = report.updated,
                dry_run = self.dry_run,
                "Dataset not written"
            );
            return Ok(report);
        }

        report.backup = self.commit(&outcome.dataset)?;
        report.written = true;
        info!(
            dataset = %kind,
            rows_before,
            rows_after = report.rows_after,
            inserted = report.inserted,
            updated = report.updated,
            "Dataset updated"
        );
        Ok(report)
    }

    fn commit(&self, dataset: &Dataset) -> Result<Option<PathBuf>, LedgerError> {
        let path = self.layout.dataset_path(dataset.kind());
        let backup = if path.exists() {
            Some(self.backup(dataset.kind())?)
        } else {
            None
        };
        dataset.write_atomic(&path)?;
        Ok(backup)
    }

    /// Copy the current file, unmodified, into the backups directory.
    pub fn backup(&self, kind: DatasetKind) -> Result<PathBuf, LedgerError> {
        let source = self.layout.dataset_path(kind);
        let dir = self.layout.backups_dir();
        std::fs::create_dir_all(&dir).map_err(LedgerError::io(&dir))?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let mut target = dir.join(format!("{}_{stamp}.csv", kind.stem()));
        let mut n = 1;
        while target.exists() {
            target = dir.join(format!("{}_{stamp}_{n}.csv", kind.stem()));
            n += 1;
        }
        std::fs::copy(&source, &target).map_err(LedgerError::io(&source))?;
        info!(dataset = %kind, backup = %target.display(), "Backed up dataset");
        Ok(target)
    }

    /// Row count of every dataset; `None` when the file does not exist yet.
    pub fn row_counts(&self) -> Vec<(DatasetKind, Result<Option<usize>, LedgerError>)> {
        DatasetKind::ALL
            .into_iter()
            .map(|kind| {
                let count = if self.layout.dataset_path(kind).exists() {
                    self.load(kind).map(|d| Some(d.len()))
                } else {
                    Ok(None)
                };
                (kind, count)
            })
            .collect()
    }
}
