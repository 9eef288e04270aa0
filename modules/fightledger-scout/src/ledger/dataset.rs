use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;

use fightledger_common::{DatasetKind, LedgerRecord};
use tracing::warn;

use crate::error::LedgerError;

/// A living dataset held in memory. Columns are the fixed schema of `kind`
/// followed by any extra columns an older file carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    kind: DatasetKind,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Result of merging a batch into a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub dataset: Dataset,
    pub inserted: usize,
    pub updated: usize,
    /// Rows of the existing dataset dropped because they repeated a key.
    pub collapsed: usize,
}

impl UpsertOutcome {
    pub fn changed(&self) -> bool {
        self.inserted + self.updated + self.collapsed > 0
    }
}

impl Dataset {
    pub fn empty(kind: DatasetKind) -> Self {
        Self {
            kind,
            headers: kind.columns().iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Build from a header and rows as read from disk. Columns are mapped by
    /// name; schema columns the file lacks are filled with empty cells.
    pub fn conform(kind: DatasetKind, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let canonical = kind.columns();
        let extras: Vec<String> = headers
            .iter()
            .filter(|h| !canonical.contains(&h.as_str()))
            .cloned()
            .collect();

        let mut out = Self::empty(kind);
        out.headers.extend(extras);

        let positions: Vec<Option<usize>> = out
            .headers
            .iter()
            .map(|h| headers.iter().position(|src| src == h))
            .collect();
        out.rows = rows
            .into_iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|pos| pos.and_then(|p| row.get(p)).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        out
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in `row`.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.headers.iter().position(|h| h == column)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// Row whose key columns equal `key`.
    pub fn find(&self, key: &[&str]) -> Option<&[String]> {
        let idx = self.key_indices(self.kind.key_columns())?;
        self.rows
            .iter()
            .find(|row| idx.iter().zip(key).all(|(&i, k)| row[i] == *k))
            .map(Vec::as_slice)
    }

    fn key_indices(&self, key_columns: &[&str]) -> Option<Vec<usize>> {
        key_columns
            .iter()
            .map(|k| self.headers.iter().position(|h| h == k))
            .collect()
    }

    pub fn read(kind: DatasetKind, path: &Path) -> Result<Self, LedgerError> {
        if !path.exists() {
            return Ok(Self::empty(kind));
        }
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(LedgerError::csv(path))?;
        let headers: Vec<String> = reader
            .headers()
            .map_err(LedgerError::csv(path))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Ok(Self::empty(kind));
        }
        for key in kind.key_columns() {
            if !headers.iter().any(|h| h == key) {
                return Err(LedgerError::MissingKeyColumn {
                    path: path.to_path_buf(),
                    column: key.to_string(),
                });
            }
        }
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(LedgerError::csv(path))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self::conform(kind, headers, rows))
    }

    /// Write as CSV to `path` through a temp file in the same directory.
    pub fn write_atomic(&self, path: &Path) -> Result<(), LedgerError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = tempfile::NamedTempFile::new_in(dir).map_err(LedgerError::io(dir))?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file());
            writer
                .write_record(&self.headers)
                .map_err(LedgerError::csv(tmp.path()))?;
            for row in &self.rows {
                writer.write_record(row).map_err(LedgerError::csv(tmp.path()))?;
            }
            writer.flush().map_err(LedgerError::io(tmp.path()))?;
        }
        tmp.as_file().flush().map_err(LedgerError::io(tmp.path()))?;
        tmp.as_file().sync_all().map_err(LedgerError::io(tmp.path()))?;
        tmp.persist(path).map_err(|e| LedgerError::Io {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }
}

/// Merge `incoming` into `existing` by `key_columns`.
///
/// Incoming rows are in schema column order. A key already present keeps its
/// row position and takes the incoming values; extra columns keep their old
/// values. New keys are appended in incoming order. Repeated keys resolve to
/// the last occurrence, in `existing` and in `incoming` alike.
pub fn upsert(existing: Dataset, incoming: Vec<Vec<String>>, key_columns: &[&str]) -> UpsertOutcome {
    let Some(key_idx) = existing.key_indices(key_columns) else {
        warn!(dataset = %existing.kind, "Key columns missing from dataset, leaving it untouched");
        return UpsertOutcome {
            dataset: existing,
            inserted: 0,
            updated: 0,
            collapsed: 0,
        };
    };
    let key_of = |row: &[String]| -> Vec<String> {
        key_idx
            .iter()
            .map(|&i| row.get(i).cloned().unwrap_or_default())
            .collect()
    };

    let Dataset { kind, headers, rows } = existing;
    let width = headers.len();

    let mut merged: Vec<Vec<String>> = Vec::with_capacity(rows.len() + incoming.len());
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    let mut collapsed = 0;
    for row in rows {
        let key = key_of(&row);
        match index.get(&key) {
            Some(&at) => {
                merged[at] = row;
                collapsed += 1;
            }
            None => {
                index.insert(key, merged.len());
                merged.push(row);
            }
        }
    }
    if collapsed > 0 {
        warn!(dataset = %kind, collapsed, "Existing dataset repeated keys, kept last occurrence");
    }

    let mut inserted = 0;
    let mut updated = 0;
    let mut fresh: HashSet<usize> = HashSet::new();
    for mut row in incoming {
        row.resize(width, String::new());
        let key = key_of(&row);
        match index.get(&key) {
            Some(&at) => {
                let schema_width = kind.columns().len();
                let old = &merged[at];
                row[schema_width..].clone_from_slice(&old[schema_width..]);
                if *old != row {
                    if !fresh.contains(&at) {
                        updated += 1;
                    }
                    merged[at] = row;
                }
            }
            None => {
                index.insert(key, merged.len());
                fresh.insert(merged.len());
                merged.push(row);
                inserted += 1;
            }
        }
    }

    UpsertOutcome {
        dataset: Dataset {
            kind,
            headers,
            rows: merged,
        },
        inserted,
        updated,
        collapsed,
    }
}

/// Typed form of [`upsert`]: key columns come from the record's dataset.
pub fn upsert_records<R: LedgerRecord>(existing: Dataset, records: &[R]) -> UpsertOutcome {
    let rows = records.iter().map(R::to_row).collect();
    upsert(existing, rows, R::DATASET.key_columns())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fightledger_common::{Bout, StrikingRecord};

    fn strike(player: &str, date: &str, opponent: &str, tsl: u32) -> StrikingRecord {
        StrikingRecord {
            bout: Bout {
                player: player.into(),
                date: date.into(),
                opponent: opponent.into(),
                event: "UFC".into(),
                result: "W".into(),
            },
            tsl,
            ..Default::default()
        }
    }

    #[test]
    fn incoming_duplicates_resolve_to_last() {
        let out = upsert_records(
            Dataset::empty(DatasetKind::Striking),
            &[strike("A", "d1", "B", 1), strike("A", "d1", "B", 2)],
        );
        assert_eq!(out.inserted, 1);
        assert_eq!(out.updated, 0);
        assert_eq!(out.dataset.len(), 1);
        assert_eq!(out.dataset.cell(0, "TSL"), Some("2"));
    }

    #[test]
    fn existing_duplicates_collapse() {
        let cols = DatasetKind::Striking.columns().len();
        let mut a = vec![String::new(); cols];
        a[0] = "A".into();
        a[11] = "1".into();
        let mut b = a.clone();
        b[11] = "9".into();
        let headers = DatasetKind::Striking
            .columns()
            .iter()
            .map(|c| c.to_string())
            .collect();
        let existing = Dataset::conform(DatasetKind::Striking, headers, vec![a, b]);

        let out = upsert(existing, Vec::new(), DatasetKind::Striking.key_columns());
        assert_eq!(out.collapsed, 1);
        assert_eq!(out.dataset.len(), 1);
        assert_eq!(out.dataset.cell(0, "TSL"), Some("9"));
    }

    #[test]
    fn identical_batch_changes_nothing() {
        let first = upsert_records(Dataset::empty(DatasetKind::Striking), &[strike("A", "d", "B", 3)]);
        let again = upsert_records(first.dataset.clone(), &[strike("A", "d", "B", 3)]);
        assert!(!again.changed());
        assert_eq!(again.dataset, first.dataset);
    }

    #[test]
    fn conform_maps_by_header_name() {
        let headers = vec!["Opponent".to_string(), "Legacy".to_string(), "Player".to_string()];
        let rows = vec![vec!["B".to_string(), "old".to_string(), "A".to_string()]];
        let ds = Dataset::conform(DatasetKind::Striking, headers, rows);

        assert_eq!(ds.headers().last().map(String::as_str), Some("Legacy"));
        assert_eq!(ds.cell(0, "Player"), Some("A"));
        assert_eq!(ds.cell(0, "Opponent"), Some("B"));
        assert_eq!(ds.cell(0, "Legacy"), Some("old"));
        assert_eq!(ds.cell(0, "KD"), Some(""));
    }
}
