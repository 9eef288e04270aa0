use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Header names recognized as the fighter column of a CSV input.
const NAME_COLUMNS: [&str; 2] = ["Fighter Name", "fighters"];

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to read fighter list {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse fighter list {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },
}

/// Read entity names from a CSV with a recognized name column, or from a
/// plain list with one name per line.
pub fn load_names(path: &Path) -> Result<Vec<String>, InputError> {
    let content = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_names(&content).map_err(|source| InputError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_names(content: &str) -> Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let column = reader.headers()?.iter().position(|h| {
        NAME_COLUMNS
            .iter()
            .any(|c| h.trim().eq_ignore_ascii_case(c))
    });

    let Some(column) = column else {
        return Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect());
    };

    let mut names = Vec::new();
    for record in reader.records() {
        if let Some(name) = record?.get(column) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

/// Trim, drop blanks and repeats. First occurrence wins.
pub fn normalize(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.to_string()))
        .map(str::to_string)
        .collect()
}
