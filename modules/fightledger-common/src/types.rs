use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::content_hash;

// --- Categories and datasets ---

/// Per-bout statistics block on a fighter's stats page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Striking,
    Clinch,
    Ground,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Striking, Category::Clinch, Category::Ground];

    /// Section title on the page. Matched case-insensitively.
    pub fn title(&self) -> &'static str {
        match self {
            Category::Striking => "Striking",
            Category::Clinch => "Clinch",
            Category::Ground => "Ground",
        }
    }

    /// Number of cells a source row must carry.
    pub fn source_width(&self) -> usize {
        16
    }

    pub fn dataset(&self) -> DatasetKind {
        match self {
            Category::Striking => DatasetKind::Striking,
            Category::Clinch => DatasetKind::Clinch,
            Category::Ground => DatasetKind::Ground,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

pub const EVENT_KEY: [&str; 4] = ["Player", "Date", "Opponent", "Event"];
pub const PROFILE_KEY: [&str; 1] = ["Name"];

/// One living dataset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatasetKind {
    Profiles,
    Striking,
    Clinch,
    Ground,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 4] = [
        DatasetKind::Profiles,
        DatasetKind::Striking,
        DatasetKind::Clinch,
        DatasetKind::Ground,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            DatasetKind::Profiles => "fighter_profiles.csv",
            DatasetKind::Striking => "striking_data_living.csv",
            DatasetKind::Clinch => "clinch_data_living.csv",
            DatasetKind::Ground => "ground_data_living.csv",
        }
    }

    pub fn stem(&self) -> &'static str {
        self.file_name().trim_end_matches(".csv")
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            DatasetKind::Profiles => ProfileRecord::COLUMNS,
            DatasetKind::Striking => StrikingRecord::COLUMNS,
            DatasetKind::Clinch => ClinchRecord::COLUMNS,
            DatasetKind::Ground => GroundRecord::COLUMNS,
        }
    }

    pub fn key_columns(&self) -> &'static [&'static str] {
        match self {
            DatasetKind::Profiles => &PROFILE_KEY,
            _ => &EVENT_KEY,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

// --- Run mode ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Reuse stored documents; fetch only entities without one.
    #[default]
    Incremental,
    /// Fetch every entity.
    Full,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" => Ok(RunMode::Incremental),
            "full" => Ok(RunMode::Full),
            other => Err(format!("unknown run mode {other:?} (expected incremental or full)")),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Incremental => f.write_str("incremental"),
            RunMode::Full => f.write_str("full"),
        }
    }
}

// --- Raw documents ---

/// Verbatim stats page for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub entity: String,
    pub content: String,
    /// Hex SHA-256 of `content`.
    pub fingerprint: String,
    pub retrieved_at: DateTime<Utc>,
    pub source_url: String,
}

impl RawDocument {
    pub fn new(
        entity: impl Into<String>,
        content: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            entity: entity.into(),
            fingerprint: content_hash(&content),
            content,
            retrieved_at: Utc::now(),
            source_url: source_url.into(),
        }
    }
}

// --- Records ---

/// A typed row of a living dataset.
pub trait LedgerRecord {
    const DATASET: DatasetKind;
    const COLUMNS: &'static [&'static str];

    /// Cells in `COLUMNS` order.
    fn to_row(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WinMethodSource {
    Observed,
    #[default]
    Approximated,
}

impl fmt::Display for WinMethodSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WinMethodSource::Observed => f.write_str("observed"),
            WinMethodSource::Approximated => f.write_str("approximated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileRecord {
    pub name: String,
    pub division: String,
    /// W-L-D as the source prints it.
    pub record: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub wins_ko: u32,
    pub wins_sub: u32,
    pub wins_dec: u32,
    pub win_method_source: WinMethodSource,
    pub height_weight: String,
    pub date_of_birth: String,
    pub reach: String,
    pub stance: String,
    pub team: String,
    pub country: String,
    pub striking_accuracy: String,
    pub takedown_accuracy: String,
}

impl LedgerRecord for ProfileRecord {
    const DATASET: DatasetKind = DatasetKind::Profiles;
    const COLUMNS: &'static [&'static str] = &[
        "Name",
        "Division",
        "Record",
        "Wins",
        "Losses",
        "Draws",
        "Wins by KO/TKO",
        "Wins by Submission",
        "Wins by Decision",
        "Win Method Source",
        "Height/Weight",
        "Date of Birth",
        "Reach",
        "Stance",
        "Team",
        "Country",
        "Striking Accuracy",
        "Takedown Accuracy",
    ];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.division.clone(),
            self.record.clone(),
            self.wins.to_string(),
            self.losses.to_string(),
            self.draws.to_string(),
            self.wins_ko.to_string(),
            self.wins_sub.to_string(),
            self.wins_dec.to_string(),
            self.win_method_source.to_string(),
            self.height_weight.clone(),
            self.date_of_birth.clone(),
            self.reach.clone(),
            self.stance.clone(),
            self.team.clone(),
            self.country.clone(),
            self.striking_accuracy.clone(),
            self.takedown_accuracy.clone(),
        ]
    }
}

/// Identifying columns shared by every event record. Dates stay as printed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bout {
    pub player: String,
    pub date: String,
    pub opponent: String,
    pub event: String,
    pub result: String,
}

impl Bout {
    fn cells(&self) -> Vec<String> {
        vec![
            self.player.clone(),
            self.date.clone(),
            self.opponent.clone(),
            self.event.clone(),
            self.result.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StrikingRecord {
    pub bout: Bout,
    pub sdbl: u32,
    pub sdba: u32,
    pub sdhl: u32,
    pub sdha: u32,
    pub sdll: u32,
    pub sdla: u32,
    pub tsl: u32,
    pub tsa: u32,
    pub ssl: u32,
    pub ssa: u32,
    pub tsl_tsa: String,
    pub kd: u32,
    pub pct_body: String,
    pub pct_head: String,
    pub pct_leg: String,
}

impl LedgerRecord for StrikingRecord {
    const DATASET: DatasetKind = DatasetKind::Striking;
    const COLUMNS: &'static [&'static str] = &[
        "Player", "Date", "Opponent", "Event", "Result", "SDBL", "SDBA", "SDHL", "SDHA", "SDLL",
        "SDLA", "TSL", "TSA", "SSL", "SSA", "TSL-TSA", "KD", "%BODY", "%HEAD", "%LEG",
    ];

    fn to_row(&self) -> Vec<String> {
        let mut row = self.bout.cells();
        row.extend(
            [
                self.sdbl, self.sdba, self.sdhl, self.sdha, self.sdll, self.sdla, self.tsl,
                self.tsa, self.ssl, self.ssa,
            ]
            .iter()
            .map(u32::to_string),
        );
        row.push(self.tsl_tsa.clone());
        row.push(self.kd.to_string());
        row.push(self.pct_body.clone());
        row.push(self.pct_head.clone());
        row.push(self.pct_leg.clone());
        row
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClinchRecord {
    pub bout: Bout,
    pub scbl: u32,
    pub scba: u32,
    pub schl: u32,
    pub scha: u32,
    pub scll: u32,
    pub scla: u32,
    pub rv: u32,
    pub sr: u32,
    pub tdl: u32,
    pub tda: u32,
    pub tds: u32,
    pub tk_acc: String,
}

impl LedgerRecord for ClinchRecord {
    const DATASET: DatasetKind = DatasetKind::Clinch;
    const COLUMNS: &'static [&'static str] = &[
        "Player", "Date", "Opponent", "Event", "Result", "SCBL", "SCBA", "SCHL", "SCHA", "SCLL",
        "SCLA", "RV", "SR", "TDL", "TDA", "TDS", "TK ACC",
    ];

    fn to_row(&self) -> Vec<String> {
        let mut row = self.bout.cells();
        row.extend(
            [
                self.scbl, self.scba, self.schl, self.scha, self.scll, self.scla, self.rv,
                self.sr, self.tdl, self.tda, self.tds,
            ]
            .iter()
            .map(u32::to_string),
        );
        row.push(self.tk_acc.clone());
        row
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroundRecord {
    pub bout: Bout,
    pub sgbl: u32,
    pub sgba: u32,
    pub sghl: u32,
    pub sgha: u32,
    pub sgll: u32,
    pub sgla: u32,
    pub ad: u32,
    pub adhg: u32,
    pub adtb: u32,
    pub adtm: u32,
    pub adts: u32,
    pub sm: u32,
}

impl LedgerRecord for GroundRecord {
    const DATASET: DatasetKind = DatasetKind::Ground;
    const COLUMNS: &'static [&'static str] = &[
        "Player", "Date", "Opponent", "Event", "Result", "SGBL", "SGBA", "SGHL", "SGHA", "SGLL",
        "SGLA", "AD", "ADHG", "ADTB", "ADTM", "ADTS", "SM",
    ];

    fn to_row(&self) -> Vec<String> {
        let mut row = self.bout.cells();
        row.extend(
            [
                self.sgbl, self.sgba, self.sghl, self.sgha, self.sgll, self.sgla, self.ad,
                self.adhg, self.adtb, self.adtm, self.adts, self.sm,
            ]
            .iter()
            .map(u32::to_string),
        );
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_match_column_count() {
        assert_eq!(
            ProfileRecord::default().to_row().len(),
            ProfileRecord::COLUMNS.len()
        );
        assert_eq!(
            StrikingRecord::default().to_row().len(),
            StrikingRecord::COLUMNS.len()
        );
        assert_eq!(
            ClinchRecord::default().to_row().len(),
            ClinchRecord::COLUMNS.len()
        );
        assert_eq!(
            GroundRecord::default().to_row().len(),
            GroundRecord::COLUMNS.len()
        );
    }

    #[test]
    fn key_columns_are_part_of_schema() {
        for kind in DatasetKind::ALL {
            for key in kind.key_columns() {
                assert!(kind.columns().contains(key), "{kind}: {key}");
            }
        }
    }

    #[test]
    fn run_mode_parses_case_insensitively() {
        assert_eq!("FULL".parse::<RunMode>().unwrap(), RunMode::Full);
        assert_eq!(" incremental ".parse::<RunMode>().unwrap(), RunMode::Incremental);
        assert!("partial".parse::<RunMode>().is_err());
    }

    #[test]
    fn raw_document_fingerprints_content() {
        let a = RawDocument::new("A", "<html>1</html>", "u");
        let b = RawDocument::new("A", "<html>1</html>", "u");
        let c = RawDocument::new("A", "<html>2</html>", "u");
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
    }
}
