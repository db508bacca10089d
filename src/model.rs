use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Gender {
    M,
    F,
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "M" => Ok(Gender::M),
            "F" => Ok(Gender::F),
            other => Err(format!("invalid gender {other:?}; use 'M' or 'F'")),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::M => f.write_str("M"),
            Gender::F => f.write_str("F"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub url: String,
    pub gender: Gender,
}

/// Competitions scraped from the site index, one partition per gender.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LeagueCatalog {
    #[serde(default)]
    pub men: BTreeMap<String, CatalogEntry>,
    #[serde(default)]
    pub women: BTreeMap<String, CatalogEntry>,
}

impl LeagueCatalog {
    pub fn partition(&self, gender: Gender) -> &BTreeMap<String, CatalogEntry> {
        match gender {
            Gender::M => &self.men,
            Gender::F => &self.women,
        }
    }

    pub fn insert(&mut self, entry: CatalogEntry) {
        let partition = match entry.gender {
            Gender::M => &mut self.men,
            Gender::F => &mut self.women,
        };
        partition.insert(entry.name.clone(), entry);
    }
}

/// Season label ("2023-2024") to season page url.
pub type SeasonCatalog = BTreeMap<String, String>;

/// Squad name to squad page url for one league season.
pub type TeamCatalog = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Fetching,
    Parsing,
    Disambiguating,
    Extracting,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchOutcome {
    Saved { path: PathBuf },
    Skipped { reason: String },
    NotPlayed,
    Filtered,
}

impl MatchOutcome {
    pub fn label(&self) -> String {
        match self {
            MatchOutcome::Saved { path } => path.display().to_string(),
            MatchOutcome::Skipped { .. } => "skipped".to_string(),
            MatchOutcome::NotPlayed => "not played".to_string(),
            MatchOutcome::Filtered => "filtered".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub match_number: usize,
    pub opponent: String,
    pub url: Option<String>,
    pub outcome: MatchOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub league: String,
    pub season: String,
    pub team: String,
    pub started_at: DateTime<Utc>,
    pub phase: RunPhase,
    pub pages_fetched: usize,
    pub fixtures_path: Option<PathBuf>,
    pub matches: Vec<MatchReport>,
    pub unresolved: Vec<String>,
}

impl RunReport {
    pub fn saved(&self) -> usize {
        self.matches
            .iter()
            .filter(|m| matches!(m.outcome, MatchOutcome::Saved { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.matches
            .iter()
            .filter(|m| matches!(m.outcome, MatchOutcome::Skipped { .. }))
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompetitionReport {
    pub league: String,
    pub season: String,
    pub workbook: PathBuf,
    pub sheets: Vec<String>,
    pub skipped_tables: usize,
}
