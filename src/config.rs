use crate::similarity::{IndelRatio, JaroWinkler, LevenshteinRatio, Similarity};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Smallest pause allowed between two requests to the site.
pub const MIN_REQUEST_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScrapeConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl ScrapeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.site.base_url.trim().is_empty() {
            bail!("site.base_url must not be empty");
        }
        url::Url::parse(&self.site.base_url)
            .with_context(|| format!("site.base_url is not a valid url: {}", self.site.base_url))?;
        if self.fetch.timeout_secs == 0 {
            bail!("fetch.timeout_secs must be greater than zero");
        }
        if self.fetch.request_delay_ms < MIN_REQUEST_DELAY_MS {
            bail!(
                "fetch.request_delay_ms must be at least {MIN_REQUEST_DELAY_MS}, got {}",
                self.fetch.request_delay_ms
            );
        }
        if self.report.categories.is_empty() {
            bail!("report.categories must list at least one table category");
        }
        if self.report.empty_cell.trim().is_empty() {
            bail!("report.empty_cell must not be blank");
        }

        let thresholds = [
            ("matching.league_threshold", self.matching.league_threshold),
            ("matching.season_threshold", self.matching.season_threshold),
            ("matching.team_threshold", self.matching.team_threshold),
            ("matching.alias_threshold", self.matching.alias_threshold),
            (
                "matching.competition_threshold",
                self.matching.competition_threshold,
            ),
        ];
        for (name, value) in thresholds {
            if !(0.0..=100.0).contains(&value) {
                bail!("{name} must be within 0..=100, got {value}");
            }
        }

        Ok(())
    }

    pub fn competitions_url(&self) -> String {
        format!(
            "{}{}",
            self.site.base_url.trim_end_matches('/'),
            self.site.competitions_path
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_competitions_path")]
    pub competitions_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            competitions_path: default_competitions_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: None,
            request_delay_ms: default_request_delay_ms(),
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    #[default]
    Indel,
    Levenshtein,
    JaroWinkler,
}

impl ScorerKind {
    pub fn scorer(self) -> Box<dyn Similarity> {
        match self {
            ScorerKind::Indel => Box::new(IndelRatio),
            ScorerKind::Levenshtein => Box::new(LevenshteinRatio),
            ScorerKind::JaroWinkler => Box::new(JaroWinkler),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    #[serde(default)]
    pub scorer: ScorerKind,
    #[serde(default = "default_resolve_threshold")]
    pub league_threshold: f64,
    #[serde(default = "default_resolve_threshold")]
    pub season_threshold: f64,
    #[serde(default = "default_resolve_threshold")]
    pub team_threshold: f64,
    #[serde(default = "default_alias_threshold")]
    pub alias_threshold: f64,
    #[serde(default = "default_competition_threshold")]
    pub competition_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            scorer: ScorerKind::Indel,
            league_threshold: default_resolve_threshold(),
            season_threshold: default_resolve_threshold(),
            team_threshold: default_resolve_threshold(),
            alias_threshold: default_alias_threshold(),
            competition_threshold: default_competition_threshold(),
        }
    }
}

/// What to do when a page lacks a table for a required category.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingTablePolicy {
    #[default]
    Fail,
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    #[serde(default = "default_affixes")]
    pub affixes: Vec<String>,
    #[serde(default)]
    pub missing_tables: MissingTablePolicy,
    #[serde(default = "default_empty_cell")]
    pub empty_cell: String,
    #[serde(default = "default_true")]
    pub filter_competition: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            affixes: default_affixes(),
            missing_tables: MissingTablePolicy::Fail,
            empty_cell: default_empty_cell(),
            filter_competition: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_out_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_out_dir(),
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<ScrapeConfig> {
    let Some(path) = path else {
        return Ok(ScrapeConfig::default());
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let config: ScrapeConfig = toml::from_str(&text)
        .with_context(|| format!("failed to parse toml in {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

pub fn sanitize_for_path(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://fbref.com".to_string()
}

fn default_competitions_path() -> String {
    "/en/comps/".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_request_delay_ms() -> u64 {
    6_000
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/cache")
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("data/out")
}

fn default_resolve_threshold() -> f64 {
    80.0
}

fn default_alias_threshold() -> f64 {
    85.0
}

fn default_competition_threshold() -> f64 {
    70.0
}

fn default_categories() -> Vec<String> {
    vec!["Player Stats".to_string(), "Goalkeeper Stats".to_string()]
}

fn default_affixes() -> Vec<String> {
    vec![
        "FC".to_string(),
        "SC".to_string(),
        "Football Club".to_string(),
    ]
}

fn default_empty_cell() -> String {
    "0".to_string()
}
