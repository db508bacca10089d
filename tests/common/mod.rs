#![allow(dead_code)]

use anyhow::Result;
use fbscrape::config::ScrapeConfig;
use fbscrape::extract::TabularRecord;
use fbscrape::fetch::{FetchError, PageFetcher};
use fbscrape::sheet::{SheetDestination, SheetWriter};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const COMPETITIONS_URL: &str = "https://fbref.com/en/comps/";
pub const PREMIER_LEAGUE_URL: &str = "https://fbref.com/en/comps/9/history/Premier-League-Seasons";
pub const SEASON_URL: &str =
    "https://fbref.com/en/comps/9/2023-2024/2023-2024-Premier-League-Stats";
pub const TEAM_URL: &str = "https://fbref.com/en/squads/b8fd03ef/2023-2024/Manchester-City-Stats";
pub const ARSENAL_REPORT_URL: &str =
    "https://fbref.com/en/matches/aaa11111/Arsenal-Manchester-City-August-11-2023-Premier-League";
pub const UNITED_REPORT_URL: &str =
    "https://fbref.com/en/matches/bbb22222/Manchester-City-Manchester-United";

/// Serves pages from `tests/fixtures`; unknown urls answer 404.
pub struct FixtureFetcher {
    pages: HashMap<String, PathBuf>,
    requests: RefCell<Vec<String>>,
}

impl FixtureFetcher {
    pub fn empty() -> Self {
        Self {
            pages: HashMap::new(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn site() -> Self {
        let mut fetcher = Self::empty();
        fetcher.serve(COMPETITIONS_URL, "competitions.html");
        fetcher.serve(PREMIER_LEAGUE_URL, "premier_league_seasons.html");
        fetcher.serve(SEASON_URL, "premier_league_2023_2024.html");
        fetcher.serve(TEAM_URL, "manchester_city_2023_2024.html");
        fetcher.serve(ARSENAL_REPORT_URL, "match_report_arsenal.html");
        fetcher
    }

    pub fn serve(&mut self, url: &str, fixture: &str) {
        self.pages.insert(url.to_string(), fixture_path(fixture));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.borrow().iter().filter(|u| *u == url).count()
    }
}

impl PageFetcher for FixtureFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.requests.borrow_mut().push(url.to_string());
        match self.pages.get(url) {
            Some(path) => Ok(std::fs::read_to_string(path).expect("fixture must be readable")),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

#[derive(Default)]
pub struct MemoryWriter {
    pub sheets: Vec<(SheetDestination, TabularRecord)>,
}

impl MemoryWriter {
    pub fn sheet(&self, name: &str) -> Option<&TabularRecord> {
        self.sheets
            .iter()
            .find(|(dest, _)| dest.sheet == name)
            .map(|(_, record)| record)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(dest, _)| dest.sheet.clone()).collect()
    }
}

impl SheetWriter for MemoryWriter {
    fn write_sheet(
        &mut self,
        destination: &SheetDestination,
        record: &TabularRecord,
    ) -> Result<PathBuf> {
        self.sheets.push((destination.clone(), record.clone()));
        Ok(destination.workbook.join(&destination.sheet))
    }
}

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("fixture must be readable")
}

pub fn test_config(root: &Path) -> ScrapeConfig {
    let mut config = ScrapeConfig::default();
    config.cache.dir = root.join("cache");
    config.output.dir = root.join("out");
    config
}
