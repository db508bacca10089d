//! File-backed catalogs with a per-process memo.
//!
//! A catalog is scraped at most once per cache key: the first lookup reads
//! the cache file, falls back to scraping when the file is missing, corrupt or
//! empty, and persists what it scraped. Later lookups in the same process are
//! answered from memory, and later processes from the file.

use crate::fetch::PageFetcher;
use crate::model::{LeagueCatalog, SeasonCatalog};
use crate::parser::{parse_league_catalog, parse_season_catalog};
use crate::store::{load_cache, save_cache};
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

pub const LEAGUES_CACHE_KEY: &str = "leagues";

pub trait CatalogData: Serialize + DeserializeOwned {
    fn is_empty(&self) -> bool;
}

impl CatalogData for LeagueCatalog {
    fn is_empty(&self) -> bool {
        self.men.is_empty() && self.women.is_empty()
    }
}

impl CatalogData for SeasonCatalog {
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owned by the caller and passed to whatever needs catalogs. Taking
/// `&mut self` keeps check-then-populate a single critical section; share it
/// across threads behind a `Mutex`.
#[derive(Debug)]
pub struct CatalogCache {
    dir: PathBuf,
    memo: HashMap<String, Value>,
}

impl CatalogCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            memo: HashMap::new(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Memoized or file-backed catalog for `key`, `None` on a miss.
    pub fn load<T: CatalogData>(&mut self, key: &str) -> Option<T> {
        if let Some(value) = self.memo.get(key) {
            return serde_json::from_value(value.clone()).ok();
        }

        let path = self.path_for(key);
        let value = load_cache(&path)?;
        let catalog: T = match serde_json::from_value(value.clone()) {
            Ok(catalog) => catalog,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cache file has unexpected shape; treating as miss");
                return None;
            }
        };
        if catalog.is_empty() {
            return None;
        }

        self.memo.insert(key.to_string(), value);
        Some(catalog)
    }

    /// Returns the catalog for `key`, calling `populate` only on a miss.
    /// Non-empty results are written to the cache file; every result is
    /// memoized for the rest of the process.
    pub fn get_or_populate<T, F>(&mut self, key: &str, populate: F) -> Result<T>
    where
        T: CatalogData,
        F: FnOnce() -> T,
    {
        if let Some(catalog) = self.load(key) {
            return Ok(catalog);
        }

        let catalog = populate();
        let value = serde_json::to_value(&catalog)
            .with_context(|| format!("failed to serialize catalog {key}"))?;

        if catalog.is_empty() {
            warn!(key, "scraped catalog is empty; not persisting");
        } else {
            let path = self.path_for(key);
            save_cache(&path, &value)?;
            info!(key, path = %path.display(), "catalog cached");
        }

        self.memo.insert(key.to_string(), value);
        Ok(catalog)
    }
}

/// Cache key for the season list of one league, stable across runs.
pub fn season_cache_key(league_url: &str) -> String {
    let digest = Sha256::digest(league_url.as_bytes());
    format!("seasons-{}", &hex::encode(digest)[..16])
}

pub fn league_catalog(
    cache: &mut CatalogCache,
    fetcher: &dyn PageFetcher,
    competitions_url: &str,
    base_url: &str,
) -> Result<LeagueCatalog> {
    cache.get_or_populate(LEAGUES_CACHE_KEY, || {
        scrape_league_catalog(fetcher, competitions_url, base_url)
    })
}

pub fn season_catalog(
    cache: &mut CatalogCache,
    fetcher: &dyn PageFetcher,
    league_url: &str,
    base_url: &str,
) -> Result<SeasonCatalog> {
    cache.get_or_populate(&season_cache_key(league_url), || {
        scrape_season_catalog(fetcher, league_url, base_url)
    })
}

/// Scrapes the competitions index. Fetch or parse failures degrade to an
/// empty catalog.
pub fn scrape_league_catalog(
    fetcher: &dyn PageFetcher,
    competitions_url: &str,
    base_url: &str,
) -> LeagueCatalog {
    let html = match fetcher.fetch(competitions_url) {
        Ok(html) => html,
        Err(err) => {
            warn!(url = %competitions_url, error = %err, "league catalog unavailable; continuing with no leagues");
            return LeagueCatalog::default();
        }
    };

    match parse_league_catalog(&html, base_url) {
        Ok(catalog) => {
            info!(
                men = catalog.men.len(),
                women = catalog.women.len(),
                "league catalog scraped"
            );
            catalog
        }
        Err(err) => {
            warn!(error = %err, "league catalog could not be parsed");
            LeagueCatalog::default()
        }
    }
}

pub fn scrape_season_catalog(
    fetcher: &dyn PageFetcher,
    league_url: &str,
    base_url: &str,
) -> SeasonCatalog {
    let html = match fetcher.fetch(league_url) {
        Ok(html) => html,
        Err(err) => {
            warn!(url = %league_url, error = %err, "season catalog unavailable; continuing with no seasons");
            return SeasonCatalog::new();
        }
    };

    match parse_season_catalog(&html, base_url) {
        Ok(catalog) => {
            info!(url = %league_url, seasons = catalog.len(), "season catalog scraped");
            catalog
        }
        Err(err) => {
            warn!(url = %league_url, error = %err, "season catalog could not be parsed");
            SeasonCatalog::new()
        }
    }
}
