use crate::model::{CatalogEntry, Gender, LeagueCatalog, SeasonCatalog, TeamCatalog};
use anyhow::{Result, anyhow};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

pub const LEAGUE_TABLE_IDS: [&str; 2] = [
    "comps_1_fa_club_league_senior",
    "comps_2_fa_club_league_senior",
];
pub const SEASONS_TABLE_ID: &str = "seasons";
pub const SQUADS_TABLE_ID: &str = "stats_squads_standard_for";
pub const MATCH_LOG_TABLE_ID: &str = "matchlogs_for";

// Rows inside tbody that repeat headers or separate groups.
const NON_DATA_ROW_CLASSES: [&str; 3] = ["thead", "over_header", "spacer"];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawCell {
    pub text: String,
    /// The cell's `data-stat` tag.
    pub stat: Option<String>,
    /// First link inside the cell, as written in the markup.
    pub href: Option<String>,
}

impl RawCell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRow {
    pub cells: Vec<RawCell>,
}

impl RawRow {
    pub fn cell(&self, stat: &str) -> Option<&RawCell> {
        self.cells
            .iter()
            .find(|cell| cell.stat.as_deref() == Some(stat))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawTable {
    pub id: Option<String>,
    pub caption: Option<String>,
    pub header_rows: Vec<Vec<String>>,
    pub body_rows: Vec<RawRow>,
}

impl RawTable {
    pub fn from_text(
        caption: Option<&str>,
        header_rows: Vec<Vec<String>>,
        body_rows: Vec<Vec<String>>,
    ) -> Self {
        Self {
            id: None,
            caption: caption.map(ToString::to_string),
            header_rows,
            body_rows: body_rows
                .into_iter()
                .map(|row| RawRow {
                    cells: row.into_iter().map(RawCell::text).collect(),
                })
                .collect(),
        }
    }
}

/// Every `<table>` on the page, in document order.
pub fn parse_tables(html: &str) -> Result<Vec<RawTable>> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    document
        .select(&table_sel)
        .map(read_table)
        .collect::<Result<Vec<_>>>()
}

pub fn find_table<'a>(tables: &'a [RawTable], id: &str) -> Option<&'a RawTable> {
    tables.iter().find(|table| table.id.as_deref() == Some(id))
}

fn read_table(table: ElementRef<'_>) -> Result<RawTable> {
    let caption_sel = selector("caption")?;
    let header_row_sel = selector("thead tr")?;
    let header_cell_sel = selector("th")?;
    let body_row_sel = selector("tbody tr")?;
    let body_cell_sel = selector("th, td")?;
    let link_sel = selector("a")?;

    let caption = table
        .select(&caption_sel)
        .next()
        .map(|c| collapse_whitespace(&element_text(c)))
        .filter(|c| !c.is_empty());

    let header_rows = table
        .select(&header_row_sel)
        .map(|row| {
            row.select(&header_cell_sel)
                .map(|cell| element_text(cell).trim().to_string())
                .collect::<Vec<_>>()
        })
        .collect();

    let body_rows = table
        .select(&body_row_sel)
        .filter(|row| {
            !row
                .value()
                .classes()
                .any(|class| NON_DATA_ROW_CLASSES.contains(&class))
        })
        .map(|row| RawRow {
            cells: row
                .select(&body_cell_sel)
                .map(|cell| RawCell {
                    text: element_text(cell).trim().to_string(),
                    stat: cell.value().attr("data-stat").map(ToString::to_string),
                    href: cell
                        .select(&link_sel)
                        .next()
                        .and_then(|a| a.value().attr("href"))
                        .map(ToString::to_string),
                })
                .collect(),
        })
        .filter(|row| !row.cells.is_empty())
        .collect();

    Ok(RawTable {
        id: table.value().attr("id").map(ToString::to_string),
        caption,
        header_rows,
        body_rows,
    })
}

/// Reads both senior league tables of the competitions index.
pub fn parse_league_catalog(html: &str, base_url: &str) -> Result<LeagueCatalog> {
    let tables = parse_tables(html)?;
    let mut catalog = LeagueCatalog::default();

    for table_id in LEAGUE_TABLE_IDS {
        let Some(table) = find_table(&tables, table_id) else {
            warn!(table = table_id, "league table not found on competitions page");
            continue;
        };

        for row in &table.body_rows {
            // Name link sits in the row header, gender in the first data cell.
            let Some(name_cell) = row.cells.first() else {
                continue;
            };
            let Some(href) = name_cell.href.as_deref() else {
                continue;
            };
            let Some(gender_cell) = row.cells.get(1) else {
                continue;
            };
            let Ok(gender) = gender_cell.text.parse::<Gender>() else {
                debug!(league = %name_cell.text, gender = %gender_cell.text, "unknown gender; skipping");
                continue;
            };

            catalog.insert(CatalogEntry {
                name: name_cell.text.clone(),
                url: absolutize_url(base_url, href),
                gender,
            });
        }
    }

    Ok(catalog)
}

pub fn parse_season_catalog(html: &str, base_url: &str) -> Result<SeasonCatalog> {
    link_catalog(html, base_url, SEASONS_TABLE_ID)
}

pub fn parse_team_catalog(html: &str, base_url: &str) -> Result<TeamCatalog> {
    link_catalog(html, base_url, SQUADS_TABLE_ID)
}

// Label and absolute url of the link in the first cell of every body row.
fn link_catalog(html: &str, base_url: &str, table_id: &str) -> Result<SeasonCatalog> {
    let tables = parse_tables(html)?;
    let Some(table) = find_table(&tables, table_id) else {
        warn!(table = table_id, "catalog table not found on page");
        return Ok(SeasonCatalog::new());
    };

    Ok(table
        .body_rows
        .iter()
        .filter_map(|row| row.cells.first())
        .filter_map(|cell| {
            let href = cell.href.as_deref()?;
            Some((cell.text.clone(), absolutize_url(base_url, href)))
        })
        .collect())
}

pub fn absolutize_url(base_url: &str, value: &str) -> String {
    match Url::parse(base_url).and_then(|base| base.join(value)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", base_url.trim_end_matches('/'), value),
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow!("invalid selector {css}: {err:?}"))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
