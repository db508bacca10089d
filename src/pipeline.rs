use crate::catalog::{CatalogCache, league_catalog, season_catalog};
use crate::config::{ScrapeConfig, sanitize_for_path};
use crate::disambiguate::{EntityPattern, RowFilter, select_tables};
use crate::extract::{ExtractOptions, TabularRecord, extract_table_with};
use crate::fetch::{CountingFetcher, PageFetcher};
use crate::model::{
    CatalogEntry, CompetitionReport, Gender, MatchOutcome, MatchReport, RunPhase, RunReport,
};
use crate::normalize::{
    LeagueAliasTable, normalize_league_name, normalize_team_name, team_display_name,
};
use crate::parser::{
    MATCH_LOG_TABLE_ID, RawRow, RawTable, absolutize_url, find_table, parse_tables,
    parse_team_catalog,
};
use crate::resolve::{ResolvedMatch, resolve_entry};
use crate::sheet::{SheetDestination, SheetWriter, unique_sheet_name};
use crate::similarity::Similarity;
use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const UNPLAYED_LINK_MARKER: &str = "stathead";

#[derive(Debug, Clone)]
pub struct TeamRunOptions {
    pub league: String,
    pub season: String,
    pub team: String,
    pub gender: Gender,
    /// Only matches against this opponent get a report workbook.
    pub opponent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompetitionRunOptions {
    pub league: String,
    pub season: String,
    pub gender: Gender,
}

/// A squad as listed on a league season page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRef {
    pub name: String,
    pub url: String,
}

/// The collaborators one run works with. The cache outlives the run so a
/// caller can reuse it.
pub struct ScrapeContext<'a> {
    pub config: &'a ScrapeConfig,
    fetcher: CountingFetcher<'a>,
    pub cache: &'a mut CatalogCache,
    pub writer: &'a mut dyn SheetWriter,
    pub aliases: LeagueAliasTable,
    scorer: Box<dyn Similarity>,
}

impl<'a> ScrapeContext<'a> {
    pub fn new(
        config: &'a ScrapeConfig,
        fetcher: &'a dyn PageFetcher,
        cache: &'a mut CatalogCache,
        writer: &'a mut dyn SheetWriter,
    ) -> Self {
        Self {
            config,
            fetcher: CountingFetcher::new(fetcher),
            cache,
            writer,
            aliases: LeagueAliasTable::default(),
            scorer: config.matching.scorer.scorer(),
        }
    }

    /// Pages delivered by the fetcher since the context was created.
    pub fn pages_fetched(&self) -> usize {
        self.fetcher.fetched()
    }

    pub fn scorer(&self) -> &dyn Similarity {
        self.scorer.as_ref()
    }

    fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            empty_cell: self.config.report.empty_cell.clone(),
        }
    }

    fn normalize_league(&self, name: &str) -> String {
        normalize_league_name(
            name,
            &self.aliases,
            self.scorer(),
            self.config.matching.alias_threshold,
        )
    }
}

pub fn list_leagues(ctx: &mut ScrapeContext<'_>, gender: Gender) -> Result<Vec<CatalogEntry>> {
    let catalog = league_catalog(
        ctx.cache,
        &ctx.fetcher,
        &ctx.config.competitions_url(),
        &ctx.config.site.base_url,
    )?;
    Ok(catalog.partition(gender).values().cloned().collect())
}

/// Matches free-text league input against the catalog for `gender`. Both
/// sides go through the alias table first, so "Fussball Bundesliga" and the
/// catalog's "Fußball-Bundesliga" meet as "Bundesliga".
pub fn resolve_league(
    ctx: &mut ScrapeContext<'_>,
    input: &str,
    gender: Gender,
) -> Result<ResolvedMatch<CatalogEntry>> {
    let catalog = league_catalog(
        ctx.cache,
        &ctx.fetcher,
        &ctx.config.competitions_url(),
        &ctx.config.site.base_url,
    )?;
    let partition = catalog.partition(gender);

    let mut index: BTreeMap<String, CatalogEntry> = BTreeMap::new();
    for (name, entry) in partition {
        let normalized = ctx.normalize_league(name);
        if let Some(existing) = index.get(&normalized) {
            debug!(
                alias = %normalized,
                kept = %existing.name,
                dropped = %name,
                "two leagues share an alias; keeping the first"
            );
            continue;
        }
        index.insert(normalized, entry.clone());
    }

    let query = ctx.normalize_league(input);
    let Some(found) = resolve_entry(
        &query,
        &index,
        ctx.config.matching.league_threshold,
        ctx.scorer(),
    ) else {
        bail!(
            "no {gender} league matches {input:?} ({} leagues in catalog)",
            partition.len()
        );
    };

    info!(input, league = %found.payload.name, score = found.score, "league resolved");
    Ok(ResolvedMatch {
        matched_key: found.matched_key,
        score: found.score,
        payload: found.payload.clone(),
    })
}

pub fn resolve_season(
    ctx: &mut ScrapeContext<'_>,
    league: &CatalogEntry,
    input: &str,
) -> Result<ResolvedMatch<String>> {
    let seasons = season_catalog(
        ctx.cache,
        &ctx.fetcher,
        &league.url,
        &ctx.config.site.base_url,
    )?;

    let Some(found) = resolve_entry(
        input,
        &seasons,
        ctx.config.matching.season_threshold,
        ctx.scorer(),
    ) else {
        bail!(
            "no season of {} matches {input:?} ({} seasons in catalog)",
            league.name,
            seasons.len()
        );
    };

    info!(input, season = %found.matched_key, score = found.score, "season resolved");
    Ok(ResolvedMatch {
        matched_key: found.matched_key,
        score: found.score,
        payload: found.payload.clone(),
    })
}

/// Fetches the season page and matches `input` against its squads, both
/// sides in slug form.
pub fn resolve_team(
    ctx: &mut ScrapeContext<'_>,
    season_url: &str,
    input: &str,
) -> Result<ResolvedMatch<TeamRef>> {
    let html = ctx
        .fetcher
        .fetch(season_url)
        .with_context(|| format!("failed to fetch season page {season_url}"))?;
    let squads = parse_team_catalog(&html, &ctx.config.site.base_url)?;

    let index: BTreeMap<String, TeamRef> = squads
        .into_iter()
        .map(|(name, url)| (normalize_team_name(&name), TeamRef { name, url }))
        .collect();

    let Some(found) = resolve_entry(
        &normalize_team_name(input),
        &index,
        ctx.config.matching.team_threshold,
        ctx.scorer(),
    ) else {
        bail!(
            "no team matches {input:?} ({} squads on {season_url})",
            index.len()
        );
    };

    info!(input, team = %found.payload.name, score = found.score, "team resolved");
    Ok(ResolvedMatch {
        matched_key: found.matched_key,
        score: found.score,
        payload: found.payload.clone(),
    })
}

/// League, season and team resolution, the fixtures sheet, then one workbook
/// per played match. A match report that cannot be fetched is skipped; every
/// other failure ends the run.
pub fn run_team_season(ctx: &mut ScrapeContext<'_>, options: &TeamRunOptions) -> Result<RunReport> {
    let mut report = RunReport {
        league: options.league.clone(),
        season: options.season.clone(),
        team: options.team.clone(),
        started_at: Utc::now(),
        phase: RunPhase::Idle,
        pages_fetched: 0,
        fixtures_path: None,
        matches: Vec::new(),
        unresolved: Vec::new(),
    };

    let pages_before = ctx.pages_fetched();
    let result = team_season(ctx, options, &mut report);
    report.pages_fetched = ctx.pages_fetched() - pages_before;

    match result {
        Ok(()) => {
            enter(&mut report.phase, RunPhase::Done);
            info!(
                league = %report.league,
                season = %report.season,
                team = %report.team,
                saved = report.saved(),
                skipped = report.skipped(),
                pages = report.pages_fetched,
                "team season run complete"
            );
            Ok(report)
        }
        Err(err) => {
            error!(phase = ?report.phase, error = %err, "team season run failed");
            enter(&mut report.phase, RunPhase::Failed);
            Err(err)
        }
    }
}

fn team_season(
    ctx: &mut ScrapeContext<'_>,
    options: &TeamRunOptions,
    report: &mut RunReport,
) -> Result<()> {
    enter(&mut report.phase, RunPhase::Fetching);
    let league = resolve_league(ctx, &options.league, options.gender)?;
    let season = resolve_season(ctx, &league.payload, &options.season)?;
    let team = resolve_team(ctx, &season.payload, &options.team)?;
    report.league = league.payload.name.clone();
    report.season = season.matched_key.clone();
    report.team = team.payload.name.clone();

    let html = ctx
        .fetcher
        .fetch(&team.payload.url)
        .with_context(|| format!("failed to fetch team page {}", team.payload.url))?;

    enter(&mut report.phase, RunPhase::Parsing);
    let tables = parse_tables(&html)?;
    let match_log = find_table(&tables, MATCH_LOG_TABLE_ID)
        .with_context(|| format!("no match log on team page {}", team.payload.url))?;

    let mut competition_filter = RowFilter::new(ctx.scorer());
    if ctx.config.report.filter_competition {
        competition_filter = competition_filter
            .with_aliases(&ctx.aliases, ctx.config.matching.alias_threshold)
            .with_competition(
                "comp",
                &league.payload.name,
                ctx.config.matching.competition_threshold,
            );
    }
    let opponent_filter = match &options.opponent {
        Some(name) => {
            let pattern = EntityPattern::new(
                &team_display_name(&normalize_team_name(name)),
                &ctx.config.report.affixes,
            );
            Some(RowFilter::new(ctx.scorer()).with_entity("opponent", &pattern)?)
        }
        None => None,
    };
    // Per row: counts as a matchday, gets a report workbook.
    let admitted: Vec<(bool, bool)> = match_log
        .body_rows
        .iter()
        .map(|row| {
            let in_competition = competition_filter.accepts(row);
            let wanted = in_competition
                && opponent_filter
                    .as_ref()
                    .is_none_or(|filter| filter.accepts(row));
            (in_competition, wanted)
        })
        .collect();
    drop(competition_filter);
    drop(opponent_filter);

    let reports_dir = ctx
        .config
        .output
        .dir
        .join("Match-Reports")
        .join(sanitize_for_path(&team.payload.name));

    let mut played = true;
    let mut match_number = 0usize;
    for (row, (in_competition, wanted)) in match_log.body_rows.iter().zip(admitted) {
        let opponent = row
            .cell("opponent")
            .map(|cell| cell.text.clone())
            .unwrap_or_default();

        if !in_competition {
            report.matches.push(MatchReport {
                match_number: 0,
                opponent,
                url: None,
                outcome: MatchOutcome::Filtered,
            });
            continue;
        }
        match_number += 1;

        let url = match_report_link(row).map(|href| absolutize_url(&ctx.config.site.base_url, href));
        if played && url.as_deref().is_some_and(|u| u.contains(UNPLAYED_LINK_MARKER)) {
            info!(match_number, "first unplayed match reached; stopping");
            played = false;
        }

        let outcome = match (&url, played, wanted) {
            (_, false, _) => MatchOutcome::NotPlayed,
            (_, true, false) => {
                debug!(match_number, %opponent, "opponent not requested");
                MatchOutcome::Filtered
            }
            (None, true, true) => {
                warn!(match_number, %opponent, "no match report link");
                report
                    .unresolved
                    .push(format!("Matchday {match_number} vs {opponent}"));
                MatchOutcome::Skipped {
                    reason: "no match report link".to_string(),
                }
            }
            (Some(url), true, true) => {
                enter(&mut report.phase, RunPhase::Fetching);
                match ctx.fetcher.fetch(url) {
                    Ok(html) => {
                        let workbook = save_match_report(
                            ctx,
                            &html,
                            &team.payload.name,
                            &opponent,
                            match_number,
                            &reports_dir,
                            &mut report.phase,
                        )
                        .with_context(|| format!("match report {url}"))?;
                        MatchOutcome::Saved { path: workbook }
                    }
                    Err(err) => {
                        warn!(match_number, %url, error = %err, "match report fetch failed; skipping");
                        report
                            .unresolved
                            .push(format!("Matchday {match_number} vs {opponent}"));
                        MatchOutcome::Skipped {
                            reason: err.to_string(),
                        }
                    }
                }
            }
        };

        report.matches.push(MatchReport {
            match_number,
            opponent,
            url,
            outcome,
        });
    }

    enter(&mut report.phase, RunPhase::Extracting);
    let mut fixtures = extract_table_with(match_log, &ctx.extract_options()).record;
    fixtures.set_column(
        "Match Report",
        report.matches.iter().map(|m| m.outcome.label()).collect(),
    )?;
    let workbook = ctx.config.output.dir.join("Fixtures").join(format!(
        "{}_matches_{}",
        sanitize_for_path(&team.payload.name),
        sanitize_for_path(&season.matched_key)
    ));
    ctx.writer
        .write_sheet(&SheetDestination::new(&workbook, "Fixtures"), &fixtures)?;
    report.fixtures_path = Some(workbook);

    Ok(())
}

// The report link is tagged on current pages; older layouts keep it in the
// second to last cell.
fn match_report_link(row: &RawRow) -> Option<&str> {
    row.cell("match_report")
        .or_else(|| row.cells.iter().rev().nth(1))
        .and_then(|cell| cell.href.as_deref())
}

/// Writes one sheet per (entity, category) pair of a match report page into
/// a single workbook and returns the workbook path.
pub fn save_match_report(
    ctx: &mut ScrapeContext<'_>,
    html: &str,
    team: &str,
    opponent: &str,
    match_number: usize,
    reports_dir: &Path,
    phase: &mut RunPhase,
) -> Result<PathBuf> {
    enter(phase, RunPhase::Parsing);
    let tables = parse_tables(html)?;

    enter(phase, RunPhase::Disambiguating);
    let opponent = team_display_name(&normalize_team_name(opponent));
    let config = ctx.config;
    let report = &config.report;
    let mut sheets: Vec<(String, Option<&RawTable>)> = Vec::new();
    for entity in [team, opponent.as_str()] {
        let slots = select_tables(
            &tables,
            &EntityPattern::new(entity, &report.affixes),
            &report.categories,
            report.missing_tables,
        )?;
        for slot in slots {
            sheets.push((format!("{entity} {}", sheet_label(&slot.category)), slot.table));
        }
    }

    enter(phase, RunPhase::Extracting);
    let workbook = reports_dir.join(format!(
        "Report-Matchday-{match_number}-{}-{}",
        sanitize_for_path(team),
        sanitize_for_path(&opponent)
    ));
    let extract_options = ctx.extract_options();
    let mut taken = Vec::new();
    for (name, table) in sheets {
        let record = match table {
            Some(table) => extract_table_with(table, &extract_options).record,
            None => TabularRecord::default(),
        };
        let sheet = unique_sheet_name(&name, &taken);
        ctx.writer
            .write_sheet(&SheetDestination::new(&workbook, &sheet), &record)?;
        taken.push(sheet);
    }

    info!(match_number, team, opponent = %opponent, workbook = %workbook.display(), "match report saved");
    Ok(workbook)
}

/// Every captioned table of a league season page, one sheet each.
pub fn scrape_competition_tables(
    ctx: &mut ScrapeContext<'_>,
    options: &CompetitionRunOptions,
) -> Result<CompetitionReport> {
    let league = resolve_league(ctx, &options.league, options.gender)?;
    let season = resolve_season(ctx, &league.payload, &options.season)?;

    let html = ctx
        .fetcher
        .fetch(&season.payload)
        .with_context(|| format!("failed to fetch competition page {}", season.payload))?;
    let tables = parse_tables(&html)?;

    let workbook = ctx.config.output.dir.join("Competitions").join(format!(
        "{}_{}",
        sanitize_for_path(&league.payload.name),
        sanitize_for_path(&season.matched_key)
    ));
    let extract_options = ctx.extract_options();

    let mut sheets = Vec::new();
    let mut skipped_tables = 0usize;
    for (index, table) in tables.iter().enumerate() {
        let Some(caption) = table.caption.as_deref() else {
            info!(table = index + 1, "skipping table without caption");
            skipped_tables += 1;
            continue;
        };

        let record = extract_table_with(table, &extract_options).record;
        let sheet = unique_sheet_name(caption, &sheets);
        ctx.writer
            .write_sheet(&SheetDestination::new(&workbook, &sheet), &record)?;
        sheets.push(sheet);
    }

    info!(
        league = %league.payload.name,
        season = %season.matched_key,
        sheets = sheets.len(),
        skipped_tables,
        "competition tables saved"
    );
    Ok(CompetitionReport {
        league: league.payload.name,
        season: season.matched_key,
        workbook,
        sheets,
        skipped_tables,
    })
}

fn sheet_label(category: &str) -> &str {
    category
        .trim()
        .strip_suffix("Stats")
        .map(str::trim_end)
        .filter(|label| !label.is_empty())
        .unwrap_or(category.trim())
}

fn enter(phase: &mut RunPhase, next: RunPhase) {
    if *phase != next {
        debug!(from = ?*phase, to = ?next, "run phase");
        *phase = next;
    }
}
