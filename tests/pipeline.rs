mod common;

use anyhow::Result;
use common::{
    ARSENAL_REPORT_URL, FixtureFetcher, MemoryWriter, SEASON_URL, TEAM_URL, UNITED_REPORT_URL,
    test_config,
};
use fbscrape::catalog::CatalogCache;
use fbscrape::config::MissingTablePolicy;
use fbscrape::model::{Gender, MatchOutcome, RunPhase};
use fbscrape::pipeline::{
    CompetitionRunOptions, ScrapeContext, TeamRunOptions, resolve_league, run_team_season,
    scrape_competition_tables,
};
use fbscrape::sheet::CsvWorkbookWriter;
use std::fs;
use tempfile::tempdir;

fn city_options() -> TeamRunOptions {
    TeamRunOptions {
        league: "premier league".to_string(),
        season: "2023-2024".to_string(),
        team: "manchester city fc".to_string(),
        gender: Gender::M,
        opponent: None,
    }
}

#[test]
fn team_run_writes_fixtures_and_match_reports() -> Result<()> {
    let temp = tempdir()?;
    let config = test_config(temp.path());
    let fetcher = FixtureFetcher::site();
    let mut cache = CatalogCache::new(&config.cache.dir);
    let mut writer = CsvWorkbookWriter;
    let mut ctx = ScrapeContext::new(&config, &fetcher, &mut cache, &mut writer);

    let report = run_team_season(&mut ctx, &city_options())?;

    assert_eq!(report.phase, RunPhase::Done);
    assert_eq!(report.league, "Premier League");
    assert_eq!(report.season, "2023-2024");
    assert_eq!(report.team, "Manchester City");
    assert_eq!(report.matches.len(), 4);
    assert_eq!(report.saved(), 1);
    assert_eq!(report.skipped(), 1);
    // competitions, seasons, season page, team page and one match report
    assert_eq!(report.pages_fetched, 5);

    assert!(matches!(report.matches[0].outcome, MatchOutcome::Saved { .. }));
    assert_eq!(report.matches[0].match_number, 1);
    assert_eq!(report.matches[1].outcome, MatchOutcome::Filtered);
    assert!(matches!(report.matches[2].outcome, MatchOutcome::Skipped { .. }));
    assert_eq!(report.matches[2].match_number, 2);
    assert_eq!(report.matches[3].outcome, MatchOutcome::NotPlayed);
    assert_eq!(report.unresolved, vec!["Matchday 2 vs Manchester Utd".to_string()]);

    // The unplayed fixture is never requested.
    assert_eq!(fetcher.request_count(ARSENAL_REPORT_URL), 1);
    assert_eq!(fetcher.request_count(UNITED_REPORT_URL), 1);
    assert!(!fetcher.requests().iter().any(|u| u.contains("stathead")));

    let workbook = config
        .output
        .dir
        .join("Match-Reports/Manchester-City/Report-Matchday-1-Manchester-City-Arsenal");
    let players = fs::read_to_string(workbook.join("Manchester_City_Player.csv"))?;
    assert!(players.starts_with("Player,#,Nation,Pos,Min\n"));
    assert!(players.contains("Phil Foden,47,ENG,0,85"));
    assert!(!players.contains("Decoy Player"));

    let keeper = fs::read_to_string(workbook.join("Manchester_City_Goalkeeper.csv"))?;
    assert_eq!(keeper, "Player,Nation,Min\nEderson,BRA,90\n");
    assert!(workbook.join("Arsenal_Player.csv").exists());
    assert!(workbook.join("Arsenal_Goalkeeper.csv").exists());

    let fixtures_path = report.fixtures_path.expect("fixtures workbook");
    let fixtures = fs::read_to_string(fixtures_path.join("Fixtures.csv"))?;
    let lines: Vec<&str> = fixtures.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].ends_with(",Attendance,Match Report,Notes"));
    assert!(!lines[0].contains("Match Report.1"));
    assert!(lines[1].contains("Report-Matchday-1-Manchester-City-Arsenal"));
    assert!(lines[2].ends_with(",filtered,0"));
    assert!(lines[3].ends_with(",skipped,0"));
    assert!(lines[4].ends_with(",not played,0"));

    Ok(())
}

#[test]
fn team_run_reuses_cached_catalogs() -> Result<()> {
    let temp = tempdir()?;
    let config = test_config(temp.path());
    let fetcher = FixtureFetcher::site();
    let mut cache = CatalogCache::new(&config.cache.dir);
    let mut writer = MemoryWriter::default();

    let (first, second) = {
        let mut ctx = ScrapeContext::new(&config, &fetcher, &mut cache, &mut writer);
        let first = run_team_season(&mut ctx, &city_options())?;
        let second = run_team_season(&mut ctx, &city_options())?;
        (first, second)
    };

    assert_eq!(first.pages_fetched, 5);
    assert_eq!(second.pages_fetched, 3);

    assert_eq!(fetcher.request_count(common::COMPETITIONS_URL), 1);
    assert_eq!(fetcher.request_count(common::PREMIER_LEAGUE_URL), 1);
    assert_eq!(fetcher.request_count(SEASON_URL), 2);
    assert_eq!(fetcher.request_count(TEAM_URL), 2);
    Ok(())
}

#[test]
fn opponent_option_limits_reports_to_one_fixture() -> Result<()> {
    let temp = tempdir()?;
    let mut config = test_config(temp.path());
    // The served page only carries Arsenal tables.
    config.report.missing_tables = MissingTablePolicy::Skip;
    let mut fetcher = FixtureFetcher::site();
    fetcher.serve(UNITED_REPORT_URL, "match_report_arsenal.html");
    let mut cache = CatalogCache::new(&config.cache.dir);
    let mut writer = MemoryWriter::default();

    let options = TeamRunOptions {
        opponent: Some("Manchester Utd".to_string()),
        ..city_options()
    };
    let report = {
        let mut ctx = ScrapeContext::new(&config, &fetcher, &mut cache, &mut writer);
        run_team_season(&mut ctx, &options)?
    };

    let outcomes: Vec<(usize, &MatchOutcome)> = report
        .matches
        .iter()
        .map(|m| (m.match_number, &m.outcome))
        .collect();
    assert_eq!(outcomes[0], (1, &MatchOutcome::Filtered));
    assert_eq!(outcomes[1], (0, &MatchOutcome::Filtered));
    assert!(matches!(outcomes[2], (2, MatchOutcome::Saved { .. })));
    assert_eq!(outcomes[3], (3, &MatchOutcome::NotPlayed));
    assert_eq!(fetcher.request_count(ARSENAL_REPORT_URL), 0);
    Ok(())
}

#[test]
fn missing_report_tables_fail_the_run_by_default() -> Result<()> {
    let temp = tempdir()?;
    let config = test_config(temp.path());
    let mut fetcher = FixtureFetcher::site();
    fetcher.serve(ARSENAL_REPORT_URL, "premier_league_seasons.html");
    let mut cache = CatalogCache::new(&config.cache.dir);
    let mut writer = MemoryWriter::default();
    let mut ctx = ScrapeContext::new(&config, &fetcher, &mut cache, &mut writer);

    let err = run_team_season(&mut ctx, &city_options()).expect_err("tables are missing");
    assert!(format!("{err:#}").contains("Player Stats"));
    Ok(())
}

#[test]
fn missing_report_tables_leave_empty_sheets_when_skipping() -> Result<()> {
    let temp = tempdir()?;
    let mut config = test_config(temp.path());
    config.report.missing_tables = MissingTablePolicy::Skip;
    let mut fetcher = FixtureFetcher::site();
    fetcher.serve(ARSENAL_REPORT_URL, "premier_league_seasons.html");
    let mut cache = CatalogCache::new(&config.cache.dir);
    let mut writer = MemoryWriter::default();

    let report = {
        let mut ctx = ScrapeContext::new(&config, &fetcher, &mut cache, &mut writer);
        run_team_season(&mut ctx, &city_options())?
    };

    assert_eq!(report.saved(), 1);
    let names = writer.sheet_names();
    assert_eq!(
        names,
        vec![
            "Manchester City Player",
            "Manchester City Goalkeeper",
            "Arsenal Player",
            "Arsenal Goalkeeper",
            "Fixtures",
        ]
    );
    let empty = writer.sheet("Arsenal Player").expect("sheet");
    assert!(empty.is_empty());
    assert!(empty.columns().is_empty());
    Ok(())
}

#[test]
fn competition_filter_can_be_disabled() -> Result<()> {
    let temp = tempdir()?;
    let mut config = test_config(temp.path());
    config.report.filter_competition = false;
    let fetcher = FixtureFetcher::site();
    let mut cache = CatalogCache::new(&config.cache.dir);
    let mut writer = MemoryWriter::default();
    let mut ctx = ScrapeContext::new(&config, &fetcher, &mut cache, &mut writer);

    let report = run_team_season(&mut ctx, &city_options())?;

    assert!(!report.matches.iter().any(|m| m.outcome == MatchOutcome::Filtered));
    // Chelsea's report is not served, so it is skipped rather than filtered.
    assert_eq!(report.skipped(), 2);
    assert_eq!(report.unresolved.len(), 2);
    Ok(())
}

#[test]
fn unavailable_league_catalog_fails_the_run() -> Result<()> {
    let temp = tempdir()?;
    let config = test_config(temp.path());
    let fetcher = FixtureFetcher::empty();
    let mut cache = CatalogCache::new(&config.cache.dir);
    let mut writer = MemoryWriter::default();
    let mut ctx = ScrapeContext::new(&config, &fetcher, &mut cache, &mut writer);

    let err = run_team_season(&mut ctx, &city_options()).expect_err("no catalog");
    assert!(err.to_string().contains("no M league matches"));
    Ok(())
}

#[test]
fn leagues_resolve_through_aliases() -> Result<()> {
    let temp = tempdir()?;
    let config = test_config(temp.path());
    let fetcher = FixtureFetcher::site();
    let mut cache = CatalogCache::new(&config.cache.dir);
    let mut writer = MemoryWriter::default();
    let mut ctx = ScrapeContext::new(&config, &fetcher, &mut cache, &mut writer);

    let bundesliga = resolve_league(&mut ctx, "Fussball Bundesliga", Gender::M)?;
    assert_eq!(bundesliga.matched_key, "Bundesliga");
    assert_eq!(bundesliga.payload.name, "Fußball-Bundesliga");

    let korea = resolve_league(&mut ctx, "K League", Gender::M)?;
    assert_eq!(korea.payload.name, "K League 1");
    assert!(korea.score > 80.0);

    let second_tier = resolve_league(&mut ctx, "2. Bundesliga", Gender::M)?;
    assert_eq!(second_tier.payload.name, "2. Bundesliga");

    assert!(resolve_league(&mut ctx, "Women's Super League", Gender::M).is_err());
    let wsl = resolve_league(&mut ctx, "womens super league", Gender::F)?;
    assert_eq!(wsl.payload.gender, Gender::F);
    Ok(())
}

#[test]
fn competition_run_writes_every_captioned_table() -> Result<()> {
    let temp = tempdir()?;
    let config = test_config(temp.path());
    let fetcher = FixtureFetcher::site();
    let mut cache = CatalogCache::new(&config.cache.dir);
    let mut writer = MemoryWriter::default();

    let report = {
        let mut ctx = ScrapeContext::new(&config, &fetcher, &mut cache, &mut writer);
        scrape_competition_tables(
            &mut ctx,
            &CompetitionRunOptions {
                league: "Premier League".to_string(),
                season: "2023-24".to_string(),
                gender: Gender::M,
            },
        )?
    };

    assert_eq!(report.season, "2023-2024");
    assert_eq!(report.skipped_tables, 1);
    assert_eq!(
        report.sheets,
        vec!["Regular season Table", "Squad Standard Stats Table"]
    );

    let squads = writer.sheet("Squad Standard Stats Table").expect("sheet");
    assert_eq!(squads.columns(), ["Squad", "MP", "Min"]);
    assert_eq!(squads.value(2, "Min"), Some("0"));
    Ok(())
}
