use anyhow::Result;
use clap::{Parser, Subcommand};
use fbscrape::catalog::CatalogCache;
use fbscrape::config::load_config;
use fbscrape::fetch::HttpFetcher;
use fbscrape::model::Gender;
use fbscrape::pipeline::{
    CompetitionRunOptions, ScrapeContext, TeamRunOptions, list_leagues, run_team_season,
    scrape_competition_tables,
};
use fbscrape::sheet::CsvWorkbookWriter;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fbscrape", about = "Football statistics scraper with fuzzy name resolution")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fixtures and per-match player tables for one team season.
    Team {
        #[arg(long)]
        league: String,
        #[arg(long)]
        team: String,
        #[arg(long)]
        season: String,
        #[arg(long, default_value = "M")]
        gender: Gender,
        /// Only save reports for matches against this opponent.
        #[arg(long)]
        opponent: Option<String>,
    },
    /// Every captioned table of one league season.
    Competition {
        #[arg(long)]
        league: String,
        #[arg(long)]
        season: String,
        #[arg(long, default_value = "M")]
        gender: Gender,
    },
    /// Competitions known to the league catalog.
    Leagues {
        #[arg(long, default_value = "M")]
        gender: Gender,
    },
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let fetcher = HttpFetcher::new(&config.fetch)?;
    let mut cache = CatalogCache::new(&config.cache.dir);
    let mut writer = CsvWorkbookWriter;
    let mut ctx = ScrapeContext::new(&config, &fetcher, &mut cache, &mut writer);

    match cli.command {
        Commands::Team {
            league,
            team,
            season,
            gender,
            opponent,
        } => {
            let report = run_team_season(
                &mut ctx,
                &TeamRunOptions {
                    league,
                    season,
                    team,
                    gender,
                    opponent,
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Competition {
            league,
            season,
            gender,
        } => {
            let report = scrape_competition_tables(
                &mut ctx,
                &CompetitionRunOptions {
                    league,
                    season,
                    gender,
                },
            )?;
            info!(workbook = %report.workbook.display(), sheets = report.sheets.len(), "competition run complete");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Leagues { gender } => {
            for entry in list_leagues(&mut ctx, gender)? {
                println!("{}\t{}", entry.name, entry.url);
            }
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}
