mod calculations;
mod config;
mod loader;
mod models;
mod pipeline;
mod report;
mod screening;
mod source;
mod statements;
mod storage;
mod utils;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::calculations::PeerAverages;
use crate::config::{AppConfig, SourceKind};
use crate::loader::LocalSource;
use crate::models::FILTER_COUNT;
use crate::pipeline::Pipeline;
use crate::screening::filters::MARKET_PE_FALLBACK;
use crate::screening::top_n;
use crate::source::{CachedSource, DataSource, RemoteSource};
use crate::storage::{Cache, CacheKey};

#[derive(Parser)]
#[command(name = "nordic-screener", about = "Value screen for Oslo, Stockholm and Copenhagen listings", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Screen the selected exchanges and print the ranked results
    Scan {
        /// Exchange to screen (repeatable); all configured exchanges if omitted
        #[arg(short, long = "exchange")]
        exchanges: Vec<String>,

        /// Minimum number of criteria a company must pass (1-8)
        #[arg(short, long)]
        min_filters: Option<usize>,

        /// Rows to show in the table
        #[arg(short = 'n', long, default_value_t = 25)]
        top: usize,

        /// Clear cached lists and statements before fetching
        #[arg(long)]
        no_cache: bool,

        /// Write every result with filter reasons to this CSV file
        #[arg(long)]
        export: Option<PathBuf>,

        /// Write the CSV export to a timestamped file in the output directory
        #[arg(long, conflicts_with = "export")]
        csv: bool,
    },

    /// Show the screening criteria and configured exchanges
    Info,

    /// Show peer PE medians from the last scan
    Averages,

    /// Show cache contents and recent runs
    Stats,

    /// Remove every cached entry
    ClearCache,

    /// Apply schema migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "nordic_screener=info,warn",
        1 => "nordic_screener=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Scan {
            exchanges,
            min_filters,
            top,
            no_cache,
            export,
            csv,
        } => {
            let min_filters = min_filters.unwrap_or(config.screening.min_filters);
            if !(1..=FILTER_COUNT).contains(&min_filters) {
                bail!("--min-filters must be between 1 and {}", FILTER_COUNT);
            }

            let selected = config.select_exchanges(&exchanges);
            if selected.is_empty() {
                let known: Vec<&str> = config.exchanges.keys().map(String::as_str).collect();
                bail!("No known exchange in {:?}; choose from {}", exchanges, known.join(", "));
            }

            let cache = Arc::new(open_cache(&config)?);
            if no_cache {
                let n = cache.clear()?;
                info!("Cleared {} cached entries", n);
            }

            let _t = utils::Timer::start("Screening run");
            let source = build_source(&config, Arc::clone(&cache))?;
            let output_dir = config.output.dir.clone();
            let outcome = Pipeline::new(config, source)
                .with_cache(cache)
                .run(&selected, min_filters)
                .await?;

            report::print_table(&outcome, &top_n(&outcome.results, top));

            let export = export.or_else(|| csv.then(|| report::default_export_path(&output_dir)));
            if let Some(path) = export {
                report::export_csv(&outcome.results, &path)?;
                println!("Results written to {}", path.display());
            }
        }

        Command::Info => {
            let t = &config.screening;
            println!("─────────────────────────────────────────────");
            println!("  Screening criteria");
            println!("─────────────────────────────────────────────");
            println!("  1. PE below industry median (fallback {:.0})", MARKET_PE_FALLBACK);
            println!("  2. ROIC >= {:.0}% in {} of the last {} years", t.min_roic * 100.0, t.roic_years, t.roic_history_years);
            println!("  3. Revenue growth {} consecutive years", t.growth_years);
            println!("  4. Earnings growth {} consecutive years", t.growth_years);
            println!("  5. Debt/equity below {}", t.max_debt_to_equity);
            println!("  6. Positive TTM free cash flow");
            println!("  7. Cash flow yield >= {:.0}%", t.min_cf_yield * 100.0);
            println!("  8. Positive TTM earnings");
            println!("  Pass gate : {} of {}", t.min_filters, FILTER_COUNT);
            println!("  Max PE    : {} (reference)", t.max_pe);
            println!("─────────────────────────────────────────────");
            println!("  Exchanges");
            println!("─────────────────────────────────────────────");
            for (key, ex) in &config.exchanges {
                println!("  {:<11} {:<20} suffix {}", key, ex.name, ex.suffix);
            }
            println!("─────────────────────────────────────────────");
        }

        Command::Averages => {
            let cache = open_cache(&config)?;
            match cache.get::<PeerAverages>(&CacheKey::IndustryAverages)? {
                None => println!("No industry averages cached. Run `nordic-screener scan` first."),
                Some(peers) => {
                    println!("Industry PE medians ({}):", peers.industry.len());
                    for (industry, pe) in &peers.industry {
                        println!("  {:<45} {:>6.1}", industry, pe);
                    }
                    println!("Sector PE medians ({}):", peers.sector.len());
                    for (sector, pe) in &peers.sector {
                        println!("  {:<45} {:>6.1}", sector, pe);
                    }
                }
            }
        }

        Command::Stats => {
            let cache = open_cache(&config)?;
            let total = cache.entry_count()?;
            println!("─────────────────────────────────");
            println!("  Nordic screener — Cache Stats");
            println!("─────────────────────────────────");
            println!("  Live entries : {}", utils::fmt_number(total));
            for (namespace, n) in cache.namespace_counts()? {
                println!("    {:<10} : {}", namespace, utils::fmt_number(n));
            }
            println!("  TTL          : {}h", config.cache.ttl_hours);
            println!("─────────────────────────────────");
            let runs = cache.recent_runs(5)?;
            if runs.is_empty() {
                println!("  No runs yet.");
            }
            for run in runs {
                println!(
                    "  #{:<4} {}  {:<8} {:<28} {} / {} passed, {} errors",
                    run.id,
                    run.started_at.format("%Y-%m-%d %H:%M"),
                    run.status,
                    run.exchanges,
                    run.companies_passed,
                    run.companies_considered,
                    run.errors
                );
            }
            println!("─────────────────────────────────");
        }

        Command::ClearCache => {
            let n = open_cache(&config)?.clear()?;
            println!("Removed {} cached entries.", n);
        }

        Command::Migrate => {
            Cache::open(&config.cache.db_path, config.cache.ttl_hours)?.run_migrations()?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}

fn open_cache(config: &AppConfig) -> Result<Cache> {
    let cache = Cache::open(&config.cache.db_path, config.cache.ttl_hours)
        .context("Failed to open cache")?;
    if config.cache.run_migrations {
        cache.run_migrations()?;
    }
    let purged = cache.purge_expired()?;
    if purged > 0 {
        info!("Purged {} expired cache entries", purged);
    }
    Ok(cache)
}

fn build_source(config: &AppConfig, cache: Arc<Cache>) -> Result<Arc<dyn DataSource>> {
    let source: Arc<dyn DataSource> = match config.fetch.source {
        SourceKind::Remote => Arc::new(CachedSource::new(RemoteSource::new(&config.fetch)?, cache)),
        SourceKind::Local => {
            info!("Reading local data from {:?}", config.fetch.data_dir);
            Arc::new(CachedSource::new(LocalSource::new(config.fetch.data_dir.clone()), cache))
        }
    };
    Ok(source)
}
