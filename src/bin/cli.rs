//! goalcrawler CLI
//!
//! Local execution entry point: discover categories, crawl matches, build reports.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use goalcrawler::{
    error::{AppError, Result},
    models::{CategoryNode, Config, Horizon, ScoreMetric, TrimPolicy},
    pipeline,
    services::{PageFetcher, ResilientFetcher},
    storage::{LocalStorage, ResultStorage},
};
use tokio_util::sync::CancellationToken;

/// goalcrawler - football results crawler and goal timeline reports
#[derive(Parser, Debug)]
#[command(
    name = "goalcrawler",
    version,
    about = "Crawl match timelines and build range-bucketed goal reports"
)]
struct Cli {
    /// Path to storage directory for results
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Configuration file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover the country / league / season tree
    #[cfg(feature = "map")]
    Map {
        /// Force regenerate even if categories.json exists
        #[arg(long)]
        force: bool,
    },

    /// Crawl matches below the selected categories
    Crawl {
        /// Category path such as "England > Premier League > 2023/2024";
        /// repeat for several, omit to crawl everything
        #[arg(long = "select", value_name = "PATH")]
        select: Vec<String>,
    },

    /// Build the report from stored matches
    Report {
        #[arg(long)]
        minutes: Option<String>,
        #[arg(long)]
        totals: Option<String>,
        #[arg(long)]
        differentials: Option<String>,
        #[arg(long, value_enum)]
        metric: Option<MetricArg>,
        #[arg(long, value_enum)]
        horizon: Option<HorizonArg>,
        /// Share of minute-45 matches dropped with the half-time horizon
        #[arg(long, value_enum)]
        half_time_trim: Option<TrimArg>,
        /// Share of minute-90 matches dropped with the full-time horizon
        #[arg(long, value_enum)]
        full_time_trim: Option<TrimArg>,
    },

    /// Validate configuration file
    Validate,

    /// Show stored artefact info
    Info,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MetricArg {
    Total,
    Differential,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum HorizonArg {
    HalfTime,
    FullTime,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TrimArg {
    None,
    Half,
    All,
}

impl From<MetricArg> for ScoreMetric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Total => Self::Total,
            MetricArg::Differential => Self::Differential,
        }
    }
}

impl From<HorizonArg> for Horizon {
    fn from(arg: HorizonArg) -> Self {
        match arg {
            HorizonArg::HalfTime => Self::HalfTime,
            HorizonArg::FullTime => Self::FullTime,
        }
    }
}

impl From<TrimArg> for TrimPolicy {
    fn from(arg: TrimArg) -> Self {
        match arg {
            TrimArg::None => Self::None,
            TrimArg::Half => Self::Half,
            TrimArg::All => Self::All,
        }
    }
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Validated config plus a fetcher built from it.
fn build_fetcher(config: &Config) -> Result<Arc<dyn PageFetcher>> {
    config.validate()?;
    Ok(Arc::new(ResilientFetcher::from_config(config)?))
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping...");
            token.cancel();
        }
    });
}

/// Split "A > B > C" into labels. A selection starting below the group level
/// ("England > Premier League") is rooted under the group holding that country.
fn parse_selection(raw: &str, roots: &[CategoryNode]) -> Vec<String> {
    let mut labels: Vec<String> = raw
        .split('>')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let Some(first) = labels.first() else {
        return labels;
    };
    if roots.iter().any(|r| r.label.eq_ignore_ascii_case(first)) {
        return labels;
    }
    let owner = roots.iter().find(|r| {
        r.children
            .iter()
            .any(|c| c.label.eq_ignore_ascii_case(first))
    });
    if let Some(root) = owner {
        labels.insert(0, root.label.clone());
    }
    labels
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("goalcrawler starting...");

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.storage_dir.join("config.toml"));
    let config = Config::load_or_default(&config_path);
    log::info!("Loaded configuration from {}", config_path.display());

    let config = Arc::new(config);
    let storage = LocalStorage::new(&cli.storage_dir);
    let token = CancellationToken::new();

    match cli.command {
        #[cfg(feature = "map")]
        Command::Map { force } => {
            if storage.exists("categories.json") && !force {
                log::warn!(
                    "Categories already exist in {}. Use --force to overwrite.",
                    cli.storage_dir.display()
                );
                return Ok(());
            }

            let fetcher = build_fetcher(&config)?;
            cancel_on_ctrl_c(&token);
            let roots = pipeline::run_mapper(&config, fetcher, &token).await?;

            let written = storage.save_categories(&roots).await?;
            log::info!(
                "Saved {} leaf categories to {}",
                written.count,
                written.location
            );
        }

        Command::Crawl { select } => {
            let Some(roots) = storage.load_categories().await? else {
                log::error!(
                    "No categories in {}. Run 'map' first.",
                    cli.storage_dir.display()
                );
                return Err(AppError::config("categories.json not found"));
            };

            let selections: Vec<Vec<String>> = select
                .iter()
                .map(|raw| parse_selection(raw, &roots))
                .collect();

            let fetcher = build_fetcher(&config)?;
            cancel_on_ctrl_c(&token);
            pipeline::run_crawler(
                Arc::clone(&config),
                &storage,
                &roots,
                &selections,
                fetcher,
                &token,
            )
            .await?;
        }

        Command::Report {
            minutes,
            totals,
            differentials,
            metric,
            horizon,
            half_time_trim,
            full_time_trim,
        } => {
            let mut config = (*config).clone();
            if let Some(minutes) = minutes {
                config.filter.minutes = minutes;
            }
            if let Some(totals) = totals {
                config.filter.totals = totals;
            }
            if let Some(differentials) = differentials {
                config.filter.differentials = differentials;
            }
            if let Some(metric) = metric {
                config.report.metric = metric.into();
            }
            if let Some(horizon) = horizon {
                config.report.horizon = horizon.into();
            }
            if let Some(trim) = half_time_trim {
                config.report.half_time_trim = trim.into();
            }
            if let Some(trim) = full_time_trim {
                config.report.full_time_trim = trim.into();
            }

            let rows = pipeline::run_report(&config, &storage).await?;
            log::info!("Report written with {} rows", rows.len());
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            goalcrawler::services::MatchPageParser::new(&config.site.selectors)?;
            goalcrawler::services::ListingPageParser::new(&config.site.selectors)?;
            log::info!("✓ Site selectors compile");

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());

            match storage.load_categories().await? {
                Some(roots) => log::info!(
                    "Categories: {} leaves",
                    roots.iter().map(CategoryNode::leaf_count).sum::<usize>()
                ),
                None => log::info!("Categories: not found"),
            }

            let matches = storage.load_matches().await?;
            let no_info = storage.load_no_info().await?;
            log::info!("Matches: {}", matches.len());
            log::info!("No information: {}", no_info.len());
            log::info!(
                "Report: {}",
                if storage.exists("report.tsv") {
                    "exists"
                } else {
                    "not found"
                }
            );
        }
    }

    log::info!("Done!");

    Ok(())
}
