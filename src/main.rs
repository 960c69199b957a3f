use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

mod canonical;
mod config;
mod error;
mod export;
mod filter;
mod metrics;
mod models;
mod pipeline;
mod ranking;
mod report;
mod segment;
mod source;

use config::AnalysisConfig;
use models::{Direction, MetricField, WindowPosition};
use source::SourceConfig;

#[derive(Parser)]
#[command(name = "rem-impact")]
#[command(about = "Balance growth and rate-reduction impact analysis for the interest-bearing account", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Cached daily observations (CSV)
    #[arg(long, default_value = config::DEFAULT_CACHE_FILE)]
    cache: PathBuf,
    /// Skip the cache and query the live source
    #[arg(long)]
    no_cache: bool,
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,
}

impl SourceArgs {
    fn to_config(&self) -> SourceConfig {
        SourceConfig {
            cache_path: (!self.no_cache).then(|| self.cache.clone()),
            database_url: self.database_url.clone(),
        }
    }
}

#[derive(Args)]
struct AnalysisArgs {
    /// Date the rate reduction took effect
    #[arg(long, env = "REM_CUTOFF_DATE", default_value_t = config::default_cutoff())]
    cutoff: NaiveDate,
    #[arg(long, default_value_t = 7)]
    radius_days: u32,
    #[arg(long, default_value_t = 10)]
    limit: usize,
    /// Multiplier applied to balance per monthly active user
    #[arg(long, default_value_t = metrics::DEFAULT_PER_MAU_SCALE)]
    per_mau_scale: f64,
}

impl AnalysisArgs {
    fn to_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            cutoff: self.cutoff,
            window_radius_days: self.radius_days,
            top_n: self.limit,
            per_mau_scale: self.per_mau_scale,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb {
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: String,
    },
    /// Upsert daily rows from a CSV file into the live source
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: String,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        analysis: AnalysisArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Compare growth before and after the cutoff
    Impact {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        analysis: AnalysisArgs,
        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rank days by a derived metric
    Top {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        analysis: AnalysisArgs,
        #[arg(long, value_enum, default_value_t = MetricField::BalanceDelta1d)]
        field: MetricField,
        #[arg(long, value_enum, default_value_t = Direction::Max)]
        direction: Direction,
    },
    /// Show the days surrounding an event date (defaults to the cutoff)
    Window {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        analysis: AnalysisArgs,
        #[arg(long)]
        at: Option<NaiveDate>,
    },
    /// Export a date range of the enriched series as CSV
    Export {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        analysis: AnalysisArgs,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb { database_url } => {
            let pool = source::connect(&database_url)
                .await
                .context("failed to connect to Postgres")?;
            source::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import { csv, database_url } => {
            let pool = source::connect(&database_url)
                .await
                .context("failed to connect to Postgres")?;
            let upserted = source::import_csv(&pool, &csv).await?;
            println!("Upserted {upserted} daily rows from {}.", csv.display());
        }
        Commands::Report {
            source,
            analysis,
            out,
        } => {
            let config = analysis.to_config();
            let series = pipeline::load_series(&source.to_config(), &config).await?;
            let report = report::build_report(&series, &config);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Impact {
            source,
            analysis,
            json,
        } => {
            let config = analysis.to_config();
            let series = pipeline::load_series(&source.to_config(), &config).await?;
            let result = segment::analyze_impact(&series, config.cutoff);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            for (label, summary) in [("Before", &result.before), ("After", &result.after)] {
                match summary {
                    Some(summary) => println!(
                        "{label}: {} days, balance {:.0} -> {:.0}, growth {}%, velocity {}/day ({}%/day)",
                        summary.count,
                        summary.first_balance,
                        summary.last_balance,
                        report::fmt_opt(summary.total_growth_pct, 2, ""),
                        report::fmt_opt(summary.mean_delta_1d, 2, ""),
                        report::fmt_opt(summary.mean_pct_change_1d, 2, "")
                    ),
                    None => println!("{label}: no observations."),
                }
            }

            match result.impact {
                Some(impact) => println!(
                    "Velocity change {}/day ({}%), growth rate change {} pp",
                    report::fmt_opt(impact.velocity_change_abs, 2, ""),
                    report::fmt_opt(impact.velocity_change_rel_pct, 2, ""),
                    report::fmt_opt(impact.growth_rate_change_pp, 2, "")
                ),
                None => println!("Impact not yet measurable for cutoff {}.", result.cutoff),
            }
        }
        Commands::Top {
            source,
            analysis,
            field,
            direction,
        } => {
            let config = analysis.to_config();
            let series = pipeline::load_series(&source.to_config(), &config).await?;
            let ranked = ranking::top_n_by(&series, field, config.top_n, direction);

            if ranked.is_empty() {
                println!("No defined values for this metric.");
                return Ok(());
            }

            for observation in ranked {
                println!(
                    "- {}: {} (balance {:.0})",
                    observation.date,
                    report::fmt_opt(observation.value(field), 2, ""),
                    observation.balance
                );
            }
        }
        Commands::Window {
            source,
            analysis,
            at,
        } => {
            let config = analysis.to_config();
            let series = pipeline::load_series(&source.to_config(), &config).await?;
            let center = at.unwrap_or(config.cutoff);
            let window = ranking::window_around(&series, center, config.window_radius_days);

            if window.is_empty() {
                println!("No observations within {} days of {center}.", config.window_radius_days);
                return Ok(());
            }

            for entry in window {
                let marker = match entry.position {
                    WindowPosition::Before => "before",
                    WindowPosition::At => "at",
                    WindowPosition::After => "after",
                };
                println!(
                    "- {} [{marker}] balance {:.0}, change {} ({}%)",
                    entry.observation.date,
                    entry.observation.balance,
                    report::fmt_opt(entry.observation.balance_delta_1d, 2, ""),
                    report::fmt_opt(entry.observation.balance_pct_change_1d, 2, "")
                );
            }
        }
        Commands::Export {
            source,
            analysis,
            from,
            to,
            out,
        } => {
            let config = analysis.to_config();
            let series = pipeline::load_series(&source.to_config(), &config).await?;
            let (Some(first), Some(last)) = (series.first(), series.last()) else {
                println!("No observations to export.");
                return Ok(());
            };

            let start = from.unwrap_or(first.date);
            let end = to.unwrap_or(last.date);
            let out = out.unwrap_or_else(|| PathBuf::from(export::default_file_name(start, end)));
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            let written = export::write_csv(filter::slice(&series, start, end), file)?;
            if written == 0 {
                println!("No observations in range; wrote header only to {}.", out.display());
            } else {
                println!("Exported {written} rows to {}.", out.display());
            }
        }
    }

    Ok(())
}
