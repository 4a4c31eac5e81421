use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use performance_metrics::classifier::{analyze_company_performance, CompanyPerformanceInput};
use performance_metrics::config::Config;
use performance_metrics::db;
use performance_metrics::goals::compute_goal_achievement;
use performance_metrics::models::{Employee, ReviewCycle};
use performance_metrics::outliers::detect_department_outliers_with;
use performance_metrics::report;
use performance_metrics::scoring::{build_trend, compute_final_score};
use performance_metrics::store::Snapshot;

#[derive(Parser)]
#[command(name = "performance-metrics")]
#[command(about = "Review scoring, trends and outlier detection for TechCorp", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Bulk import reviews from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Submit a draft review once all four criteria are scored
    Submit {
        #[arg(long)]
        review: Uuid,
    },
    /// Weighted final score for an employee in a cycle
    Score {
        #[arg(long)]
        email: String,
        #[arg(long)]
        cycle: String,
    },
    /// Final scores across the most recent cycles
    Trend {
        #[arg(long)]
        email: String,
        #[arg(long)]
        cycles: Option<usize>,
    },
    /// Employees far from their department's mean score
    Outliers {
        #[arg(long)]
        department: String,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Goal completion for an employee in a cycle
    Goals {
        #[arg(long)]
        email: String,
        #[arg(long)]
        cycle: String,
    },
    /// Classify high performers and at-risk employees from quarterly JSON
    Classify {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Count active employees in a department
    DepartmentSummary {
        #[arg(long)]
        department: String,
    },
    /// Generate a markdown department report
    Report {
        #[arg(long)]
        department: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

fn employee<'a>(snapshot: &'a Snapshot, email: &str) -> anyhow::Result<&'a Employee> {
    snapshot
        .find_employee_by_email(email)
        .with_context(|| format!("no active employee with email {email}"))
}

fn cycle<'a>(snapshot: &'a Snapshot, name: &str) -> anyhow::Result<&'a ReviewCycle> {
    snapshot
        .find_cycle_by_name(name)
        .with_context(|| format!("no review cycle named {name}"))
}

fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "insufficient data".to_string(), |value| format!("{value:.2}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(&config).await?;
            let summary = db::import_csv(&pool, &csv).await?;
            println!(
                "Inserted {} reviews from {} ({} duplicates, {} rejected).",
                summary.inserted,
                csv.display(),
                summary.duplicates,
                summary.rejected
            );
        }
        Commands::Submit { review } => {
            let pool = connect(&config).await?;
            let submitted_at = db::submit_review(&pool, review).await?;
            println!("Review {review} submitted at {submitted_at}.");
        }
        Commands::Score { email, cycle: name } => {
            let snapshot = db::load_snapshot(&connect(&config).await?).await?;
            let employee = employee(&snapshot, &email)?;
            let cycle = cycle(&snapshot, &name)?;
            let score = compute_final_score(&snapshot, employee.id, cycle.id);
            println!(
                "{} ({}) {}: final score {}",
                employee.name,
                employee.department,
                cycle.name,
                format_score(score)
            );
        }
        Commands::Trend { email, cycles } => {
            let snapshot = db::load_snapshot(&connect(&config).await?).await?;
            let config = config.with_overrides(cycles, None)?;
            let employee = employee(&snapshot, &email)?;
            let trend = build_trend(&snapshot, employee.id, config.trend_cycles);

            if trend.is_empty() {
                println!("No review cycles recorded.");
                return Ok(());
            }

            println!("Performance trend for {}:", employee.name);
            for point in &trend {
                println!("- {}: {}", point.cycle, format_score(point.final_score));
            }
        }
        Commands::Outliers {
            department,
            threshold,
        } => {
            let snapshot = db::load_snapshot(&connect(&config).await?).await?;
            let threshold = config.with_overrides(None, threshold)?.outlier_threshold;
            let outliers = detect_department_outliers_with(&snapshot, &department, threshold)?;

            if outliers.is_empty() {
                println!("No outliers found in {department}.");
                return Ok(());
            }

            println!("Outliers in {department} (|z| > {threshold}):");
            for outlier in &outliers {
                println!(
                    "- {} score {:.2} z {:+.2} (dept avg {:.2}, std {:.2})",
                    outlier.name,
                    outlier.final_score,
                    outlier.zscore,
                    outlier.department_avg,
                    outlier.department_std
                );
            }
        }
        Commands::Goals { email, cycle: name } => {
            let snapshot = db::load_snapshot(&connect(&config).await?).await?;
            let employee = employee(&snapshot, &email)?;
            let cycle = cycle(&snapshot, &name)?;
            let goals = compute_goal_achievement(&snapshot, employee.id, cycle.id);

            match (goals.completion_rate, goals.weighted_goal_score) {
                (Some(rate), Some(score)) => println!(
                    "{} {}: {}/{} goals complete (rate {:.3}), goal score {:.2}",
                    employee.name, cycle.name, goals.completed, goals.total_goals, rate, score
                ),
                _ => println!("{} has no goals in {}.", employee.name, cycle.name),
            }
        }
        Commands::Classify { input, out } => {
            let raw = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let data: CompanyPerformanceInput = serde_json::from_str(&raw)
                .with_context(|| format!("invalid classifier input in {}", input.display()))?;
            let analysis = analyze_company_performance(&data);
            info!(
                high_performers = analysis.high_performers.len(),
                at_risk = analysis.at_risk.len(),
                "classification finished"
            );

            let json = serde_json::to_string_pretty(&analysis)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Classification written to {}.", path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::DepartmentSummary { department } => {
            let snapshot = db::load_snapshot(&connect(&config).await?).await?;
            let summary = report::summarize_department(&snapshot, &department);
            println!(
                "{}: {} active employees",
                summary.department, summary.total_employees
            );
        }
        Commands::Report { department, out } => {
            let snapshot = db::load_snapshot(&connect(&config).await?).await?;
            let report = report::build_report(
                &snapshot,
                &department,
                config.trend_cycles,
                config.outlier_threshold,
            )?;
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
