use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod gateway;
mod models;
mod report;
mod session;
mod snapshot;
mod stats;

use gateway::{load_snapshot, RestGateway, SnapshotGateway};
use models::DashboardSummary;
use session::{Role, Session};
use stats::{DashboardOptions, WeekOrder};

#[derive(Parser)]
#[command(name = "hospital-insights")]
#[command(about = "Dashboard statistics for the hospital management backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("source")
        .args(["api_url", "snapshot"])
        .required(true)
        .multiple(false)
))]
struct SourceArgs {
    /// Base URL of the REST backend
    #[arg(long, env = "HMS_API_URL")]
    api_url: Option<String>,
    /// Read records from a snapshot directory instead of the backend
    #[arg(long)]
    snapshot: Option<PathBuf>,
    #[arg(long, env = "HMS_API_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,
    /// doctor, staff, manager or customer
    #[arg(long, default_value = "manager")]
    role: Role,
    #[arg(long, env = "HMS_USER_ID")]
    user_id: Option<String>,
    #[arg(long, env = "HMS_API_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Args)]
struct DashboardArgs {
    #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(i64).range(1..=3660))]
    window_days: i64,
    #[arg(long, default_value_t = 5)]
    top: usize,
    #[arg(long, value_delimiter = ',', default_values_t = stats::DEFAULT_AGE_BREAKPOINTS)]
    age_breakpoints: Vec<u32>,
    /// Order weekdays as the last seven days instead of Sun..Sat
    #[arg(long)]
    rolling: bool,
}

impl DashboardArgs {
    fn options(&self) -> DashboardOptions {
        DashboardOptions {
            window_days: self.window_days,
            top: self.top,
            age_breakpoints: self.age_breakpoints.clone(),
            week_order: if self.rolling {
                WeekOrder::Rolling
            } else {
                WeekOrder::Canonical
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a demo snapshot directory
    Seed {
        #[arg(long, default_value = "snapshot")]
        dir: PathBuf,
    },
    /// Import appointments from a CSV export into a snapshot directory
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "snapshot")]
        dir: PathBuf,
    },
    /// Print the dashboard summary
    Summary {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        dashboard: DashboardArgs,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        dashboard: DashboardArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Write the dashboard view-models as JSON
    Export {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        dashboard: DashboardArgs,
        #[arg(long, default_value = "dashboard.json")]
        out: PathBuf,
    },
}

async fn load_dashboard(
    source: &SourceArgs,
    dashboard: &DashboardArgs,
    today: NaiveDate,
) -> anyhow::Result<(Session, DashboardSummary)> {
    let session = Session::login(source.role, source.user_id.clone(), source.token.clone())?;

    let snapshot = match (&source.snapshot, &source.api_url) {
        (Some(dir), _) => load_snapshot(&SnapshotGateway::new(dir))
            .await
            .with_context(|| format!("failed to read snapshot from {}", dir.display()))?,
        (None, Some(url)) => {
            let gateway = RestGateway::new(url, source.timeout_secs, &session)?;
            load_snapshot(&gateway)
                .await
                .with_context(|| {
                    format!("failed to load dashboard data from {}", gateway.base_url())
                })?
        }
        (None, None) => anyhow::bail!("either --api-url or --snapshot must be given"),
    };

    let scoped = session.scope(snapshot);
    let summary = stats::build_dashboard(&scoped, today, &dashboard.options());
    Ok((session, summary))
}

fn print_summary(scope: &str, summary: &DashboardSummary) {
    println!(
        "Dashboard for {}: {} appointments ({} today, {} upcoming), {} patients",
        scope,
        summary.total_appointments,
        summary.appointments_today,
        summary.upcoming_appointments,
        summary.distinct_patients
    );

    let week: Vec<String> = summary
        .weekly
        .iter()
        .map(|day| format!("{} {}", day.label, day.count))
        .collect();
    println!("This week: {}", week.join(", "));

    println!("Statuses:");
    for status in summary.statuses.iter() {
        println!("- {} {} ({}%)", status.name, status.count, status.percentage);
    }

    println!("Top reasons:");
    for reason in summary.top_reasons.iter() {
        println!("- {} ({})", reason.label, reason.count);
    }

    println!("Peak hours:");
    for peak in summary.peak_hours.iter() {
        println!("- {:02}:00 {} [{}]", peak.hour, peak.count, peak.tier.name());
    }

    println!("Patient ages:");
    for bucket in summary.ages.iter() {
        println!("- {} {} ({}%)", bucket.range, bucket.count, bucket.percentage);
    }

    let ratings = &summary.ratings;
    println!(
        "Ratings: doctor {:.1}, overall {:.1} across {} reviews ({} pending)",
        ratings.average_doctor_rating,
        ratings.average_overall_rating,
        ratings.total_comments,
        ratings.pending_feedback
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Seed { dir } => {
            let seeded = snapshot::write_seed_snapshot(&dir, today)
                .with_context(|| format!("failed to seed {}", dir.display()))?;
            println!(
                "Seed snapshot written to {} ({} appointments, {} patients, {} comments).",
                dir.display(),
                seeded.appointments.len(),
                seeded.patients.len(),
                seeded.comments.len()
            );
        }
        Commands::Import { csv, dir } => {
            let inserted = snapshot::import_appointments_csv(&csv, &dir)
                .with_context(|| format!("failed to import {}", csv.display()))?;
            println!("Inserted {inserted} appointments from {}.", csv.display());
        }
        Commands::Summary { source, dashboard } => {
            let (session, summary) = load_dashboard(&source, &dashboard, today).await?;
            print_summary(&session.scope_label(), &summary);
            session.logout();
        }
        Commands::Report {
            source,
            dashboard,
            out,
        } => {
            let (session, summary) = load_dashboard(&source, &dashboard, today).await?;
            let report = report::build_report(
                &session.scope_label(),
                today,
                dashboard.window_days,
                &summary,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
            session.logout();
        }
        Commands::Export {
            source,
            dashboard,
            out,
        } => {
            let (session, summary) = load_dashboard(&source, &dashboard, today).await?;
            let json = serde_json::to_string_pretty(&summary)?;
            std::fs::write(&out, json)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Dashboard exported to {}.", out.display());
            session.logout();
        }
    }

    Ok(())
}
