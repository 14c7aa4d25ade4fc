use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod crm;
mod db;
mod metrics;
mod models;
mod report;

use crm::FubClient;
use metrics::DashboardType;

#[derive(Parser)]
#[command(name = "fub-analytics")]
#[command(about = "Appointment outcome analytics for Follow Up Boss teams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Aggregate appointment metrics for a date range
    Metrics {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        user_id: Option<i64>,
        #[arg(long, value_enum, default_value = "sales")]
        dashboard: DashboardType,
    },
    /// Compare aggregated metrics across two periods
    Compare {
        #[arg(long)]
        period1_start: NaiveDate,
        #[arg(long)]
        period1_end: NaiveDate,
        #[arg(long)]
        period2_start: NaiveDate,
        #[arg(long)]
        period2_end: NaiveDate,
        #[arg(long)]
        user_id: Option<i64>,
        #[arg(long, value_enum, default_value = "sales")]
        dashboard: DashboardType,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        user_id: Option<i64>,
        #[arg(long, value_enum, default_value = "sales")]
        dashboard: DashboardType,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// List past appointments with no outcome, remote or local
    Pending {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// List locally tracked outcome overrides
    Outcomes,
    /// Show the local outcome for one appointment
    Outcome {
        #[arg(long)]
        appointment: i64,
    },
    /// List the remote appointment outcome catalog
    OutcomeTypes,
    /// List the remote appointment type catalog
    AppointmentTypes,
    /// Record a local outcome for an appointment
    SetOutcome {
        #[arg(long)]
        appointment: i64,
        #[arg(long)]
        outcome_id: i64,
        #[arg(long)]
        outcome_name: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        updated_by: Option<String>,
    },
    /// Remove a local outcome, reverting to the remote value
    ClearOutcome {
        #[arg(long)]
        appointment: i64,
    },
    /// Import outcome overrides from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Outcome tracking statistics
    Stats,
    /// Show or replace the ISA user designation set
    IsaUsers {
        #[arg(long, value_delimiter = ',')]
        set: Option<Vec<i64>>,
    },
}

fn fub_client() -> anyhow::Result<FubClient> {
    let api_key = std::env::var("FUB_API_KEY")
        .context("FUB_API_KEY must be set to a Follow Up Boss API key")?;
    let base_url = std::env::var("FUB_API_BASE_URL").ok();
    Ok(FubClient::new(api_key, base_url))
}

/// Default to the last 30 days when the caller gives no complete range.
fn resolve_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> (NaiveDate, NaiveDate) {
    match (start, end) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            let end = Utc::now().date_naive();
            (end - Duration::days(30), end)
        }
    }
}

/// Fetch, merge local overrides, and aggregate one reporting period.
async fn gather_metrics(
    client: &FubClient,
    pool: &PgPool,
    start: NaiveDate,
    end: NaiveDate,
    user_id: Option<i64>,
    dashboard: DashboardType,
) -> anyhow::Result<metrics::MetricsReport> {
    let (mut appointments, users) = tokio::try_join!(
        client.appointments(start, end, user_id),
        client.users()
    )?;

    let ids: Vec<i64> = appointments.iter().map(|apt| apt.id).collect();
    let overrides = db::outcomes_for_appointments(pool, &ids).await?;
    let merged = metrics::merge_overrides(&mut appointments, &overrides);
    tracing::debug!(
        appointments = appointments.len(),
        overrides = merged,
        "merged local outcomes"
    );

    let isa_ids: HashSet<i64> = db::isa_user_ids(pool).await?.into_iter().collect();
    Ok(metrics::aggregate(
        &appointments,
        &users,
        dashboard,
        &isa_ids,
        start,
        end,
    ))
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
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Metrics {
            start,
            end,
            user_id,
            dashboard,
        } => {
            let client = fub_client()?;
            let (start, end) = resolve_date_range(start, end);
            let metrics = gather_metrics(&client, &pool, start, end, user_id, dashboard).await?;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
        Commands::Compare {
            period1_start,
            period1_end,
            period2_start,
            period2_end,
            user_id,
            dashboard,
        } => {
            let client = fub_client()?;
            let period1 =
                gather_metrics(&client, &pool, period1_start, period1_end, user_id, dashboard)
                    .await?;
            let period2 =
                gather_metrics(&client, &pool, period2_start, period2_end, user_id, dashboard)
                    .await?;
            let comparison = metrics::compare(period1, period2);
            println!("{}", serde_json::to_string_pretty(&comparison)?);
        }
        Commands::Report {
            start,
            end,
            user_id,
            dashboard,
            out,
        } => {
            let client = fub_client()?;
            let (start, end) = resolve_date_range(start, end);
            let metrics = gather_metrics(&client, &pool, start, end, user_id, dashboard).await?;
            let rendered = report::build_report(&metrics);
            std::fs::write(&out, rendered)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Pending { days } => {
            let client = fub_client()?;
            let end = Utc::now().date_naive();
            let start = end - Duration::days(days.max(1));
            let appointments = client.appointments(start, end, None).await?;

            let now = Utc::now();
            let past: Vec<_> = appointments
                .into_iter()
                .filter(|apt| {
                    apt.end
                        .as_deref()
                        .or(apt.start.as_deref())
                        .and_then(crm::parse_appointment_time)
                        .map_or(false, |t| t < now)
                })
                .collect();

            let ids: Vec<i64> = past.iter().map(|apt| apt.id).collect();
            let local = db::outcomes_for_appointments(&pool, &ids).await?;
            let with_local: HashSet<i64> = local.iter().map(|o| o.appointment_id).collect();

            let pending: Vec<_> = past
                .iter()
                .filter(|apt| apt.outcome_id.is_none() && !with_local.contains(&apt.id))
                .cloned()
                .collect();

            let payload = serde_json::json!({
                "total": past.len(),
                "pending": pending.len(),
                "appointments": pending
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Commands::Outcomes => {
            let outcomes = db::all_outcomes(&pool).await?;
            let payload = serde_json::json!({
                "count": outcomes.len(),
                "outcomes": outcomes
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Commands::Outcome { appointment } => {
            // A lookup miss is not an error: emit a null-outcome placeholder.
            match db::get_outcome(&pool, appointment).await? {
                Some(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
                None => {
                    let placeholder = serde_json::json!({
                        "appointmentId": appointment,
                        "outcomeId": null,
                        "outcomeName": null
                    });
                    println!("{}", serde_json::to_string_pretty(&placeholder)?);
                }
            }
        }
        Commands::OutcomeTypes => {
            let client = fub_client()?;
            let catalog = client.outcome_types().await?;
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
        Commands::AppointmentTypes => {
            let client = fub_client()?;
            let catalog = client.appointment_types().await?;
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
        Commands::SetOutcome {
            appointment,
            outcome_id,
            outcome_name,
            note,
            updated_by,
        } => {
            let updated = db::set_outcome(
                &pool,
                appointment,
                outcome_id,
                &outcome_name,
                note.as_deref(),
                updated_by.as_deref(),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
        Commands::ClearOutcome { appointment } => {
            let removed = db::delete_outcome(&pool, appointment).await?;
            if removed {
                println!("Outcome removed.");
            } else {
                println!("No local outcome found.");
            }
        }
        Commands::Import { csv } => {
            let imported = db::import_csv(&pool, &csv).await?;
            println!("Imported {imported} outcomes from {}.", csv.display());
        }
        Commands::Stats => {
            let stats = db::stats(&pool).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::IsaUsers { set } => {
            if let Some(user_ids) = set {
                db::set_isa_users(&pool, &user_ids).await?;
                println!("ISA designation updated for {} users.", user_ids.len());
            }
            let ids = db::isa_user_ids(&pool).await?;
            let payload = serde_json::json!({ "isaUserIds": ids });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
    }

    Ok(())
}
