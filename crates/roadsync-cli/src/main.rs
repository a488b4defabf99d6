//! roadsync CLI - operator interface for the incident reporting system
//!
//! Reports incidents, records status changes, shows ledger-derived
//! progress, and triggers sync passes between the two stores.

mod error;

use std::path::PathBuf;

use chrono::DateTime;
use clap::{Parser, Subcommand, ValueEnum};
use roadsync_core::config::AppConfig;
use roadsync_core::db::{
    stats, CompanyRepository, Database, LibSqlCompanyRepository, LibSqlNotificationRepository,
    LibSqlUserRepository, NotificationRepository, UserRepository,
};
use roadsync_core::docstore::{DocumentStore, FirestoreStore, IncidentDocument, MemoryDocumentStore};
use roadsync_core::models::{IncidentDraft, IncidentId, Role, UserId};
use roadsync_core::service::IncidentService;
use roadsync_core::sync::SyncDirection;

use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "roadsync")]
#[command(about = "Road incident reporting with dual-store sync")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Report a new incident
    Report {
        /// Damaged surface area in square meters
        #[arg(long)]
        surface: f64,
        /// Estimated remediation budget
        #[arg(long)]
        budget: f64,
        /// Latitude of the defect
        #[arg(long)]
        latitude: f64,
        /// Longitude of the defect
        #[arg(long)]
        longitude: f64,
        /// Assigned company name (created on demand)
        #[arg(long)]
        company: Option<String>,
        /// Reporter email (must be a registered user)
        #[arg(long)]
        reporter: Option<String>,
    },
    /// List incidents
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a status change for an incident
    Status {
        /// Incident id
        id: i64,
        /// New status code (nouveau, en_cours, termine)
        code: String,
    },
    /// Show ledger-derived progress for an incident
    Progress {
        /// Incident id
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the status codes with labels and percentages
    Statuses,
    /// Show aggregate statistics
    Stats {
        /// Group by company
        #[arg(long)]
        by_company: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run sync passes between the stores (requires Firestore config)
    Sync {
        /// Which passes to run
        #[arg(value_enum, default_value_t = SyncChoice::Both)]
        direction: SyncChoice,
    },
    /// Register a user
    AddUser {
        /// Login email
        email: String,
        /// Display name
        name: String,
        /// Grant the manager role
        #[arg(long)]
        manager: bool,
    },
    /// List a user's notifications
    Inbox {
        /// User email
        email: String,
        /// Mark listed notifications as read
        #[arg(long)]
        mark_read: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SyncChoice {
    /// Document store into the relational store
    Pull,
    /// Relational store into the document store
    Push,
    /// Both passes, pull first
    Both,
}

/// Document store selected from configuration.
enum AnyDocStore {
    Firestore(FirestoreStore),
    /// Placeholder for commands that never touch the document store
    Memory(MemoryDocumentStore),
}

impl DocumentStore for AnyDocStore {
    async fn insert(&self, doc: &IncidentDocument) -> roadsync_core::Result<String> {
        match self {
            Self::Firestore(store) => store.insert(doc).await,
            Self::Memory(store) => store.insert(doc).await,
        }
    }

    async fn get(&self, id: &str) -> roadsync_core::Result<Option<IncidentDocument>> {
        match self {
            Self::Firestore(store) => store.get(id).await,
            Self::Memory(store) => store.get(id).await,
        }
    }

    async fn list(&self) -> roadsync_core::Result<Vec<IncidentDocument>> {
        match self {
            Self::Firestore(store) => store.list().await,
            Self::Memory(store) => store.list().await,
        }
    }

    async fn update(&self, id: &str, doc: &IncidentDocument) -> roadsync_core::Result<()> {
        match self {
            Self::Firestore(store) => store.update(id, doc).await,
            Self::Memory(store) => store.update(id, doc).await,
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env().map_err(CliError::Core)?;

    let db = match cli.db_path.or(config.db_path.clone()) {
        Some(path) => Database::open(path).await?,
        None => Database::open("roadsync.db").await?,
    };

    let docs = match &config.firestore {
        Some(firestore) => AnyDocStore::Firestore(FirestoreStore::new(firestore.clone())?),
        None => AnyDocStore::Memory(MemoryDocumentStore::new()),
    };
    let service = IncidentService::new(&db, &docs);

    match cli.command {
        Commands::Report {
            surface,
            budget,
            latitude,
            longitude,
            company,
            reporter,
        } => {
            let company_id = match company {
                Some(name) => Some(
                    LibSqlCompanyRepository::new(db.connection())
                        .get_or_create(&name)
                        .await?
                        .id,
                ),
                None => None,
            };
            let user_id = match reporter {
                Some(email) => Some(lookup_user(&db, &email).await?),
                None => None,
            };

            let incident = service
                .create_incident(&IncidentDraft {
                    surface,
                    budget,
                    latitude,
                    longitude,
                    company_id,
                    user_id,
                    created_at: Some(chrono::Utc::now().timestamp_millis()),
                    ..IncidentDraft::default()
                })
                .await?;
            println!("Reported incident {}", incident.id);
        }

        Commands::List { json } => {
            let incidents = service.list_incidents().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&incidents)?);
            } else {
                for incident in incidents {
                    println!(
                        "{}\t({:.5}, {:.5})\tsurface {:.1} m²\tbudget {:.0}",
                        incident.id, incident.latitude, incident.longitude,
                        incident.surface, incident.budget
                    );
                }
            }
        }

        Commands::Status { id, code } => {
            let recorded_at = service
                .update_incident_status(IncidentId(id), &code)
                .await?;
            println!("Incident {id} is now '{code}' (recorded at {})", format_ts(recorded_at));
        }

        Commands::Progress { id, json } => {
            let view = service.get_incident_progress(IncidentId(id)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!("{} ({}%)", view.label, view.percentage);
                if let Some(started_at) = view.started_at {
                    println!("reported:  {}", format_ts(started_at));
                }
                if let Some(completed_at) = view.completed_at {
                    println!("completed: {}", format_ts(completed_at));
                }
                if let Some(duration) = view.duration {
                    println!("duration:  {} days {} hours", duration.days, duration.hours);
                }
            }
        }

        Commands::Statuses => {
            for info in service.list_status_codes() {
                println!("{}\t{}\t{}%", info.code, info.label, info.percentage);
            }
        }

        Commands::Stats { by_company, json } => {
            if by_company {
                let rows = service.get_statistics_by_company().await?;
                if json {
                    print_company_stats_json(&rows)?;
                } else {
                    for row in rows {
                        println!(
                            "{}\t{} incidents\t{} done\t{:.0}% completion",
                            row.company,
                            row.total,
                            row.termine,
                            row.completion_rate * 100.0
                        );
                    }
                }
            } else {
                let s = service.get_statistics().await?;
                if json {
                    print_stats_json(&s)?;
                } else {
                    println!("total:      {}", s.total);
                    println!("nouveau:    {}", s.nouveau);
                    println!("en cours:   {}", s.en_cours);
                    println!("terminé:    {}", s.termine);
                    println!("completion: {:.0}%", s.completion_rate * 100.0);
                    if let Some(avg) = s.avg_completion_ms {
                        println!("avg completion: {:.1} days", avg / 86_400_000.0);
                    }
                }
            }
        }

        Commands::Sync { direction } => {
            if matches!(docs, AnyDocStore::Memory(_)) {
                return Err(CliError::Config(
                    "document store not configured; set ROADSYNC_FIRESTORE_PROJECT".to_string(),
                ));
            }
            let passes: &[SyncDirection] = match direction {
                SyncChoice::Pull => &[SyncDirection::DocumentToRelational],
                SyncChoice::Push => &[SyncDirection::RelationalToDocument],
                SyncChoice::Both => &[
                    SyncDirection::DocumentToRelational,
                    SyncDirection::RelationalToDocument,
                ],
            };
            for pass in passes {
                tracing::info!(%pass, "sync pass requested");
                let report = service.trigger_sync(*pass, Role::Manager).await?;
                println!(
                    "{pass}: {} created, {} updated, {} skipped, {} failed",
                    report.created,
                    report.updated,
                    report.skipped,
                    report.errors.len()
                );
                for failure in &report.errors {
                    eprintln!("  record {}: {}", failure.record, failure.message);
                }
            }
        }

        Commands::AddUser {
            email,
            name,
            manager,
        } => {
            let role = if manager { Role::Manager } else { Role::Citizen };
            let user = LibSqlUserRepository::new(db.connection())
                .create(&email, &name, role)
                .await?;
            println!("Registered user {} ({})", user.id, user.email);
        }

        Commands::Inbox { email, mark_read } => {
            let user_id = lookup_user(&db, &email).await?;
            let repo = LibSqlNotificationRepository::new(db.connection());
            let notifications = repo.list_for_user(user_id).await?;
            for notification in &notifications {
                let flag = if notification.is_read { " " } else { "*" };
                println!(
                    "{flag} [{}] {}",
                    format_ts(notification.created_at),
                    notification.message
                );
            }
            if mark_read {
                for notification in &notifications {
                    if !notification.is_read {
                        repo.mark_read(notification.id).await?;
                    }
                }
            }
        }
    }

    Ok(())
}

async fn lookup_user(db: &Database, email: &str) -> Result<UserId> {
    LibSqlUserRepository::new(db.connection())
        .find_by_email(email)
        .await?
        .map(|user| user.id)
        .ok_or_else(|| {
            CliError::Config(format!("no registered user with email '{email}'"))
        })
}

fn format_ts(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map_or_else(|| timestamp_ms.to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}

fn print_stats_json(stats: &stats::Statistics) -> Result<()> {
    let value = serde_json::json!({
        "total": stats.total,
        "nouveau": stats.nouveau,
        "en_cours": stats.en_cours,
        "termine": stats.termine,
        "completion_rate": stats.completion_rate,
        "avg_completion_ms": stats.avg_completion_ms,
        "min_completion_ms": stats.min_completion_ms,
        "max_completion_ms": stats.max_completion_ms,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn print_company_stats_json(rows: &[stats::CompanyStatistics]) -> Result<()> {
    let values: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| {
            serde_json::json!({
                "company": row.company,
                "total": row.total,
                "termine": row.termine,
                "completion_rate": row.completion_rate,
                "avg_completion_ms": row.avg_completion_ms,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&values)?);
    Ok(())
}
