//! crewsync - operator CLI for contractor identity and availability sessions
//!
//! Resolves the root folder (CLI > env > config.toml > platform default),
//! opens or creates the database, runs one command and prints the result as JSON.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crewsync_common::config::{RootFolderInitializer, RootFolderResolver};
use crewsync_common::db::init::init_database;
use crewsync_common::db::migrations::get_schema_version;
use crewsync_core::{CandidateIdentity, CrewSync, SessionSelector};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Command-line arguments for crewsync
#[derive(Parser, Debug)]
#[command(name = "crewsync")]
#[command(about = "Contractor identity matching and availability session management")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long, env = "CREWSYNC_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Config file to read instead of the platform default
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level filter when RUST_LOG is unset (overrides config.toml)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and apply migrations
    Init,

    /// Find the existing contractor a submitted identity refers to
    Match {
        #[arg(long)]
        company: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },

    /// Re-point every reference from SOURCE onto TARGET
    Merge {
        source: Uuid,
        target: Uuid,
        /// Fold the source's contact details into the target first
        #[arg(long)]
        reconcile: bool,
        /// Soft-delete the source and flag the target for review afterwards
        #[arg(long)]
        retire: bool,
    },

    /// Availability session administration
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },

    /// List availability rows for a session, "active" or "unassigned"
    Availability {
        selector: String,
        /// Show equipment rows instead of crew rows
        #[arg(long)]
        equipment: bool,
    },

    /// Bucket every unassigned availability row into a session
    Assign { session: Uuid },
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    /// Close the active session and open a new one
    Start {
        #[arg(long)]
        label: Option<String>,
    },
    /// Close a session without opening a replacement
    Close { session: Uuid },
    /// List every session, newest first
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut resolver = RootFolderResolver::new("crewsync").with_cli_arg(args.root_folder.clone());
    if let Some(path) = &args.config {
        resolver = resolver.with_config_file(path);
    }
    let config = resolver.config();

    // Logs go to stderr (and the configured file); stdout carries the JSON result
    let level = args.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    let log_file = config
        .logging
        .file
        .as_deref()
        .map(open_log_file)
        .transpose()?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(log_file.map(|file| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
        }))
        .init();

    debug!("Starting crewsync v{}", env!("CARGO_PKG_VERSION"));

    let initializer =
        RootFolderInitializer::new(resolver.resolve()).with_database_file(config.database_file.clone());
    initializer
        .ensure_directory_exists()
        .with_context(|| format!("Failed to create {}", initializer.root_folder().display()))?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let sync = CrewSync::new(pool);

    run(&sync, args.command, db_path).await
}

async fn run(sync: &CrewSync, command: Command, db_path: PathBuf) -> Result<()> {
    match command {
        Command::Init => {
            let version = get_schema_version(sync.pool()).await?;
            print_json(&serde_json::json!({
                "database": db_path,
                "schema_version": version,
            }))
        }

        Command::Match {
            company,
            name,
            email,
            phone,
        } => {
            let candidate = CandidateIdentity {
                company_name: company,
                name,
                email,
                phone,
            };
            print_json(&sync.resolve_match(&candidate).await?)
        }

        Command::Merge {
            source,
            target,
            reconcile,
            retire,
        } => {
            let reconciled = if reconcile {
                Some(sync.reconcile_and_apply(source, target).await?)
            } else {
                None
            };

            let report = sync.merge_contractors(source, target).await?;

            if retire {
                let remaining = sync.remaining_references(source).await?;
                anyhow::ensure!(
                    remaining.is_empty(),
                    "source {} still has {} references; not retiring",
                    source,
                    remaining.total
                );
                sync.soft_delete_contractor(source).await?;
                sync.set_review_pending(target, true).await?;
            }

            print_json(&serde_json::json!({
                "reconciled": reconciled,
                "merge": report,
                "retired": retire,
            }))
        }

        Command::Session { action } => match action {
            SessionCommand::Start { label } => {
                print_json(&sync.start_new_availability_session(label.as_deref()).await?)
            }
            SessionCommand::Close { session } => {
                print_json(&sync.close_availability_session(session).await?)
            }
            SessionCommand::List => print_json(&sync.list_availability_sessions().await?),
        },

        Command::Availability {
            selector,
            equipment,
        } => {
            let selector: SessionSelector = selector.parse()?;
            if equipment {
                print_json(&sync.get_equipment_availability_by_session(selector).await?)
            } else {
                print_json(&sync.get_crew_availability_by_session(selector).await?)
            }
        }

        Command::Assign { session } => print_json(&sync.assign_unassigned_to_session(session).await?),
    }
}

/// Open the configured log file for appending, creating its folder if needed
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log folder {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
