//! Database initialization
//!
//! Creates the database on first run, applies connection pragmas, creates every
//! table idempotently and then runs versioned migrations.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Busy timeout applied to every connection, in milliseconds
pub const BUSY_TIMEOUT_MS: u32 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .min_connections(1)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Pragmas are per-connection; every pooled connection needs them
                sqlx::query("PRAGMA foreign_keys = ON")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query(&format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets readers (match resolution, availability queries) proceed during a merge
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index, then run pending migrations
///
/// Idempotent; also used by tests against in-memory pools.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    create_schema_version_table(pool).await?;
    create_contractors_table(pool).await?;
    create_availability_sessions_table(pool).await?;
    create_crew_availability_table(pool).await?;
    create_equipment_availability_table(pool).await?;

    // Remaining entity types that carry a contractor reference
    create_contractor_files_table(pool).await?;
    create_contractor_reviews_table(pool).await?;
    create_users_table(pool).await?;
    create_contractor_equipment_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    Ok(())
}

pub(crate) async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the contractors table
///
/// Emails and phone numbers keep the raw delimited text; normalization happens
/// at match time so the submitted spelling is never lost.
pub async fn create_contractors_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contractors (
            guid TEXT PRIMARY KEY,
            company_name TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL DEFAULT '',
            emails TEXT NOT NULL DEFAULT '',
            phone_numbers TEXT NOT NULL DEFAULT '',
            category TEXT,
            city TEXT,
            state TEXT,
            zip TEXT,
            departure_locations TEXT NOT NULL DEFAULT '[]',
            review_pending INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            CHECK (review_pending IN (0, 1))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_contractors_company ON contractors(company_name)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_contractors_created ON contractors(created_at, guid)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the availability_sessions table
///
/// The single-active unique index is installed by migration v1 so that legacy
/// databases get repaired before the constraint is added.
pub async fn create_availability_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS availability_sessions (
            guid TEXT PRIMARY KEY,
            label TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 0,
            start_date TEXT NOT NULL,
            end_date TEXT,
            closed_at TEXT,
            created_at TEXT NOT NULL,
            CHECK (active IN (0, 1))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_availability_sessions_start ON availability_sessions(start_date)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_crew_availability_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crew_availability (
            guid TEXT PRIMARY KEY,
            contractor_id TEXT NOT NULL REFERENCES contractors(guid),
            session_id TEXT REFERENCES availability_sessions(guid),
            submitted_at TEXT NOT NULL,
            available_from TEXT,
            available_until TEXT,
            crew_count INTEGER NOT NULL DEFAULT 0,
            departure_location TEXT,
            notes TEXT,
            deleted_at TEXT,
            CHECK (crew_count >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_crew_availability_contractor ON crew_availability(contractor_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_crew_availability_session ON crew_availability(session_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_equipment_availability_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS equipment_availability (
            guid TEXT PRIMARY KEY,
            contractor_id TEXT NOT NULL REFERENCES contractors(guid),
            session_id TEXT REFERENCES availability_sessions(guid),
            submitted_at TEXT NOT NULL,
            equipment_type TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 1,
            notes TEXT,
            deleted_at TEXT,
            CHECK (quantity >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_equipment_availability_contractor ON equipment_availability(contractor_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_equipment_availability_session ON equipment_availability(session_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_contractor_files_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contractor_files (
            guid TEXT PRIMARY KEY,
            contractor_id TEXT NOT NULL REFERENCES contractors(guid),
            file_name TEXT NOT NULL,
            uploaded_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_contractor_files_contractor ON contractor_files(contractor_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_contractor_reviews_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contractor_reviews (
            guid TEXT PRIMARY KEY,
            contractor_id TEXT NOT NULL REFERENCES contractors(guid),
            rating INTEGER,
            comment TEXT,
            created_at TEXT NOT NULL,
            deleted_at TEXT,
            CHECK (rating IS NULL OR (rating >= 1 AND rating <= 5))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_contractor_reviews_contractor ON contractor_reviews(contractor_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the users table
///
/// Only the contractor link matters to this core; credentials live elsewhere.
async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            contractor_id TEXT REFERENCES contractors(guid),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_contractor ON users(contractor_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_contractor_equipment_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contractor_equipment (
            guid TEXT PRIMARY KEY,
            contractor_id TEXT NOT NULL REFERENCES contractors(guid),
            equipment_type TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (quantity >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_contractor_equipment_contractor ON contractor_equipment(contractor_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
