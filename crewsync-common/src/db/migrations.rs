//! Database schema migrations
//!
//! Versioned, idempotent schema upgrades tracked in the `schema_version` table.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field already recorded them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Check before altering** - every step must be safe to re-run
//! 4. **Prefer ALTER TABLE** over DROP/CREATE to preserve data

use crate::{time, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Name of the index enforcing at most one active availability session
pub const SINGLE_ACTIVE_SESSION_INDEX: &str = "idx_availability_sessions_single_active";

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    if !table_exists(pool, "schema_version").await? {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
    )
    .bind(table)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(pool)
            .await?;

    Ok(count > 0)
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    crate::db::init::create_schema_version_table(pool).await?;

    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: enforce at most one active availability session
///
/// Older databases relied on callers never activating two sessions. Any extra
/// active rows are closed (keeping the most recently started one) before the
/// partial unique index is created.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    if !table_exists(pool, "availability_sessions").await? {
        info!("  availability_sessions table doesn't exist yet - skipping migration");
        return Ok(());
    }

    let active_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM availability_sessions WHERE active = 1")
            .fetch_one(pool)
            .await?;

    if active_count > 1 {
        let now = time::to_db(time::now());
        let repaired = sqlx::query(
            r#"
            UPDATE availability_sessions
            SET active = 0,
                end_date = COALESCE(end_date, ?),
                closed_at = COALESCE(closed_at, ?)
            WHERE active = 1
              AND guid <> (
                  SELECT guid FROM availability_sessions
                  WHERE active = 1
                  ORDER BY start_date DESC, created_at DESC, guid DESC
                  LIMIT 1
              )
            "#,
        )
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?
        .rows_affected();

        warn!(
            "  Found {} active availability sessions; closed {} older ones",
            active_count, repaired
        );
    }

    sqlx::query(&format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON availability_sessions(active) WHERE active = 1",
        SINGLE_ACTIVE_SESSION_INDEX
    ))
    .execute(pool)
    .await?;

    info!("  Installed {}", SINGLE_ACTIVE_SESSION_INDEX);
    Ok(())
}

/// Migration v2: soft-delete marker on availability tables
///
/// Availability tables created before soft-delete support lack `deleted_at`.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    for table in ["crew_availability", "equipment_availability"] {
        if !table_exists(pool, table).await? {
            continue;
        }
        if column_exists(pool, table, "deleted_at").await? {
            continue;
        }

        sqlx::query(&format!("ALTER TABLE {} ADD COLUMN deleted_at TEXT", table))
            .execute(pool)
            .await?;
        info!("  Added deleted_at column to {}", table);
    }

    Ok(())
}
