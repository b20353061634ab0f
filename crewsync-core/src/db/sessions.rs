//! Availability session database operations

use chrono::{DateTime, Utc};
use crewsync_common::db::AvailabilitySession;
use crewsync_common::{time, Result};
use sqlx::{Executor, Sqlite};
use uuid::Uuid;

const SESSION_COLUMNS: &str = "guid, label, active, start_date, end_date, closed_at, created_at";

pub async fn insert_session<'e, E>(executor: E, session: &AvailabilitySession) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO availability_sessions (
            guid, label, active, start_date, end_date, closed_at, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.guid.to_string())
    .bind(&session.label)
    .bind(session.active as i64)
    .bind(time::to_db(session.start_date))
    .bind(session.end_date.map(time::to_db))
    .bind(session.closed_at.map(time::to_db))
    .bind(time::to_db(session.created_at))
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn load_session<'e, E>(executor: E, guid: Uuid) -> Result<Option<AvailabilitySession>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM availability_sessions WHERE guid = ?",
        SESSION_COLUMNS
    ))
    .bind(guid.to_string())
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(AvailabilitySession::from_row).transpose()
}

/// The session currently accepting submissions, if any
pub async fn load_active_session<'e, E>(executor: E) -> Result<Option<AvailabilitySession>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM availability_sessions WHERE active = 1 ORDER BY start_date DESC LIMIT 1",
        SESSION_COLUMNS
    ))
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(AvailabilitySession::from_row).transpose()
}

/// Every session, newest first
pub async fn load_sessions<'e, E>(executor: E) -> Result<Vec<AvailabilitySession>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!(
        "SELECT {} FROM availability_sessions ORDER BY start_date DESC, created_at DESC, guid DESC",
        SESSION_COLUMNS
    ))
    .fetch_all(executor)
    .await?;

    rows.iter().map(AvailabilitySession::from_row).collect()
}

pub async fn count_sessions<'e, E>(executor: E) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM availability_sessions")
        .fetch_one(executor)
        .await?;

    Ok(count)
}

/// Mark a session inactive and stamp its end; returns false if it was not active
pub async fn deactivate_session<'e, E>(executor: E, guid: Uuid, at: DateTime<Utc>) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let stamp = time::to_db(at);
    let result = sqlx::query(
        r#"
        UPDATE availability_sessions
        SET active = 0, end_date = COALESCE(end_date, ?), closed_at = ?
        WHERE guid = ? AND active = 1
        "#,
    )
    .bind(&stamp)
    .bind(&stamp)
    .bind(guid.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
