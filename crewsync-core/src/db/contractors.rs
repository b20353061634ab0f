//! Contractor database operations
//!
//! Every reader excludes soft-deleted rows.

use crewsync_common::db::Contractor;
use crewsync_common::{time, Error, Result};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::reconcile::ReconciledFields;

const CONTRACTOR_COLUMNS: &str = r#"
    guid, company_name, name, emails, phone_numbers, category, city, state, zip,
    departure_locations, review_pending, created_at, updated_at, deleted_at
"#;

fn encode_locations(locations: &[String]) -> Result<String> {
    serde_json::to_string(locations)
        .map_err(|e| Error::Internal(format!("Failed to serialize departure_locations: {}", e)))
}

/// Insert a new contractor record
pub async fn insert_contractor(pool: &SqlitePool, contractor: &Contractor) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO contractors (
            guid, company_name, name, emails, phone_numbers, category, city, state, zip,
            departure_locations, review_pending, created_at, updated_at, deleted_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(contractor.guid.to_string())
    .bind(&contractor.company_name)
    .bind(&contractor.name)
    .bind(&contractor.emails)
    .bind(&contractor.phone_numbers)
    .bind(&contractor.category)
    .bind(&contractor.city)
    .bind(&contractor.state)
    .bind(&contractor.zip)
    .bind(encode_locations(&contractor.departure_locations)?)
    .bind(contractor.review_pending as i64)
    .bind(time::to_db(contractor.created_at))
    .bind(time::to_db(contractor.updated_at))
    .bind(contractor.deleted_at.map(time::to_db))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a live (not soft-deleted) contractor
pub async fn load_contractor<'e, E>(executor: E, guid: Uuid) -> Result<Option<Contractor>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM contractors WHERE guid = ? AND deleted_at IS NULL",
        CONTRACTOR_COLUMNS
    ))
    .bind(guid.to_string())
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(Contractor::from_row).transpose()
}

/// Load every live contractor in a stable order (creation time, then guid)
///
/// The order decides which record wins when several satisfy the same match rule.
pub async fn load_live_contractors(pool: &SqlitePool) -> Result<Vec<Contractor>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM contractors WHERE deleted_at IS NULL ORDER BY created_at ASC, guid ASC",
        CONTRACTOR_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(Contractor::from_row).collect()
}

/// Write reconciled contact fields onto a contractor
pub async fn apply_reconciled_fields(
    pool: &SqlitePool,
    guid: Uuid,
    fields: &ReconciledFields,
) -> Result<()> {
    let affected = sqlx::query(
        r#"
        UPDATE contractors
        SET emails = ?, phone_numbers = ?, departure_locations = ?,
            category = ?, city = ?, state = ?, zip = ?, updated_at = ?
        WHERE guid = ? AND deleted_at IS NULL
        "#,
    )
    .bind(&fields.emails)
    .bind(&fields.phone_numbers)
    .bind(encode_locations(&fields.departure_locations)?)
    .bind(&fields.category)
    .bind(&fields.city)
    .bind(&fields.state)
    .bind(&fields.zip)
    .bind(time::to_db(time::now()))
    .bind(guid.to_string())
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(Error::NotFound(format!("contractor {}", guid)));
    }

    Ok(())
}

/// Soft-delete a contractor (typically a merge source once it is reference-free)
pub async fn soft_delete_contractor(pool: &SqlitePool, guid: Uuid) -> Result<()> {
    let affected = sqlx::query(
        "UPDATE contractors SET deleted_at = ?, updated_at = ? WHERE guid = ? AND deleted_at IS NULL",
    )
    .bind(time::to_db(time::now()))
    .bind(time::to_db(time::now()))
    .bind(guid.to_string())
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(Error::NotFound(format!("contractor {}", guid)));
    }

    info!(contractor_id = %guid, "Soft-deleted contractor");
    Ok(())
}

/// Set or clear the review-pending flag
pub async fn set_review_pending(pool: &SqlitePool, guid: Uuid, pending: bool) -> Result<()> {
    let affected = sqlx::query(
        "UPDATE contractors SET review_pending = ?, updated_at = ? WHERE guid = ? AND deleted_at IS NULL",
    )
    .bind(pending as i64)
    .bind(time::to_db(time::now()))
    .bind(guid.to_string())
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(Error::NotFound(format!("contractor {}", guid)));
    }

    Ok(())
}
