//! Crew and equipment availability database operations

use crewsync_common::db::{CrewAvailability, EquipmentAvailability};
use crewsync_common::{time, Result};
use sqlx::{Executor, Sqlite};
use uuid::Uuid;

const CREW_COLUMNS: &str = r#"
    guid, contractor_id, session_id, submitted_at, available_from, available_until,
    crew_count, departure_location, notes
"#;

const EQUIPMENT_COLUMNS: &str = r#"
    guid, contractor_id, session_id, submitted_at, equipment_type, quantity, notes
"#;

/// Which session column value a query filters on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFilter {
    Session(Uuid),
    Unassigned,
}

impl SessionFilter {
    fn clause(&self) -> &'static str {
        match self {
            SessionFilter::Session(_) => "session_id = ?",
            SessionFilter::Unassigned => "session_id IS NULL",
        }
    }

    fn bound_id(&self) -> Option<String> {
        match self {
            SessionFilter::Session(id) => Some(id.to_string()),
            SessionFilter::Unassigned => None,
        }
    }
}

pub async fn insert_crew_availability<'e, E>(executor: E, record: &CrewAvailability) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO crew_availability (
            guid, contractor_id, session_id, submitted_at, available_from, available_until,
            crew_count, departure_location, notes
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.guid.to_string())
    .bind(record.contractor_id.to_string())
    .bind(record.session_id.map(|id| id.to_string()))
    .bind(time::to_db(record.submitted_at))
    .bind(record.available_from.map(time::to_db))
    .bind(record.available_until.map(time::to_db))
    .bind(record.crew_count)
    .bind(&record.departure_location)
    .bind(&record.notes)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn insert_equipment_availability<'e, E>(
    executor: E,
    record: &EquipmentAvailability,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO equipment_availability (
            guid, contractor_id, session_id, submitted_at, equipment_type, quantity, notes
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.guid.to_string())
    .bind(record.contractor_id.to_string())
    .bind(record.session_id.map(|id| id.to_string()))
    .bind(time::to_db(record.submitted_at))
    .bind(&record.equipment_type)
    .bind(record.quantity)
    .bind(&record.notes)
    .execute(executor)
    .await?;

    Ok(())
}

/// Live crew rows for a session (or the unassigned pool), oldest submission first
pub async fn load_crew_availability<'e, E>(
    executor: E,
    filter: SessionFilter,
) -> Result<Vec<CrewAvailability>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM crew_availability WHERE {} AND deleted_at IS NULL ORDER BY submitted_at ASC, guid ASC",
        CREW_COLUMNS,
        filter.clause()
    );
    let mut query = sqlx::query(&sql);
    if let Some(id) = filter.bound_id() {
        query = query.bind(id);
    }

    let rows = query.fetch_all(executor).await?;
    rows.iter().map(CrewAvailability::from_row).collect()
}

/// Live equipment rows for a session (or the unassigned pool), oldest submission first
pub async fn load_equipment_availability<'e, E>(
    executor: E,
    filter: SessionFilter,
) -> Result<Vec<EquipmentAvailability>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM equipment_availability WHERE {} AND deleted_at IS NULL ORDER BY submitted_at ASC, guid ASC",
        EQUIPMENT_COLUMNS,
        filter.clause()
    );
    let mut query = sqlx::query(&sql);
    if let Some(id) = filter.bound_id() {
        query = query.bind(id);
    }

    let rows = query.fetch_all(executor).await?;
    rows.iter().map(EquipmentAvailability::from_row).collect()
}

/// Stamp every unassigned crew row with `session_id`; returns the row count
///
/// Soft-deleted rows are stamped too so they cannot resurface later.
pub async fn assign_unassigned_crew<'e, E>(executor: E, session_id: Uuid) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE crew_availability SET session_id = ? WHERE session_id IS NULL")
        .bind(session_id.to_string())
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Stamp every unassigned equipment row with `session_id`; returns the row count
pub async fn assign_unassigned_equipment<'e, E>(executor: E, session_id: Uuid) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result =
        sqlx::query("UPDATE equipment_availability SET session_id = ? WHERE session_id IS NULL")
            .bind(session_id.to_string())
            .execute(executor)
            .await?;

    Ok(result.rows_affected())
}

/// Soft-delete a crew submission
pub async fn soft_delete_crew_availability<'e, E>(executor: E, guid: Uuid) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE crew_availability SET deleted_at = ? WHERE guid = ? AND deleted_at IS NULL",
    )
    .bind(time::to_db(time::now()))
    .bind(guid.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Soft-delete an equipment submission
pub async fn soft_delete_equipment_availability<'e, E>(executor: E, guid: Uuid) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE equipment_availability SET deleted_at = ? WHERE guid = ? AND deleted_at IS NULL",
    )
    .bind(time::to_db(time::now()))
    .bind(guid.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
