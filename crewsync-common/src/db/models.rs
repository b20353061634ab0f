//! Database models
//!
//! Each model decodes itself from a `SqliteRow` selected with the column names
//! used in `init.rs`.

use crate::{time, uuid_utils, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

/// Contractor identity record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contractor {
    pub guid: Uuid,
    pub company_name: String,
    pub name: String,
    /// Raw delimited email list as submitted
    pub emails: String,
    /// Raw delimited phone list as submitted
    pub phone_numbers: String,
    pub category: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub departure_locations: Vec<String>,
    pub review_pending: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Contractor {
    pub fn new(company_name: impl Into<String>, name: impl Into<String>) -> Self {
        let now = time::now();
        Self {
            guid: uuid_utils::generate(),
            company_name: company_name.into(),
            name: name.into(),
            emails: String::new(),
            phone_numbers: String::new(),
            category: None,
            city: None,
            state: None,
            zip: None,
            departure_locations: Vec::new(),
            review_pending: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn with_emails(mut self, emails: impl Into<String>) -> Self {
        self.emails = emails.into();
        self
    }

    pub fn with_phone_numbers(mut self, phones: impl Into<String>) -> Self {
        self.phone_numbers = phones.into();
        self
    }

    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let guid: String = row.try_get("guid")?;
        let departure_locations: String = row.try_get("departure_locations")?;
        let departure_locations: Vec<String> = serde_json::from_str(&departure_locations)
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to deserialize departure_locations for {}: {}",
                    guid, e
                ))
            })?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Self {
            guid: uuid_utils::from_db(&guid)?,
            company_name: row.try_get("company_name")?,
            name: row.try_get("name")?,
            emails: row.try_get("emails")?,
            phone_numbers: row.try_get("phone_numbers")?,
            category: row.try_get("category")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            zip: row.try_get("zip")?,
            departure_locations,
            review_pending: row.try_get::<i64, _>("review_pending")? != 0,
            created_at: time::from_db(&created_at)?,
            updated_at: time::from_db(&updated_at)?,
            deleted_at: time::from_db_opt(row.try_get("deleted_at")?)?,
        })
    }
}

/// Administrative window grouping availability submissions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySession {
    pub guid: Uuid,
    pub label: String,
    pub active: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AvailabilitySession {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let guid: String = row.try_get("guid")?;
        let start_date: String = row.try_get("start_date")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(Self {
            guid: uuid_utils::from_db(&guid)?,
            label: row.try_get("label")?,
            active: row.try_get::<i64, _>("active")? != 0,
            start_date: time::from_db(&start_date)?,
            end_date: time::from_db_opt(row.try_get("end_date")?)?,
            closed_at: time::from_db_opt(row.try_get("closed_at")?)?,
            created_at: time::from_db(&created_at)?,
        })
    }
}

/// Crew availability submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewAvailability {
    pub guid: Uuid,
    pub contractor_id: Uuid,
    /// None while unassigned
    pub session_id: Option<Uuid>,
    pub submitted_at: DateTime<Utc>,
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,
    pub crew_count: i64,
    pub departure_location: Option<String>,
    pub notes: Option<String>,
}

impl CrewAvailability {
    pub fn new(contractor_id: Uuid, crew_count: i64) -> Self {
        Self {
            guid: uuid_utils::generate(),
            contractor_id,
            session_id: None,
            submitted_at: time::now(),
            available_from: None,
            available_until: None,
            crew_count,
            departure_location: None,
            notes: None,
        }
    }

    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let guid: String = row.try_get("guid")?;
        let contractor_id: String = row.try_get("contractor_id")?;
        let session_id: Option<String> = row.try_get("session_id")?;
        let submitted_at: String = row.try_get("submitted_at")?;

        Ok(Self {
            guid: uuid_utils::from_db(&guid)?,
            contractor_id: uuid_utils::from_db(&contractor_id)?,
            session_id: session_id.as_deref().map(uuid_utils::from_db).transpose()?,
            submitted_at: time::from_db(&submitted_at)?,
            available_from: time::from_db_opt(row.try_get("available_from")?)?,
            available_until: time::from_db_opt(row.try_get("available_until")?)?,
            crew_count: row.try_get("crew_count")?,
            departure_location: row.try_get("departure_location")?,
            notes: row.try_get("notes")?,
        })
    }
}

/// Equipment availability submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentAvailability {
    pub guid: Uuid,
    pub contractor_id: Uuid,
    /// None while unassigned
    pub session_id: Option<Uuid>,
    pub submitted_at: DateTime<Utc>,
    pub equipment_type: String,
    pub quantity: i64,
    pub notes: Option<String>,
}

impl EquipmentAvailability {
    pub fn new(contractor_id: Uuid, equipment_type: impl Into<String>, quantity: i64) -> Self {
        Self {
            guid: uuid_utils::generate(),
            contractor_id,
            session_id: None,
            submitted_at: time::now(),
            equipment_type: equipment_type.into(),
            quantity,
            notes: None,
        }
    }

    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let guid: String = row.try_get("guid")?;
        let contractor_id: String = row.try_get("contractor_id")?;
        let session_id: Option<String> = row.try_get("session_id")?;
        let submitted_at: String = row.try_get("submitted_at")?;

        Ok(Self {
            guid: uuid_utils::from_db(&guid)?,
            contractor_id: uuid_utils::from_db(&contractor_id)?,
            session_id: session_id.as_deref().map(uuid_utils::from_db).transpose()?,
            submitted_at: time::from_db(&submitted_at)?,
            equipment_type: row.try_get("equipment_type")?,
            quantity: row.try_get("quantity")?,
            notes: row.try_get("notes")?,
        })
    }
}
