//! Availability session lifecycle
//!
//! Owns the active/historical session set. At most one session is active at a
//! time: rotation closes the current one and opens its replacement in a single
//! transaction, and the partial unique index on `active` backs that up in the
//! store itself.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use crewsync_common::db::{AvailabilitySession, CrewAvailability, EquipmentAvailability};
use crewsync_common::error::in_transaction;
use crewsync_common::{time, uuid_utils, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::availability::{
    assign_unassigned_crew, assign_unassigned_equipment, insert_crew_availability,
    insert_equipment_availability, load_crew_availability, load_equipment_availability,
    SessionFilter,
};
use crate::db::contractors::load_contractor;
use crate::db::sessions::{
    count_sessions, deactivate_session, insert_session, load_active_session, load_session,
    load_sessions,
};

/// Which bucket of availability rows to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSelector {
    /// The current active session (empty when none is active)
    Active,
    /// Rows not yet bucketed into any session
    Unassigned,
    Session(Uuid),
}

impl FromStr for SessionSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("active") {
            Ok(SessionSelector::Active)
        } else if trimmed.eq_ignore_ascii_case("unassigned") {
            Ok(SessionSelector::Unassigned)
        } else {
            uuid_utils::parse(trimmed)
                .map(SessionSelector::Session)
                .map_err(|_| {
                    Error::InvalidArgument(format!(
                        "session selector must be 'active', 'unassigned' or a session id, got '{}'",
                        s
                    ))
                })
        }
    }
}

impl fmt::Display for SessionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionSelector::Active => write!(f, "active"),
            SessionSelector::Unassigned => write!(f, "unassigned"),
            SessionSelector::Session(id) => write!(f, "{}", id),
        }
    }
}

impl From<Uuid> for SessionSelector {
    fn from(id: Uuid) -> Self {
        SessionSelector::Session(id)
    }
}

/// Rows moved by a bulk assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentReport {
    pub session_id: Uuid,
    pub crew_rows: u64,
    pub equipment_rows: u64,
}

impl AssignmentReport {
    pub fn total(&self) -> u64 {
        self.crew_rows + self.equipment_rows
    }
}

/// Default label for a newly opened session
pub fn default_session_label(at: DateTime<Utc>) -> String {
    format!("Week of {}", at.format("%B %-d, %Y"))
}

/// Label for the snapshot that absorbs the pre-session backlog
pub fn historical_session_label(at: DateTime<Utc>) -> String {
    format!("Historical {}", at.format("%Y-%m-%d"))
}

/// Session lifecycle manager
#[derive(Debug, Clone)]
pub struct SessionLifecycleManager {
    pool: SqlitePool,
}

impl SessionLifecycleManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Close the active session (if any) and open a new active one
    ///
    /// On the very first rotation, while no session has ever existed, unassigned
    /// availability rows are first swept into a closed historical snapshot so
    /// they do not land in the new window.
    pub async fn start_new_session(&self, label: Option<&str>) -> Result<AvailabilitySession> {
        const OP: &str = "session rotation";

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::aborted(OP, e))?;
        let now = time::now();

        match load_active_session(&mut *tx).await.map_err(in_transaction(OP))? {
            Some(previous) => {
                deactivate_session(&mut *tx, previous.guid, now)
                    .await
                    .map_err(in_transaction(OP))?;
                info!(session_id = %previous.guid, label = %previous.label, "Closed availability session");
            }
            None => {
                if count_sessions(&mut *tx).await.map_err(in_transaction(OP))? == 0 {
                    sweep_backlog(&mut *tx, now).await.map_err(in_transaction(OP))?;
                }
            }
        }

        let label = label
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_session_label(now));

        let session = AvailabilitySession {
            guid: uuid_utils::generate(),
            label,
            active: true,
            start_date: now,
            end_date: None,
            closed_at: None,
            created_at: now,
        };
        insert_session(&mut *tx, &session).await.map_err(in_transaction(OP))?;

        tx.commit().await.map_err(|e| Error::aborted(OP, e))?;

        info!(session_id = %session.guid, label = %session.label, "Opened availability session");
        Ok(session)
    }

    /// Mark a session inactive without opening a replacement
    ///
    /// Closing an already-closed session returns it unchanged.
    pub async fn close_session(&self, session_id: Uuid) -> Result<AvailabilitySession> {
        const OP: &str = "session close";

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::aborted(OP, e))?;

        let session = load_session(&mut *tx, session_id)
            .await
            .map_err(in_transaction(OP))?
            .ok_or_else(|| Error::NotFound(format!("availability session {}", session_id)))?;

        if !session.active {
            debug!(session_id = %session_id, "Session already closed");
            return Ok(session);
        }

        deactivate_session(&mut *tx, session_id, time::now())
            .await
            .map_err(in_transaction(OP))?;
        let closed = load_session(&mut *tx, session_id)
            .await
            .map_err(in_transaction(OP))?
            .ok_or_else(|| Error::Internal(format!("session {} vanished while closing", session_id)))?;

        tx.commit().await.map_err(|e| Error::aborted(OP, e))?;

        info!(session_id = %session_id, label = %closed.label, "Closed availability session");
        Ok(closed)
    }

    /// Bucket every unassigned crew and equipment row into `session_id`
    ///
    /// A second call finds nothing left to move.
    pub async fn assign_unassigned_to_session(&self, session_id: Uuid) -> Result<AssignmentReport> {
        const OP: &str = "unassigned assignment";

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::aborted(OP, e))?;

        if load_session(&mut *tx, session_id)
            .await
            .map_err(in_transaction(OP))?
            .is_none()
        {
            return Err(Error::NotFound(format!("availability session {}", session_id)));
        }

        let crew_rows = assign_unassigned_crew(&mut *tx, session_id)
            .await
            .map_err(in_transaction(OP))?;
        let equipment_rows = assign_unassigned_equipment(&mut *tx, session_id)
            .await
            .map_err(in_transaction(OP))?;

        tx.commit().await.map_err(|e| Error::aborted(OP, e))?;

        let report = AssignmentReport {
            session_id,
            crew_rows,
            equipment_rows,
        };
        info!(
            session_id = %session_id,
            crew_rows,
            equipment_rows,
            "Assigned unassigned availability"
        );
        Ok(report)
    }

    pub async fn get_crew_availability_by_session(
        &self,
        selector: SessionSelector,
    ) -> Result<Vec<CrewAvailability>> {
        match self.filter_for(selector).await? {
            Some(filter) => load_crew_availability(&self.pool, filter).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_equipment_availability_by_session(
        &self,
        selector: SessionSelector,
    ) -> Result<Vec<EquipmentAvailability>> {
        match self.filter_for(selector).await? {
            Some(filter) => load_equipment_availability(&self.pool, filter).await,
            None => Ok(Vec::new()),
        }
    }

    /// Every session, newest first
    pub async fn list_sessions(&self) -> Result<Vec<AvailabilitySession>> {
        load_sessions(&self.pool).await
    }

    pub async fn active_session(&self) -> Result<Option<AvailabilitySession>> {
        load_active_session(&self.pool).await
    }

    /// Store a crew submission, stamped with the active session if one is open
    pub async fn record_crew_availability(
        &self,
        mut record: CrewAvailability,
    ) -> Result<CrewAvailability> {
        const OP: &str = "crew submission";

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::aborted(OP, e))?;

        record.session_id = self
            .stamp_for(&mut *tx, record.contractor_id)
            .await
            .map_err(in_transaction(OP))?;
        insert_crew_availability(&mut *tx, &record)
            .await
            .map_err(in_transaction(OP))?;

        tx.commit().await.map_err(|e| Error::aborted(OP, e))?;

        debug!(guid = %record.guid, session_id = ?record.session_id, "Recorded crew availability");
        Ok(record)
    }

    /// Store an equipment submission, stamped with the active session if one is open
    pub async fn record_equipment_availability(
        &self,
        mut record: EquipmentAvailability,
    ) -> Result<EquipmentAvailability> {
        const OP: &str = "equipment submission";

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::aborted(OP, e))?;

        record.session_id = self
            .stamp_for(&mut *tx, record.contractor_id)
            .await
            .map_err(in_transaction(OP))?;
        insert_equipment_availability(&mut *tx, &record)
            .await
            .map_err(in_transaction(OP))?;

        tx.commit().await.map_err(|e| Error::aborted(OP, e))?;

        debug!(guid = %record.guid, session_id = ?record.session_id, "Recorded equipment availability");
        Ok(record)
    }

    /// Verify the contractor and pick the session a new submission belongs to
    async fn stamp_for(
        &self,
        conn: &mut SqliteConnection,
        contractor_id: Uuid,
    ) -> Result<Option<Uuid>> {
        if load_contractor(&mut *conn, contractor_id).await?.is_none() {
            return Err(Error::NotFound(format!("contractor {}", contractor_id)));
        }

        Ok(load_active_session(&mut *conn).await?.map(|s| s.guid))
    }

    /// Translate a selector into a row filter; `None` means "no rows"
    async fn filter_for(&self, selector: SessionSelector) -> Result<Option<SessionFilter>> {
        match selector {
            SessionSelector::Unassigned => Ok(Some(SessionFilter::Unassigned)),
            SessionSelector::Active => Ok(load_active_session(&self.pool)
                .await?
                .map(|s| SessionFilter::Session(s.guid))),
            SessionSelector::Session(id) => match load_session(&self.pool, id).await? {
                Some(_) => Ok(Some(SessionFilter::Session(id))),
                None => Err(Error::NotFound(format!("availability session {}", id))),
            },
        }
    }
}

/// Move the pre-session backlog into a closed historical snapshot
async fn sweep_backlog(conn: &mut SqliteConnection, now: DateTime<Utc>) -> Result<()> {
    let earliest: Option<String> = sqlx::query_scalar(
        r#"
        SELECT MIN(submitted_at) FROM (
            SELECT submitted_at FROM crew_availability WHERE session_id IS NULL
            UNION ALL
            SELECT submitted_at FROM equipment_availability WHERE session_id IS NULL
        )
        "#,
    )
    .fetch_one(&mut *conn)
    .await?;

    let Some(earliest) = earliest else {
        return Ok(());
    };

    let snapshot = AvailabilitySession {
        guid: uuid_utils::generate(),
        label: historical_session_label(now),
        active: false,
        start_date: time::from_db(&earliest)?,
        end_date: Some(now),
        closed_at: Some(now),
        created_at: now,
    };
    insert_session(&mut *conn, &snapshot).await?;

    let crew_rows = assign_unassigned_crew(&mut *conn, snapshot.guid).await?;
    let equipment_rows = assign_unassigned_equipment(&mut *conn, snapshot.guid).await?;

    info!(
        session_id = %snapshot.guid,
        label = %snapshot.label,
        crew_rows,
        equipment_rows,
        "Swept unassigned availability into historical session"
    );
    Ok(())
}
