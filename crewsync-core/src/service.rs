//! Library facade over the identity and session core

use std::sync::Arc;

use crewsync_common::db::{AvailabilitySession, Contractor, CrewAvailability, EquipmentAvailability};
use crewsync_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{availability, contractors};
use crate::matching::{CandidateIdentity, ContractorMatch, MatchResolver};
use crate::merge::{MergeCoordinator, MergeReport, ReferenceCounts};
use crate::reconcile::{reconcile, ReconciledFields};
use crate::sessions::{AssignmentReport, SessionLifecycleManager, SessionSelector};

/// Entry point for importers, UI actions and the CLI
///
/// Cheap to clone: a pool handle plus a shared migrator registry.
#[derive(Debug, Clone)]
pub struct CrewSync {
    pool: SqlitePool,
    merger: Arc<MergeCoordinator>,
    sessions: SessionLifecycleManager,
}

impl CrewSync {
    /// Facade with the default dependent-entity migrators
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_coordinator(pool, MergeCoordinator::with_default_migrators())
    }

    /// Facade with a caller-built migrator registry
    pub fn with_coordinator(pool: SqlitePool, merger: MergeCoordinator) -> Self {
        Self {
            sessions: SessionLifecycleManager::new(pool.clone()),
            merger: Arc::new(merger),
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ========================================================================
    // Contractors and matching
    // ========================================================================

    pub async fn add_contractor(&self, contractor: &Contractor) -> Result<()> {
        contractors::insert_contractor(&self.pool, contractor).await?;
        info!(contractor_id = %contractor.guid, company = %contractor.company_name, "Added contractor");
        Ok(())
    }

    pub async fn get_contractor(&self, guid: Uuid) -> Result<Contractor> {
        contractors::load_contractor(&self.pool, guid)
            .await?
            .ok_or_else(|| Error::NotFound(format!("contractor {}", guid)))
    }

    /// Live contractors in match-precedence order
    pub async fn list_contractors(&self) -> Result<Vec<Contractor>> {
        contractors::load_live_contractors(&self.pool).await
    }

    /// Find the existing contractor a candidate identity refers to, if any
    pub async fn resolve_match(&self, candidate: &CandidateIdentity) -> Result<Option<ContractorMatch>> {
        let existing = contractors::load_live_contractors(&self.pool).await?;
        let found = MatchResolver::new(&existing).resolve(candidate);

        match &found {
            Some(m) => debug!(contractor_id = %m.contractor.guid, strategy = %m.strategy, "Candidate matched"),
            None => debug!(company = %candidate.company_name, "No match for candidate"),
        }
        Ok(found)
    }

    /// Resolve several candidates against one snapshot of the contractor set
    pub async fn resolve_matches(
        &self,
        candidates: &[CandidateIdentity],
    ) -> Result<Vec<Option<ContractorMatch>>> {
        let existing = contractors::load_live_contractors(&self.pool).await?;
        Ok(MatchResolver::new(&existing).resolve_batch(candidates))
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// Re-point every dependent reference from `source_id` onto `target_id`
    pub async fn merge_contractors(&self, source_id: Uuid, target_id: Uuid) -> Result<MergeReport> {
        self.merger.merge(&self.pool, source_id, target_id).await
    }

    pub async fn remaining_references(&self, contractor_id: Uuid) -> Result<ReferenceCounts> {
        self.merger.remaining_references(&self.pool, contractor_id).await
    }

    /// Fold the source's contact details into the target ahead of a merge
    ///
    /// Returns the fields now stored on the target.
    pub async fn reconcile_and_apply(&self, source_id: Uuid, target_id: Uuid) -> Result<ReconciledFields> {
        if source_id == target_id {
            return Err(Error::InvalidArgument(format!(
                "cannot reconcile contractor {} with itself",
                source_id
            )));
        }

        let source = self.get_contractor(source_id).await?;
        let target = self.get_contractor(target_id).await?;
        let fields = reconcile(&source, &target);

        if fields.is_noop_for(&target) {
            debug!(target_id = %target_id, "Reconciliation left target unchanged");
        } else {
            self.apply_reconciliation(target_id, &fields).await?;
        }
        Ok(fields)
    }

    pub async fn apply_reconciliation(&self, target_id: Uuid, fields: &ReconciledFields) -> Result<()> {
        contractors::apply_reconciled_fields(&self.pool, target_id, fields).await?;
        info!(contractor_id = %target_id, "Applied reconciled contact fields");
        Ok(())
    }

    pub async fn soft_delete_contractor(&self, guid: Uuid) -> Result<()> {
        contractors::soft_delete_contractor(&self.pool, guid).await
    }

    pub async fn set_review_pending(&self, guid: Uuid, pending: bool) -> Result<()> {
        contractors::set_review_pending(&self.pool, guid, pending).await
    }

    // ========================================================================
    // Availability sessions
    // ========================================================================

    pub async fn start_new_availability_session(&self, label: Option<&str>) -> Result<AvailabilitySession> {
        self.sessions.start_new_session(label).await
    }

    pub async fn close_availability_session(&self, session_id: Uuid) -> Result<AvailabilitySession> {
        self.sessions.close_session(session_id).await
    }

    pub async fn assign_unassigned_to_session(&self, session_id: Uuid) -> Result<AssignmentReport> {
        self.sessions.assign_unassigned_to_session(session_id).await
    }

    pub async fn get_crew_availability_by_session(
        &self,
        selector: SessionSelector,
    ) -> Result<Vec<CrewAvailability>> {
        self.sessions.get_crew_availability_by_session(selector).await
    }

    pub async fn get_equipment_availability_by_session(
        &self,
        selector: SessionSelector,
    ) -> Result<Vec<EquipmentAvailability>> {
        self.sessions.get_equipment_availability_by_session(selector).await
    }

    pub async fn list_availability_sessions(&self) -> Result<Vec<AvailabilitySession>> {
        self.sessions.list_sessions().await
    }

    pub async fn active_availability_session(&self) -> Result<Option<AvailabilitySession>> {
        self.sessions.active_session().await
    }

    pub async fn record_crew_availability(&self, record: CrewAvailability) -> Result<CrewAvailability> {
        self.sessions.record_crew_availability(record).await
    }

    pub async fn record_equipment_availability(
        &self,
        record: EquipmentAvailability,
    ) -> Result<EquipmentAvailability> {
        self.sessions.record_equipment_availability(record).await
    }

    /// Soft-delete a crew submission; NotFound if it is missing or already deleted
    pub async fn delete_crew_availability(&self, guid: Uuid) -> Result<()> {
        if !availability::soft_delete_crew_availability(&self.pool, guid).await? {
            return Err(Error::NotFound(format!("crew availability {}", guid)));
        }
        debug!(availability_id = %guid, "Deleted crew availability");
        Ok(())
    }

    /// Soft-delete an equipment submission; NotFound if it is missing or already deleted
    pub async fn delete_equipment_availability(&self, guid: Uuid) -> Result<()> {
        if !availability::soft_delete_equipment_availability(&self.pool, guid).await? {
            return Err(Error::NotFound(format!("equipment availability {}", guid)));
        }
        debug!(availability_id = %guid, "Deleted equipment availability");
        Ok(())
    }
}
