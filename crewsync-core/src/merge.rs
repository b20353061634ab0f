//! Merge coordinator
//!
//! Re-points every dependent row from a duplicate contractor onto the surviving
//! one inside a single transaction. Field content is never touched here (see
//! `reconcile`), and the source record is left in place, reference-free.

use async_trait::async_trait;
use crewsync_common::error::in_transaction;
use crewsync_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::contractors::load_contractor;

/// Re-points one dependent entity type's contractor reference
#[async_trait]
pub trait ReferenceMigrator: Send + Sync {
    /// Entity name used in reports and logs
    fn entity(&self) -> &str;

    /// Move every `source` reference to `target` on the open transaction's connection.
    /// Returns the number of rows re-pointed.
    async fn migrate(
        &self,
        conn: &mut SqliteConnection,
        source: Uuid,
        target: Uuid,
    ) -> std::result::Result<u64, sqlx::Error>;

    /// Count rows (soft-deleted included) that reference `contractor_id`
    async fn count_references(
        &self,
        conn: &mut SqliteConnection,
        contractor_id: Uuid,
    ) -> std::result::Result<u64, sqlx::Error>;
}

/// Migrator for the common `table.column = contractor id` shape
///
/// `table` and `column` are interpolated into SQL and must be trusted identifiers.
#[derive(Debug, Clone)]
pub struct ColumnReferenceMigrator {
    entity: String,
    table: String,
    column: String,
}

impl ColumnReferenceMigrator {
    pub fn new(entity: impl Into<String>, table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            table: table.into(),
            column: column.into(),
        }
    }

    /// Migrator where the entity is named after its table and the column is `contractor_id`
    pub fn contractor_id(table: &str) -> Self {
        Self::new(table, table, "contractor_id")
    }
}

#[async_trait]
impl ReferenceMigrator for ColumnReferenceMigrator {
    fn entity(&self) -> &str {
        &self.entity
    }

    async fn migrate(
        &self,
        conn: &mut SqliteConnection,
        source: Uuid,
        target: Uuid,
    ) -> std::result::Result<u64, sqlx::Error> {
        let sql = format!(
            r#"UPDATE "{table}" SET "{column}" = ? WHERE "{column}" = ?"#,
            table = self.table,
            column = self.column
        );
        let result = sqlx::query(&sql)
            .bind(target.to_string())
            .bind(source.to_string())
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_references(
        &self,
        conn: &mut SqliteConnection,
        contractor_id: Uuid,
    ) -> std::result::Result<u64, sqlx::Error> {
        let sql = format!(
            r#"SELECT COUNT(*) FROM "{table}" WHERE "{column}" = ?"#,
            table = self.table,
            column = self.column
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(contractor_id.to_string())
            .fetch_one(conn)
            .await?;

        Ok(count.max(0) as u64)
    }
}

/// Tables holding a contractor reference in the base schema
pub const DEFAULT_DEPENDENT_TABLES: [&str; 6] = [
    "contractor_files",
    "contractor_reviews",
    "users",
    "crew_availability",
    "equipment_availability",
    "contractor_equipment",
];

/// Rows counted for one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCount {
    pub entity: String,
    pub rows: u64,
}

/// Outcome of a committed merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub entities: Vec<EntityCount>,
    pub total_rows: u64,
}

impl MergeReport {
    /// Rows re-pointed for `entity`, zero if it was not migrated
    pub fn rows_for(&self, entity: &str) -> u64 {
        self.entities
            .iter()
            .find(|e| e.entity == entity)
            .map(|e| e.rows)
            .unwrap_or(0)
    }
}

/// References still pointing at one contractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCounts {
    pub contractor_id: Uuid,
    pub entities: Vec<EntityCount>,
    pub total: u64,
}

impl ReferenceCounts {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Registry of reference migrators run together on merge
pub struct MergeCoordinator {
    migrators: Vec<Box<dyn ReferenceMigrator>>,
}

impl MergeCoordinator {
    /// Coordinator with no migrators registered
    pub fn new() -> Self {
        Self {
            migrators: Vec::new(),
        }
    }

    /// Coordinator covering every dependent table of the base schema
    pub fn with_default_migrators() -> Self {
        let mut coordinator = Self::new();
        for table in DEFAULT_DEPENDENT_TABLES {
            coordinator.register(ColumnReferenceMigrator::contractor_id(table));
        }
        coordinator
    }

    /// Add a migrator; it runs after those already registered
    pub fn register(&mut self, migrator: impl ReferenceMigrator + 'static) {
        self.migrators.push(Box::new(migrator));
    }

    /// Registered entity names, in execution order
    pub fn entities(&self) -> Vec<&str> {
        self.migrators.iter().map(|m| m.entity()).collect()
    }

    /// Re-point every dependent reference from `source_id` to `target_id`
    ///
    /// Either every registered migrator succeeds and the transaction commits, or
    /// nothing changes. Both contractors must exist and not be soft-deleted.
    pub async fn merge(
        &self,
        pool: &SqlitePool,
        source_id: Uuid,
        target_id: Uuid,
    ) -> Result<MergeReport> {
        if source_id == target_id {
            return Err(Error::InvalidArgument(format!(
                "cannot merge contractor {} into itself",
                source_id
            )));
        }

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| Error::aborted("merge", e))?;

        for (role, id) in [("source", source_id), ("target", target_id)] {
            let existing = load_contractor(&mut *tx, id)
                .await
                .map_err(in_transaction("merge"))?;
            if existing.is_none() {
                return Err(Error::NotFound(format!("{} contractor {}", role, id)));
            }
        }

        let mut entities = Vec::with_capacity(self.migrators.len());
        let mut total_rows = 0;

        for migrator in &self.migrators {
            let rows = match migrator.migrate(&mut *tx, source_id, target_id).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(
                        entity = migrator.entity(),
                        source_id = %source_id,
                        target_id = %target_id,
                        error = %e,
                        "Merge failed; rolling back"
                    );
                    return Err(Error::aborted(
                        format!("merge ({})", migrator.entity()),
                        e,
                    ));
                }
            };

            debug!(entity = migrator.entity(), rows, "Re-pointed references");
            total_rows += rows;
            entities.push(EntityCount {
                entity: migrator.entity().to_string(),
                rows,
            });
        }

        tx.commit().await.map_err(|e| Error::aborted("merge", e))?;

        info!(
            source_id = %source_id,
            target_id = %target_id,
            total_rows,
            "Merged contractor references"
        );

        Ok(MergeReport {
            source_id,
            target_id,
            entities,
            total_rows,
        })
    }

    /// Count rows still referencing `contractor_id` across every registered entity
    pub async fn remaining_references(
        &self,
        pool: &SqlitePool,
        contractor_id: Uuid,
    ) -> Result<ReferenceCounts> {
        let mut conn = pool.acquire().await?;
        let mut entities = Vec::with_capacity(self.migrators.len());
        let mut total = 0;

        for migrator in &self.migrators {
            let rows = migrator.count_references(&mut *conn, contractor_id).await?;
            total += rows;
            entities.push(EntityCount {
                entity: migrator.entity().to_string(),
                rows,
            });
        }

        Ok(ReferenceCounts {
            contractor_id,
            entities,
            total,
        })
    }
}

impl Default for MergeCoordinator {
    fn default() -> Self {
        Self::with_default_migrators()
    }
}

impl std::fmt::Debug for MergeCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeCoordinator")
            .field("entities", &self.entities())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::contractors::insert_contractor;
    use crate::db::test_pool;
    use crewsync_common::db::Contractor;

    async fn contractor(pool: &SqlitePool, company: &str) -> Uuid {
        let c = Contractor::new(company, "Owner");
        insert_contractor(pool, &c).await.unwrap();
        c.guid
    }

    async fn add_file(pool: &SqlitePool, contractor_id: Uuid, deleted: bool) {
        sqlx::query(
            "INSERT INTO contractor_files (guid, contractor_id, file_name, uploaded_at, deleted_at) VALUES (?, ?, 'w9.pdf', '2026-01-01T00:00:00.000000Z', ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(contractor_id.to_string())
        .bind(deleted.then(|| "2026-01-02T00:00:00.000000Z"))
        .execute(pool)
        .await
        .unwrap();
    }

    #[test]
    fn test_default_registry_covers_dependent_tables() {
        let coordinator = MergeCoordinator::with_default_migrators();
        assert_eq!(coordinator.entities(), DEFAULT_DEPENDENT_TABLES.to_vec());
        assert!(MergeCoordinator::new().entities().is_empty());
    }

    #[tokio::test]
    async fn test_self_merge_rejected() {
        let pool = test_pool().await;
        let a = contractor(&pool, "Acme").await;

        let result = MergeCoordinator::default().merge(&pool, a, a).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_missing_contractor_not_found() {
        let pool = test_pool().await;
        let a = contractor(&pool, "Acme").await;

        let coordinator = MergeCoordinator::default();
        let result = coordinator.merge(&pool, a, Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        let result = coordinator.merge(&pool, Uuid::new_v4(), a).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_merge_repoints_soft_deleted_rows() {
        let pool = test_pool().await;
        let a = contractor(&pool, "Acme").await;
        let b = contractor(&pool, "Acme Corp").await;
        add_file(&pool, a, false).await;
        add_file(&pool, a, true).await;

        let coordinator = MergeCoordinator::default();
        let report = coordinator.merge(&pool, a, b).await.unwrap();
        assert_eq!(report.rows_for("contractor_files"), 2);
        assert_eq!(report.total_rows, 2);

        assert!(coordinator.remaining_references(&pool, a).await.unwrap().is_empty());
        assert_eq!(coordinator.remaining_references(&pool, b).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_failing_migrator_rolls_back() {
        let pool = test_pool().await;
        let a = contractor(&pool, "Acme").await;
        let b = contractor(&pool, "Acme Corp").await;
        add_file(&pool, a, false).await;

        let mut coordinator = MergeCoordinator::with_default_migrators();
        coordinator.register(ColumnReferenceMigrator::new(
            "invoices",
            "missing_invoices_table",
            "contractor_id",
        ));

        let err = coordinator.merge(&pool, a, b).await.unwrap_err();
        assert!(err.is_transaction_aborted());

        let defaults = MergeCoordinator::with_default_migrators();
        let remaining = defaults.remaining_references(&pool, a).await.unwrap();
        assert_eq!(remaining.total, 1);
    }

    #[tokio::test]
    async fn test_store_failure_during_existence_check_aborts() {
        let pool = test_pool().await;
        let a = contractor(&pool, "Acme").await;
        let b = contractor(&pool, "Acme Corp").await;

        sqlx::query("ALTER TABLE contractors RENAME TO contractors_gone")
            .execute(&pool)
            .await
            .unwrap();

        let err = MergeCoordinator::default().merge(&pool, a, b).await.unwrap_err();
        assert!(err.is_transaction_aborted(), "unexpected error: {:?}", err);
    }
}
