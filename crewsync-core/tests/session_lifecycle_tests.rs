//! Availability session lifecycle tests against an on-disk database
//!
//! Covers:
//! - First rotation sweeping the unassigned backlog (crew and equipment)
//! - At most one active session across repeated rotations
//! - Concurrent rotations never leaving two active sessions
//! - Selector reads for active, unassigned and concrete sessions

use crewsync_common::db::init::init_database;
use crewsync_common::db::{Contractor, CrewAvailability, EquipmentAvailability};
use crewsync_common::Error;
use crewsync_core::{CrewSync, SessionSelector};
use tempfile::TempDir;
use uuid::Uuid;

async fn setup() -> (TempDir, CrewSync, Uuid) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("crewsync.db")).await.unwrap();
    let sync = CrewSync::new(pool);

    let contractor = Contractor::new("Gulf Line Services", "Maria Lopez");
    sync.add_contractor(&contractor).await.unwrap();
    (dir, sync, contractor.guid)
}

async fn active_count(sync: &CrewSync) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM availability_sessions WHERE active = 1")
        .fetch_one(sync.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_first_rotation_buckets_backlog_into_history() {
    let (_dir, sync, contractor_id) = setup().await;

    // No session exists yet, so every submission lands unassigned
    for crews in 1..=5 {
        let saved = sync
            .record_crew_availability(CrewAvailability::new(contractor_id, crews))
            .await
            .unwrap();
        assert_eq!(saved.session_id, None);
    }
    sync.record_equipment_availability(EquipmentAvailability::new(contractor_id, "Bucket truck", 4))
        .await
        .unwrap();

    let week1 = sync.start_new_availability_session(Some("Week 1")).await.unwrap();

    let unassigned = sync
        .get_crew_availability_by_session(SessionSelector::Unassigned)
        .await
        .unwrap();
    assert!(unassigned.is_empty());
    assert!(sync
        .get_equipment_availability_by_session(SessionSelector::Unassigned)
        .await
        .unwrap()
        .is_empty());

    let sessions = sync.list_availability_sessions().await.unwrap();
    assert_eq!(sessions.len(), 2);
    let historical = sessions.iter().find(|s| s.guid != week1.guid).unwrap();
    assert!(!historical.active);
    assert!(historical.label.starts_with("Historical "));
    assert!(historical.start_date <= week1.start_date);

    let swept_crew = sync
        .get_crew_availability_by_session(SessionSelector::Session(historical.guid))
        .await
        .unwrap();
    assert_eq!(swept_crew.len(), 5);
    let swept_equipment = sync
        .get_equipment_availability_by_session(historical.guid.into())
        .await
        .unwrap();
    assert_eq!(swept_equipment.len(), 1);

    // The new window starts empty
    assert!(sync
        .get_crew_availability_by_session(SessionSelector::Active)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_later_rotations_do_not_sweep() {
    let (_dir, sync, contractor_id) = setup().await;
    let week1 = sync.start_new_availability_session(Some("Week 1")).await.unwrap();
    sync.close_availability_session(week1.guid).await.unwrap();

    sync.record_crew_availability(CrewAvailability::new(contractor_id, 2))
        .await
        .unwrap();
    sync.start_new_availability_session(Some("Week 2")).await.unwrap();

    // Sessions already exist: the backlog waits for an explicit assignment
    let unassigned = sync
        .get_crew_availability_by_session(SessionSelector::Unassigned)
        .await
        .unwrap();
    assert_eq!(unassigned.len(), 1);

    let report = sync.assign_unassigned_to_session(week1.guid).await.unwrap();
    assert_eq!(report.crew_rows, 1);
    assert_eq!(report.equipment_rows, 0);
    assert_eq!(sync.assign_unassigned_to_session(week1.guid).await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_rotations_keep_single_active_session() {
    let (_dir, sync, contractor_id) = setup().await;

    let mut previous = None;
    for week in 1..=4 {
        let label = format!("Week {}", week);
        let session = sync
            .start_new_availability_session(Some(label.as_str()))
            .await
            .unwrap();
        assert_eq!(active_count(&sync).await, 1);

        let saved = sync
            .record_crew_availability(CrewAvailability::new(contractor_id, week))
            .await
            .unwrap();
        assert_eq!(saved.session_id, Some(session.guid));

        if let Some(prev) = previous.replace(session.guid) {
            let rows = sync
                .get_crew_availability_by_session(SessionSelector::Session(prev))
                .await
                .unwrap();
            assert_eq!(rows.len(), 1, "closed session lost its submission");
        }
    }

    let sessions = sync.list_availability_sessions().await.unwrap();
    assert_eq!(sessions.len(), 4);
    assert_eq!(sessions.iter().filter(|s| s.active).count(), 1);
    assert!(sessions
        .iter()
        .filter(|s| !s.active)
        .all(|s| s.closed_at.is_some() && s.end_date.is_some()));
}

#[tokio::test]
async fn test_concurrent_rotations_never_double_activate() {
    let (_dir, sync, _) = setup().await;
    sync.start_new_availability_session(Some("Seed")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..4 {
        let sync = sync.clone();
        handles.push(tokio::spawn(async move {
            let label = format!("Race {}", i);
            sync.start_new_availability_session(Some(label.as_str())).await
        }));
    }

    for handle in handles {
        // Losers abort on lock contention or the unique index
        if let Err(e) = handle.await.unwrap() {
            assert!(
                matches!(e, Error::TransactionAborted { .. }),
                "unexpected error: {:?}",
                e
            );
        }
    }

    assert_eq!(active_count(&sync).await, 1);
}

#[tokio::test]
async fn test_deleted_submissions_leave_session_reads() {
    let (_dir, sync, contractor_id) = setup().await;
    let week = sync.start_new_availability_session(Some("Week 1")).await.unwrap();

    let crew = sync
        .record_crew_availability(CrewAvailability::new(contractor_id, 3))
        .await
        .unwrap();
    let truck = sync
        .record_equipment_availability(EquipmentAvailability::new(contractor_id, "Bucket truck", 2))
        .await
        .unwrap();

    sync.delete_crew_availability(crew.guid).await.unwrap();
    sync.delete_equipment_availability(truck.guid).await.unwrap();

    assert!(sync
        .get_crew_availability_by_session(week.guid.into())
        .await
        .unwrap()
        .is_empty());
    assert!(sync
        .get_equipment_availability_by_session(SessionSelector::Active)
        .await
        .unwrap()
        .is_empty());

    // A second delete finds nothing live
    assert!(matches!(
        sync.delete_crew_availability(crew.guid).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        sync.delete_equipment_availability(Uuid::new_v4()).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_selector_errors() {
    let (_dir, sync, _) = setup().await;

    let missing = sync
        .get_crew_availability_by_session(SessionSelector::Session(Uuid::new_v4()))
        .await;
    assert!(matches!(missing, Err(Error::NotFound(_))));

    let malformed = "last-week".parse::<SessionSelector>();
    assert!(matches!(malformed, Err(Error::InvalidArgument(_))));

    // No active session reads as empty, not an error
    assert!(sync
        .get_crew_availability_by_session(SessionSelector::Active)
        .await
        .unwrap()
        .is_empty());
}
