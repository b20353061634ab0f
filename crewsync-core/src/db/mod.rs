//! Database access for contractors, sessions and availability

pub mod availability;
pub mod contractors;
pub mod sessions;

pub use availability::SessionFilter;

#[cfg(test)]
pub(crate) async fn test_pool() -> sqlx::SqlitePool {
    // One connection: each new in-memory connection would be a separate database
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    crewsync_common::db::create_schema(&pool).await.unwrap();
    pool
}
