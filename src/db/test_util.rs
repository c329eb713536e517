//! Shared helpers for tests that need a migrated database and seed rows.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::db::models::{CareRelationship, EstablishedVia, RelationshipKind, User};
use crate::db::repository::{CareRelationshipRepository, UserRepository};

/// In-memory SQLite pool with migrations applied. A single connection keeps
/// every query in the test on the same in-memory database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory sqlite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    pool
}

pub async fn create_user(pool: &SqlitePool, email: &str, display_name: &str) -> User {
    UserRepository::create(pool, email, "not-a-real-hash", display_name)
        .await
        .expect("failed to create user")
}

pub async fn create_relationship(
    pool: &SqlitePool,
    caregiver_id: &str,
    user_id: &str,
    is_primary: bool,
) -> CareRelationship {
    CareRelationshipRepository::create(
        pool,
        caregiver_id,
        user_id,
        RelationshipKind::Guardian,
        is_primary,
        EstablishedVia::Manual,
    )
    .await
    .expect("failed to create relationship")
}
