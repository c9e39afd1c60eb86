use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;

use crate::{db, storage::ReceiptStore, structs::StatusPolicy, AppState};

pub const TEST_MAX_UPLOAD_BYTES: usize = 64 * 1024;

/// Fresh in-memory database (migrated, admin seeded) and an empty upload
/// directory that lives as long as the returned `TempDir`.
pub async fn test_state() -> (AppState, TempDir) {
    test_state_with_policy(StatusPolicy::Permissive).await
}

pub async fn test_state_with_policy(status_policy: StatusPolicy) -> (AppState, TempDir) {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("memory url")
        .foreign_keys(true);
    // one connection that is never recycled, otherwise the in-memory db vanishes
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(opts)
        .await
        .expect("connect to in-memory sqlite");
    sqlx::migrate!().run(&db_pool).await.expect("Migrate Error");

    let dir = tempfile::tempdir().expect("temp upload dir");
    let state = AppState {
        db_pool,
        receipts: ReceiptStore::new(dir.path()),
        status_policy,
        max_upload_bytes: TEST_MAX_UPLOAD_BYTES,
    };
    db::bootstrap_admin(&state).await.expect("seed admin");
    (state, dir)
}
