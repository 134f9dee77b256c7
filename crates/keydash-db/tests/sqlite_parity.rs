// Integration tests that exercise every Database trait method against the
// in-memory SQLite backend.  The actual test logic lives in `common/mod.rs`
// so that the same assertions can be re-used for Postgres.

mod common;

use std::sync::Arc;
use keydash_db::Database;

async fn make_db() -> Arc<dyn Database> {
    Arc::new(keydash_db::SqliteDatabase::open_in_memory().unwrap())
}

#[tokio::test]
async fn api_key_crud() {
    let db = make_db().await;
    common::test_api_key_crud(&*db).await;
}

#[tokio::test]
async fn list_newest_first() {
    let db = make_db().await;
    common::test_list_newest_first(&*db).await;
}

#[tokio::test]
async fn partial_update() {
    let db = make_db().await;
    common::test_partial_update(&*db).await;
}

#[tokio::test]
async fn update_missing() {
    let db = make_db().await;
    common::test_update_missing(&*db).await;
}

#[tokio::test]
async fn find_by_key() {
    let db = make_db().await;
    common::test_find_by_key(&*db).await;
}

#[tokio::test]
async fn delete_many() {
    let db = make_db().await;
    common::test_delete_many(&*db).await;
}

#[tokio::test]
async fn delete_missing() {
    let db = make_db().await;
    common::test_delete_missing(&*db).await;
}

#[tokio::test]
async fn insert_inactive() {
    let db = make_db().await;
    common::test_insert_inactive(&*db).await;
}

#[tokio::test]
async fn open_database_uses_sqlite_path() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested").join("keys.db");
    let config = keydash_db::DbConfig {
        sqlite_path: Some(path.to_string_lossy().to_string()),
        ..Default::default()
    };
    let db = keydash_db::open_database(&config).await.unwrap();
    common::test_api_key_crud(&*db).await;
    assert!(path.exists());
}
