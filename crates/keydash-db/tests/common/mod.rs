// Backend-agnostic integration tests for the Database trait.
//
// Each public async function accepts `&dyn Database` so that the same logic
// can be exercised against both the SQLite and Postgres backends.

use std::time::Duration;

use chrono::Utc;
use keydash_core::api_key::{KeyStatus, NewApiKey, UpdateApiKey};
use keydash_db::{Database, DbError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_key(name: &str, key: &str) -> NewApiKey {
    NewApiKey {
        name: name.to_string(),
        key: key.to_string(),
        status: KeyStatus::Active,
    }
}

// ---------------------------------------------------------------------------
// API key tests
// ---------------------------------------------------------------------------

/// Insert, get, list, update, delete.
pub async fn test_api_key_crud(db: &dyn Database) {
    let created = db.insert_api_key(&make_key("n", "k")).await.unwrap();
    assert_eq!(created.name, "n");
    assert_eq!(created.key, "k");
    assert_eq!(created.status, KeyStatus::Active);
    assert!(created.last_used.is_none());

    let fetched = db.get_api_key(&created.id).await.unwrap();
    assert_eq!(fetched.id, created.id);

    let all = db.list_api_keys().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "n");

    db.update_api_key(
        &created.id,
        &UpdateApiKey {
            name: Some("renamed".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let renamed = db.get_api_key(&created.id).await.unwrap();
    assert_eq!(renamed.name, "renamed");
    assert_eq!(renamed.key, "k");

    db.delete_api_key(&created.id).await.unwrap();
    assert!(db.list_api_keys().await.unwrap().is_empty());
    assert!(matches!(
        db.get_api_key(&created.id).await,
        Err(DbError::NotFound(_))
    ));
}

/// Listing is newest first.
pub async fn test_list_newest_first(db: &dyn Database) {
    let first = db.insert_api_key(&make_key("first", "k1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = db.insert_api_key(&make_key("second", "k2")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let third = db.insert_api_key(&make_key("third", "k3")).await.unwrap();

    let ids: Vec<String> = db
        .list_api_keys()
        .await
        .unwrap()
        .into_iter()
        .map(|k| k.id)
        .collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);
}

/// Only the provided fields change.
pub async fn test_partial_update(db: &dyn Database) {
    let created = db.insert_api_key(&make_key("keep", "old")).await.unwrap();
    let used_at = Utc::now();

    db.update_api_key(
        &created.id,
        &UpdateApiKey {
            key: Some("new".into()),
            status: Some(KeyStatus::Inactive),
            last_used: Some(used_at),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let updated = db.get_api_key(&created.id).await.unwrap();
    assert_eq!(updated.name, "keep");
    assert_eq!(updated.key, "new");
    assert_eq!(updated.status, KeyStatus::Inactive);
    let last_used = updated.last_used.expect("last_used set");
    assert!((last_used - used_at).num_milliseconds().abs() < 1000);
    assert_eq!(
        updated.created_at.timestamp_millis(),
        created.created_at.timestamp_millis()
    );

    // Empty update is a no-op on an existing row.
    db.update_api_key(&created.id, &UpdateApiKey::default())
        .await
        .unwrap();
}

/// Updating an unknown id reports NotFound.
pub async fn test_update_missing(db: &dyn Database) {
    let result = db
        .update_api_key(
            "does-not-exist",
            &UpdateApiKey {
                name: Some("x".into()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(DbError::NotFound(_))));
}

/// Exact-match lookup by key string.
pub async fn test_find_by_key(db: &dyn Database) {
    let created = db.insert_api_key(&make_key("a", "sk-exact")).await.unwrap();

    let found = db.find_api_key_by_key("sk-exact").await.unwrap().unwrap();
    assert_eq!(found.id, created.id);

    assert!(db.find_api_key_by_key("sk-exac").await.unwrap().is_none());
    assert!(db.find_api_key_by_key("SK-EXACT").await.unwrap().is_none());
}

/// Bulk delete removes exactly the listed ids; an empty set does nothing.
pub async fn test_delete_many(db: &dyn Database) {
    let a = db.insert_api_key(&make_key("a", "ka")).await.unwrap();
    let b = db.insert_api_key(&make_key("b", "kb")).await.unwrap();
    let c = db.insert_api_key(&make_key("c", "kc")).await.unwrap();

    db.delete_api_keys(&[]).await.unwrap();
    assert_eq!(db.list_api_keys().await.unwrap().len(), 3);

    db.delete_api_keys(&[a.id.clone(), b.id.clone()]).await.unwrap();
    let remaining = db.list_api_keys().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, c.id);
}

/// Deleting an id that is already gone is not an error.
pub async fn test_delete_missing(db: &dyn Database) {
    db.delete_api_key("never-existed").await.unwrap();
}

/// Inactive status survives a round trip through the store.
pub async fn test_insert_inactive(db: &dyn Database) {
    let created = db
        .insert_api_key(&NewApiKey {
            name: "off".into(),
            key: "k-off".into(),
            status: KeyStatus::Inactive,
        })
        .await
        .unwrap();
    let found = db.find_api_key_by_key("k-off").await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.status, KeyStatus::Inactive);
}
