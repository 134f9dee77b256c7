use chrono::Utc;
use rusqlite::{params, params_from_iter, Row};

use keydash_core::api_key::{ApiKey, KeyStatus, NewApiKey, UpdateApiKey};

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_api_key(row: &Row) -> rusqlite::Result<ApiKey> {
    let status_str: String = row.get("status")?;
    Ok(ApiKey {
        id: row.get("id")?,
        name: row.get("name")?,
        key: row.get("key")?,
        created_at: row.get("created_at")?,
        last_used: row.get("last_used")?,
        status: KeyStatus::parse_str(&status_str).unwrap_or_default(),
    })
}

fn not_found(id: &str) -> DbError {
    DbError::NotFound(format!("api_key {id}"))
}

impl SqliteDatabase {
    pub fn insert_api_key_sync(&self, input: &NewApiKey) -> Result<ApiKey, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO api_keys (id, name, key, created_at, status) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, input.name, input.key, now, input.status.as_str()],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM api_keys WHERE id = ?1",
                params![id],
                row_to_api_key,
            )
            .to_db()
        })
    }

    pub fn get_api_key_sync(&self, id: &str) -> Result<ApiKey, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM api_keys WHERE id = ?1",
                params![id],
                row_to_api_key,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => not_found(id),
                other => DbError::Internal(other.to_string()),
            })
        })
    }

    pub fn find_api_key_by_key_sync(&self, key: &str) -> Result<Option<ApiKey>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM api_keys WHERE key = ?1 LIMIT 2")
                .to_db()?;
            let mut matches = stmt
                .query_map(params![key], row_to_api_key)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            if matches.len() > 1 {
                return Err(DbError::Internal(
                    "multiple api_keys rows share the same key".into(),
                ));
            }
            Ok(matches.pop())
        })
    }

    pub fn list_api_keys_sync(&self) -> Result<Vec<ApiKey>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM api_keys ORDER BY created_at DESC, rowid DESC")
                .to_db()?;
            let keys = stmt
                .query_map([], row_to_api_key)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(keys)
        })
    }

    pub fn update_api_key_sync(&self, id: &str, update: &UpdateApiKey) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let mut sets = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(ref name) = update.name {
                sets.push("name = ?");
                values.push(Box::new(name.clone()));
            }
            if let Some(ref key) = update.key {
                sets.push("key = ?");
                values.push(Box::new(key.clone()));
            }
            if let Some(status) = update.status {
                sets.push("status = ?");
                values.push(Box::new(status.as_str().to_string()));
            }
            if let Some(last_used) = update.last_used {
                sets.push("last_used = ?");
                values.push(Box::new(last_used));
            }

            if sets.is_empty() {
                let exists: i64 = conn
                    .query_row(
                        "SELECT COUNT(*) FROM api_keys WHERE id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .to_db()?;
                return if exists > 0 { Ok(()) } else { Err(not_found(id)) };
            }

            values.push(Box::new(id.to_string()));
            let sql = format!("UPDATE api_keys SET {} WHERE id = ?", sets.join(", "));
            let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
            let changed = conn.execute(&sql, params.as_slice()).to_db()?;
            if changed == 0 {
                return Err(not_found(id));
            }
            Ok(())
        })
    }

    pub fn delete_api_key_sync(&self, id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM api_keys WHERE id = ?1", params![id])
                .to_db()?;
            Ok(())
        })
    }

    pub fn delete_api_keys_sync(&self, ids: &[String]) -> Result<(), DbError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!("DELETE FROM api_keys WHERE id IN ({placeholders})");
            conn.execute(&sql, params_from_iter(ids.iter())).to_db()?;
            Ok(())
        })
    }
}
