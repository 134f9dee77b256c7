use chrono::{DateTime, Utc};

use keydash_core::api_key::{ApiKey, KeyStatus, NewApiKey, UpdateApiKey};

use super::super::{pg_err, pg_not_found, PostgresDatabase};
use crate::DbError;

#[derive(sqlx::FromRow)]
struct ApiKeyRow {
    id: String,
    name: String,
    key: String,
    created_at: DateTime<Utc>,
    last_used: Option<DateTime<Utc>>,
    status: String,
}

impl From<ApiKeyRow> for ApiKey {
    fn from(r: ApiKeyRow) -> Self {
        ApiKey {
            id: r.id,
            name: r.name,
            key: r.key,
            created_at: r.created_at,
            last_used: r.last_used,
            status: KeyStatus::parse_str(&r.status).unwrap_or_default(),
        }
    }
}

impl PostgresDatabase {
    pub(crate) async fn pg_insert_api_key(&self, input: &NewApiKey) -> Result<ApiKey, DbError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let row = sqlx::query_as::<_, ApiKeyRow>(
            "INSERT INTO api_keys (id, name, key, created_at, status)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(&id)
        .bind(&input.name)
        .bind(&input.key)
        .bind(now)
        .bind(input.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(pg_err)?;

        Ok(row.into())
    }

    pub(crate) async fn pg_get_api_key(&self, id: &str) -> Result<ApiKey, DbError> {
        sqlx::query_as::<_, ApiKeyRow>("SELECT * FROM api_keys WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(pg_err)?
            .map(Into::into)
            .ok_or_else(|| pg_not_found(&format!("api_key {id}")))
    }

    pub(crate) async fn pg_find_api_key_by_key(
        &self,
        key: &str,
    ) -> Result<Option<ApiKey>, DbError> {
        let mut rows =
            sqlx::query_as::<_, ApiKeyRow>("SELECT * FROM api_keys WHERE key = $1 LIMIT 2")
                .bind(key)
                .fetch_all(&self.pool)
                .await
                .map_err(pg_err)?;

        if rows.len() > 1 {
            return Err(DbError::Internal(
                "multiple api_keys rows share the same key".into(),
            ));
        }
        Ok(rows.pop().map(Into::into))
    }

    pub(crate) async fn pg_list_api_keys(&self) -> Result<Vec<ApiKey>, DbError> {
        let rows =
            sqlx::query_as::<_, ApiKeyRow>("SELECT * FROM api_keys ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(pg_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub(crate) async fn pg_update_api_key(
        &self,
        id: &str,
        update: &UpdateApiKey,
    ) -> Result<(), DbError> {
        if update.is_empty() {
            return self.pg_get_api_key(id).await.map(|_| ());
        }

        let result = sqlx::query(
            "UPDATE api_keys SET
                name      = COALESCE($1, name),
                key       = COALESCE($2, key),
                status    = COALESCE($3, status),
                last_used = COALESCE($4, last_used)
             WHERE id = $5",
        )
        .bind(update.name.as_deref())
        .bind(update.key.as_deref())
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.last_used)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(pg_err)?;

        if result.rows_affected() == 0 {
            return Err(pg_not_found(&format!("api_key {id}")));
        }
        Ok(())
    }

    pub(crate) async fn pg_delete_api_key(&self, id: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    pub(crate) async fn pg_delete_api_keys(&self, ids: &[String]) -> Result<(), DbError> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query("DELETE FROM api_keys WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(())
    }
}
