pub(crate) mod migrations;
pub mod queries;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use keydash_core::api_key::{ApiKey, NewApiKey, UpdateApiKey};

use crate::{Database, DbError};

/// Map a sqlx::Error into a DbError::Internal.
pub(crate) fn pg_err(e: sqlx::Error) -> DbError {
    DbError::Internal(e.to_string())
}

/// Create a DbError::NotFound with the given entity description.
pub(crate) fn pg_not_found(entity: &str) -> DbError {
    DbError::NotFound(entity.to_string())
}

#[derive(Clone)]
pub struct PostgresDatabase {
    pub(crate) pool: PgPool,
}

impl PostgresDatabase {
    /// Connect to a Postgres database and run migrations.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(pg_err)?;

        let db = Self { pool };
        migrations::run(&db.pool).await?;
        Ok(db)
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn insert_api_key(&self, input: &NewApiKey) -> Result<ApiKey, DbError> {
        self.pg_insert_api_key(input).await
    }
    async fn get_api_key(&self, id: &str) -> Result<ApiKey, DbError> {
        self.pg_get_api_key(id).await
    }
    async fn find_api_key_by_key(&self, key: &str) -> Result<Option<ApiKey>, DbError> {
        self.pg_find_api_key_by_key(key).await
    }
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError> {
        self.pg_list_api_keys().await
    }
    async fn update_api_key(&self, id: &str, update: &UpdateApiKey) -> Result<(), DbError> {
        self.pg_update_api_key(id, update).await
    }
    async fn delete_api_key(&self, id: &str) -> Result<(), DbError> {
        self.pg_delete_api_key(id).await
    }
    async fn delete_api_keys(&self, ids: &[String]) -> Result<(), DbError> {
        self.pg_delete_api_keys(ids).await
    }
}
