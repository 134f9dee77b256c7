#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use keydash_core::api_key::{ApiKey, NewApiKey, UpdateApiKey};

#[cfg(feature = "postgres")]
pub use postgres::PostgresDatabase;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The store capability the key service is written against.
///
/// Each call is an independent round trip; nothing here spans more than one
/// statement, so callers get no atomicity across calls.
#[async_trait]
pub trait Database: Send + Sync {
    async fn insert_api_key(&self, input: &NewApiKey) -> Result<ApiKey, DbError>;
    async fn get_api_key(&self, id: &str) -> Result<ApiKey, DbError>;
    /// Exact match on the `key` column. More than one match is an error.
    async fn find_api_key_by_key(&self, key: &str) -> Result<Option<ApiKey>, DbError>;
    /// All keys, newest first.
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError>;
    async fn update_api_key(&self, id: &str, update: &UpdateApiKey) -> Result<(), DbError>;
    /// Deleting an id that does not exist is not an error.
    async fn delete_api_key(&self, id: &str) -> Result<(), DbError>;
    async fn delete_api_keys(&self, ids: &[String]) -> Result<(), DbError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DbBackend {
    #[default]
    Sqlite,
    Postgres,
}

impl DbBackend {
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Some(DbBackend::Sqlite),
            "postgres" | "postgresql" => Some(DbBackend::Postgres),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    pub backend: DbBackend,
    /// SQLite file path. Defaults to `<data dir>/keydash.db`.
    pub sqlite_path: Option<String>,
    /// Postgres connection URL, required for the postgres backend.
    pub database_url: Option<String>,
}

/// Open the configured backend and run its migrations.
pub async fn open_database(config: &DbConfig) -> Result<Arc<dyn Database>, DbError> {
    match config.backend {
        #[cfg(feature = "sqlite")]
        DbBackend::Sqlite => {
            let db = SqliteDatabase::open(config)?;
            tracing::info!(backend = "sqlite", "database opened");
            Ok(Arc::new(db))
        }
        #[cfg(feature = "postgres")]
        DbBackend::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                DbError::Internal("DATABASE_URL is required for the postgres backend".into())
            })?;
            let db = PostgresDatabase::connect(url).await?;
            tracing::info!(backend = "postgres", "database opened");
            Ok(Arc::new(db))
        }
        #[allow(unreachable_patterns)]
        other => Err(DbError::Internal(format!(
            "backend {other:?} not compiled into this build"
        ))),
    }
}

/// Default directory for local data (`$XDG_DATA_HOME/keydash`).
pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("keydash")
}
