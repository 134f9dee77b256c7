use std::sync::Arc;

use async_trait::async_trait;
use keydash_core::api_key::{
    ApiKey, CreateApiKey, UpdateApiKey, ValidationOutcome, DEFAULT_KEY_PREFIX,
};
use keydash_db::Database;
use tracing::{debug, info, warn};

use crate::fingerprint::key_fingerprint;
use crate::{KeyService, ServiceError};

/// Local implementation backed by a direct `Database` handle.
pub struct LocalService {
    db: Arc<dyn Database>,
    key_prefix: String,
}

impl LocalService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    /// Use `prefix` for keys generated on create.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

impl From<keydash_db::DbError> for ServiceError {
    fn from(e: keydash_db::DbError) -> Self {
        match e {
            keydash_db::DbError::NotFound(msg) => ServiceError::NotFound(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

#[async_trait]
impl KeyService for LocalService {
    async fn list_keys(&self) -> Result<Vec<ApiKey>, ServiceError> {
        Ok(self.db.list_api_keys().await?)
    }

    async fn get_key(&self, id: &str) -> Result<ApiKey, ServiceError> {
        Ok(self.db.get_api_key(id).await?)
    }

    async fn create_key(&self, input: &CreateApiKey) -> Result<ApiKey, ServiceError> {
        let resolved = input.resolve(&self.key_prefix);
        let created = self.db.insert_api_key(&resolved).await?;
        info!(
            id = %created.id,
            name = %created.name,
            fingerprint = %key_fingerprint(&created.key),
            "api key created"
        );
        Ok(created)
    }

    async fn update_key(&self, id: &str, update: &UpdateApiKey) -> Result<(), ServiceError> {
        if update.key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            return Err(ServiceError::InvalidInput("key must not be empty".into()));
        }
        self.db.update_api_key(id, update).await?;
        debug!(id, status = ?update.status, "api key updated");
        Ok(())
    }

    async fn delete_key(&self, id: &str) -> Result<(), ServiceError> {
        self.db.delete_api_key(id).await?;
        info!(id, "api key deleted");
        Ok(())
    }

    async fn delete_keys(&self, ids: &[String]) -> Result<(), ServiceError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.db.delete_api_keys(ids).await?;
        info!(count = ids.len(), "api keys deleted");
        Ok(())
    }

    async fn validate_key(&self, key: &str) -> ValidationOutcome {
        let key = key.trim();
        if key.is_empty() {
            return ValidationOutcome::Invalid;
        }
        match self.db.find_api_key_by_key(key).await {
            Ok(Some(found)) => ValidationOutcome::for_status(found.status),
            Ok(None) => ValidationOutcome::Invalid,
            Err(e) => {
                warn!(fingerprint = %key_fingerprint(key), error = %e, "api key lookup failed");
                ValidationOutcome::Invalid
            }
        }
    }
}
