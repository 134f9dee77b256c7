use async_trait::async_trait;
use chrono::Utc;
use keydash_core::api_key::{ApiKey, CreateApiKey, KeyStatus, UpdateApiKey, ValidationOutcome};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Lifecycle and validation of stored API keys.
///
/// `LocalService` talks to a `Database` directly; `HttpService` drives a
/// running keydash-server over its REST API. No operation retries.
#[async_trait]
pub trait KeyService: Send + Sync {
    /// Every key, newest first. Callers paginate.
    async fn list_keys(&self) -> Result<Vec<ApiKey>, ServiceError>;
    async fn get_key(&self, id: &str) -> Result<ApiKey, ServiceError>;
    async fn create_key(&self, input: &CreateApiKey) -> Result<ApiKey, ServiceError>;
    async fn update_key(&self, id: &str, update: &UpdateApiKey) -> Result<(), ServiceError>;
    async fn delete_key(&self, id: &str) -> Result<(), ServiceError>;
    /// An empty slice is a no-op.
    async fn delete_keys(&self, ids: &[String]) -> Result<(), ServiceError>;
    /// Never fails: lookup errors come back as `Invalid`.
    async fn validate_key(&self, key: &str) -> ValidationOutcome;

    /// Flip the status the caller believes is current.
    ///
    /// This is not a compare-and-swap: the store is never re-read, so two
    /// concurrent toggles from the same stale view both write the same value.
    async fn toggle_key_status(
        &self,
        id: &str,
        current_status: KeyStatus,
    ) -> Result<(), ServiceError> {
        let update = UpdateApiKey {
            status: Some(current_status.toggled()),
            ..Default::default()
        };
        self.update_key(id, &update).await
    }

    /// Stamp `last_used` with the current time.
    async fn touch_key(&self, id: &str) -> Result<(), ServiceError> {
        let update = UpdateApiKey {
            last_used: Some(Utc::now()),
            ..Default::default()
        };
        self.update_key(id, &update).await
    }
}
