use async_trait::async_trait;
use keydash_core::api_key::{ApiKey, CreateApiKey, KeyStatus, UpdateApiKey, ValidationOutcome};
use keydash_core::listing::Page;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::{KeyService, ServiceError};

/// Page size `list_keys` requests while walking the listing.
const LIST_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    result: ValidationOutcome,
}

/// Async HTTP client implementation of KeyService.
/// Connects to a running keydash-server.
pub struct HttpService {
    base_url: String,
    client: Client,
}

impl HttpService {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            client: Client::new(),
        }
    }

    /// Check if the server is reachable.
    pub async fn health_check(&self) -> Result<(), ServiceError> {
        let resp = self
            .client
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await
            .map_err(|e| ServiceError::Internal(format!("connection failed: {e}")))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ServiceError::Internal(format!(
                "health check failed: {}",
                resp.status()
            )))
        }
    }

    /// One page of the server-side listing, optionally filtered by `query`.
    pub async fn list_page(
        &self,
        query: Option<&str>,
        page: usize,
        per_page: usize,
    ) -> Result<Page<ApiKey>, ServiceError> {
        let mut params = vec![
            ("page", page.to_string()),
            ("perPage", per_page.to_string()),
        ];
        if let Some(q) = query {
            params.push(("q", q.to_string()));
        }
        let resp = self
            .client
            .get(format!("{}/api/keys", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        handle_response(resp).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let resp = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        handle_response(resp).await
    }

    async fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let resp = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        handle_response(resp).await
    }

    async fn send_no_content(&self, builder: reqwest::RequestBuilder) -> Result<(), ServiceError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(parse_error(resp).await)
        }
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ServiceError> {
    if resp.status().is_success() {
        resp.json()
            .await
            .map_err(|e| ServiceError::Internal(format!("decode response: {e}")))
    } else {
        Err(parse_error(resp).await)
    }
}

async fn parse_error(resp: reqwest::Response) -> ServiceError {
    let status = resp.status();
    let msg = resp
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| status.to_string());
    match status {
        StatusCode::NOT_FOUND => ServiceError::NotFound(msg),
        StatusCode::BAD_REQUEST => ServiceError::InvalidInput(msg),
        _ => ServiceError::Internal(msg),
    }
}

#[async_trait]
impl KeyService for HttpService {
    async fn list_keys(&self) -> Result<Vec<ApiKey>, ServiceError> {
        let mut keys = Vec::new();
        let mut page = 1;
        loop {
            let listing = self.list_page(None, page, LIST_PAGE_SIZE).await?;
            keys.extend(listing.items);
            if page >= listing.total_pages {
                break;
            }
            page += 1;
        }
        Ok(keys)
    }

    async fn get_key(&self, id: &str) -> Result<ApiKey, ServiceError> {
        self.get_json(&format!("/api/keys/{id}")).await
    }

    async fn create_key(&self, input: &CreateApiKey) -> Result<ApiKey, ServiceError> {
        self.post_json("/api/keys", input).await
    }

    async fn update_key(&self, id: &str, update: &UpdateApiKey) -> Result<(), ServiceError> {
        let builder = self
            .client
            .patch(format!("{}/api/keys/{id}", self.base_url))
            .json(update);
        self.send_no_content(builder).await
    }

    async fn delete_key(&self, id: &str) -> Result<(), ServiceError> {
        let builder = self
            .client
            .delete(format!("{}/api/keys/{id}", self.base_url));
        self.send_no_content(builder).await
    }

    async fn delete_keys(&self, ids: &[String]) -> Result<(), ServiceError> {
        if ids.is_empty() {
            return Ok(());
        }
        let builder = self
            .client
            .post(format!("{}/api/keys/bulk-delete", self.base_url))
            .json(&json!({ "ids": ids }));
        self.send_no_content(builder).await
    }

    async fn validate_key(&self, key: &str) -> ValidationOutcome {
        if key.trim().is_empty() {
            return ValidationOutcome::Invalid;
        }
        match self
            .post_json::<_, ValidateResponse>("/api/keys/validate", &json!({ "key": key }))
            .await
        {
            Ok(resp) => resp.result,
            Err(e) => {
                tracing::warn!(error = %e, "remote key validation failed");
                ValidationOutcome::Invalid
            }
        }
    }

    async fn toggle_key_status(
        &self,
        id: &str,
        current_status: KeyStatus,
    ) -> Result<(), ServiceError> {
        let builder = self
            .client
            .post(format!("{}/api/keys/{id}/toggle", self.base_url))
            .json(&json!({ "currentStatus": current_status }));
        self.send_no_content(builder).await
    }

    async fn touch_key(&self, id: &str) -> Result<(), ServiceError> {
        let builder = self
            .client
            .post(format!("{}/api/keys/{id}/touch", self.base_url));
        self.send_no_content(builder).await
    }
}
