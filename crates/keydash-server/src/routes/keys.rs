use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use keydash_core::api_key::{CreateApiKey, KeyStatus, UpdateApiKey};
use keydash_core::listing::{filter_api_keys, paginate, DEFAULT_PER_PAGE};
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::{ApiJson, ApiQuery};
use super::{to_error, AppState};

type ApiResult<T> = Result<T, (StatusCode, Json<Value>)>;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/keys", get(list_keys).post(create_key))
        .route("/api/keys/bulk-delete", post(bulk_delete))
        .route("/api/keys/validate", post(validate_key))
        .route(
            "/api/keys/{id}",
            get(get_key).patch(update_key).delete(delete_key),
        )
        .route("/api/keys/{id}/toggle", post(toggle_key))
        .route("/api/keys/{id}/touch", post(touch_key))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    q: Option<String>,
    page: Option<usize>,
    per_page: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleBody {
    current_status: KeyStatus,
}

#[derive(Debug, Deserialize)]
struct BulkDeleteBody {
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ValidateBody {
    key: String,
}

async fn list_keys(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Value>> {
    let keys = state.service.list_keys().await.map_err(to_error)?;
    let filtered = filter_api_keys(&keys, query.q.as_deref().unwrap_or_default());
    let page = paginate(
        &filtered,
        query.page.unwrap_or(1),
        query.per_page.unwrap_or(DEFAULT_PER_PAGE),
    );
    Ok(Json(json!(page)))
}

async fn create_key(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateApiKey>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    state
        .service
        .create_key(&input)
        .await
        .map(|k| (StatusCode::CREATED, Json(json!(k))))
        .map_err(to_error)
}

async fn get_key(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    state
        .service
        .get_key(&id)
        .await
        .map(|k| Json(json!(k)))
        .map_err(to_error)
}

async fn update_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<UpdateApiKey>,
) -> ApiResult<StatusCode> {
    state
        .service
        .update_key(&id, &input)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_error)
}

async fn delete_key(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state
        .service
        .delete_key(&id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_error)
}

async fn toggle_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ToggleBody>,
) -> ApiResult<StatusCode> {
    state
        .service
        .toggle_key_status(&id, body.current_status)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_error)
}

async fn touch_key(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state
        .service
        .touch_key(&id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_error)
}

async fn bulk_delete(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<BulkDeleteBody>,
) -> ApiResult<StatusCode> {
    state
        .service
        .delete_keys(&body.ids)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_error)
}

async fn validate_key(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ValidateBody>,
) -> Json<Value> {
    let result = state.service.validate_key(&body.key).await;
    Json(json!({ "result": result }))
}
