use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::StreamExt;
use keydash_core::api_key::ValidationOutcome;
use keydash_llm::{ChatError, ChatStream};
use keydash_service::key_fingerprint;
use serde_json::{json, Map, Value};

use super::AppState;

const MISSING_CREDENTIAL: &str =
    "Missing API key. Provide it via x-api-key header, Authorization: Bearer <key>, or apiKey in body.";
const INVALID_MESSAGE: &str = "Missing or invalid \"message\" in request body";
const LEAKED_CREDENTIAL: &str = "Server configuration error: The Google API key (GOOGLE_API_KEY) used by this service has been flagged as leaked. \
The administrator must generate a new key at https://aistudio.google.com/app/apikey and restart the server with it.";
const DRY_RUN_PREVIEW_CHARS: usize = 100;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/github-summarizer", post(gated_chat))
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        if status.is_server_error() {
            tracing::error!(%status, error = %message, "chat request failed");
        } else {
            tracing::warn!(%status, error = %message, "chat request rejected");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Error mapping for the open endpoint: only missing configuration is a 503.
fn chat_error(e: ChatError) -> ApiError {
    match e {
        ChatError::Configuration(m) => ApiError::Unavailable(m),
        other => ApiError::Internal(other.to_string()),
    }
}

/// Error mapping for the gated endpoint, which also reports a leaked provider key.
fn gated_chat_error(e: ChatError) -> ApiError {
    match e {
        ChatError::LeakedCredential(m) => {
            tracing::error!(upstream = %m, "provider credential flagged as leaked");
            ApiError::Unavailable(LEAKED_CREDENTIAL.to_string())
        }
        other => chat_error(other),
    }
}

/// The non-empty string `message` field.
fn message_of(body: &Map<String, Value>) -> Result<&str, ApiError> {
    body.get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest(INVALID_MESSAGE.to_string()))
}

fn flag(body: &Map<String, Value>, name: &str) -> bool {
    body.get(name).and_then(Value::as_bool).unwrap_or(false)
}

/// Credential from `x-api-key`, then `Authorization` (optional `Bearer`), then body `apiKey`.
fn credential_from(headers: &HeaderMap, body: &Map<String, Value>) -> Option<String> {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    };

    if let Some(key) = header_value(header::HeaderName::from_static("x-api-key")) {
        return Some(key);
    }
    if let Some(auth) = header_value(header::AUTHORIZATION) {
        let key = strip_bearer(&auth).trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }
    body.get("apiKey")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
}

fn strip_bearer(value: &str) -> &str {
    match value.get(..6) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer") => {
            let rest = &value[6..];
            let trimmed = rest.trim_start();
            if trimmed.len() < rest.len() {
                trimmed
            } else {
                value
            }
        }
        _ => value,
    }
}

fn dry_run_preview(message: &str) -> String {
    let preview: String = message.chars().take(DRY_RUN_PREVIEW_CHARS).collect();
    let ellipsis = if message.chars().count() > DRY_RUN_PREVIEW_CHARS {
        "..."
    } else {
        ""
    };
    format!("[dry run] Would process: \"{preview}{ellipsis}\"")
}

fn text_stream_response(stream: ChatStream) -> Response {
    let body = stream.map(|item| match item {
        Ok(text) => Ok(Bytes::from(text)),
        Err(e) => {
            tracing::error!(error = %e, "chat stream aborted");
            Err(e)
        }
    });
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response()
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let body: Map<String, Value> = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest(INVALID_MESSAGE.to_string()))?;
    let message = message_of(&body)?;

    if flag(&body, "stream") {
        let stream = state.chat.stream(message).await.map_err(chat_error)?;
        return Ok(text_stream_response(stream));
    }

    let response = state.chat.respond(message).await.map_err(chat_error)?;
    Ok(Json(json!({ "response": response })).into_response())
}

async fn gated_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    // Unparseable bodies are treated as empty so the credential check still runs.
    let body: Map<String, Value> = serde_json::from_slice(&body).unwrap_or_default();

    let key = credential_from(&headers, &body)
        .ok_or_else(|| ApiError::Unauthorized(MISSING_CREDENTIAL.to_string()))?;

    let outcome = state.service.validate_key(&key).await;
    tracing::info!(key = %key_fingerprint(&key), %outcome, "gated chat credential checked");
    match outcome {
        ValidationOutcome::Valid => {}
        ValidationOutcome::Invalid => {
            return Err(ApiError::Unauthorized("Invalid API key".to_string()))
        }
        ValidationOutcome::Disabled => {
            return Err(ApiError::Forbidden("API key is disabled".to_string()))
        }
    }

    let message = message_of(&body)?;

    if flag(&body, "dryRun") {
        return Ok(Json(json!({
            "response": dry_run_preview(message),
            "_meta": { "dryRun": true, "messageLength": message.chars().count() },
        }))
        .into_response());
    }

    if flag(&body, "stream") {
        let stream = state.chat.stream(message).await.map_err(gated_chat_error)?;
        return Ok(text_stream_response(stream));
    }

    let response = state.chat.respond(message).await.map_err(gated_chat_error)?;
    Ok(Json(json!({ "response": response })).into_response())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use keydash_core::api_key::{CreateApiKey, KeyStatus};
    use keydash_service::KeyService;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::{dry_run_preview, strip_bearer};
    use crate::test_helpers::{mock_chat_service, spawn_mock_gemini, test_app, test_app_with_chat, TestApp};

    async fn post(app: &Router, uri: &str, headers: &[(&str, &str)], body: &str) -> (StatusCode, String) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let resp = app
            .clone()
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn json_of(body: &str) -> Value {
        serde_json::from_str(body).unwrap()
    }

    async fn seed(app: &TestApp, key: &str, status: KeyStatus) {
        app.service
            .create_key(&CreateApiKey {
                name: Some("seeded".into()),
                key: Some(key.into()),
                status: Some(status),
            })
            .await
            .unwrap();
    }

    #[test]
    fn bearer_prefix_is_case_insensitive() {
        assert_eq!(strip_bearer("Bearer abc"), "abc");
        assert_eq!(strip_bearer("bearer   abc"), "abc");
        assert_eq!(strip_bearer("BEARER abc"), "abc");
        assert_eq!(strip_bearer("Bearerabc"), "Bearerabc");
        assert_eq!(strip_bearer("abc"), "abc");
    }

    #[test]
    fn dry_run_preview_truncates_long_messages() {
        assert_eq!(dry_run_preview("hi"), "[dry run] Would process: \"hi\"");
        let long = "x".repeat(150);
        let preview = dry_run_preview(&long);
        assert_eq!(preview, format!("[dry run] Would process: \"{}...\"", "x".repeat(100)));
    }

    #[tokio::test]
    async fn chat_without_message_is_400() {
        let app = test_app().await;
        let (status, body) = post(&app.router, "/api/chat", &[], "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json_of(&body)["error"].as_str().unwrap().contains("message"));

        for bad in [r#"{"message": 42}"#, r#"{"message": ""}"#, "not json"] {
            let (status, _) = post(&app.router, "/api/chat", &[], bad).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {bad:?}");
        }
    }

    #[tokio::test]
    async fn chat_without_provider_credential_is_503() {
        let app = test_app().await;
        let (status, body) = post(&app.router, "/api/chat", &[], r#"{"message":"hi"}"#).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(json_of(&body)["error"].as_str().unwrap().contains("GOOGLE_API_KEY"));

        let (status, _) = post(&app.router, "/api/chat", &[], r#"{"message":"hi","stream":true}"#).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn chat_returns_response() {
        let base = spawn_mock_gemini().await;
        let app = test_app_with_chat(mock_chat_service(&base)).await;
        let (status, body) = post(&app.router, "/api/chat", &[], r#"{"message":"hello"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["response"], "echo: hello");
    }

    #[tokio::test]
    async fn chat_streams_plain_text() {
        let base = spawn_mock_gemini().await;
        let app = test_app_with_chat(mock_chat_service(&base)).await;
        let resp = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":"hello","stream":true}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"echo: hello");
    }

    #[tokio::test]
    async fn open_chat_reports_leaked_provider_key_as_500() {
        let base = spawn_mock_gemini().await;
        let app = test_app_with_chat(mock_chat_service(&base)).await;
        let (status, _) = post(&app.router, "/api/chat", &[], r#"{"message":"leak"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn gated_chat_without_credential_is_401() {
        let app = test_app().await;
        let (status, body) = post(&app.router, "/api/github-summarizer", &[], r#"{"message":"hi"}"#).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(json_of(&body)["error"].as_str().unwrap().starts_with("Missing API key"));
    }

    #[tokio::test]
    async fn gated_chat_with_bad_key_is_401() {
        let app = test_app().await;
        let (status, body) = post(
            &app.router,
            "/api/github-summarizer",
            &[("x-api-key", "bad-key")],
            r#"{"message":"hi"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid API key"));
    }

    #[tokio::test]
    async fn gated_chat_with_inactive_key_is_403() {
        let app = test_app().await;
        seed(&app, "sk-off", KeyStatus::Inactive).await;
        let (status, body) = post(
            &app.router,
            "/api/github-summarizer",
            &[("x-api-key", "sk-off")],
            r#"{"message":"hi"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("disabled"));
    }

    #[tokio::test]
    async fn gated_chat_dry_run_echoes_message() {
        let app = test_app().await;
        seed(&app, "sk-live", KeyStatus::Active).await;
        let (status, body) = post(
            &app.router,
            "/api/github-summarizer",
            &[("x-api-key", "sk-live")],
            r#"{"message":"hi","dryRun":true}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let v = json_of(&body);
        assert!(v["response"]
            .as_str()
            .unwrap()
            .starts_with("[dry run] Would process: \"hi\""));
        assert_eq!(v["_meta"]["dryRun"], true);
        assert_eq!(v["_meta"]["messageLength"], 2);
    }

    #[tokio::test]
    async fn gated_chat_accepts_bearer_and_body_credentials() {
        let app = test_app().await;
        seed(&app, "sk-live", KeyStatus::Active).await;
        let body = r#"{"message":"hi","dryRun":true}"#;

        let (status, _) = post(
            &app.router,
            "/api/github-summarizer",
            &[("authorization", "bearer sk-live")],
            body,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post(
            &app.router,
            "/api/github-summarizer",
            &[],
            r#"{"message":"hi","dryRun":true,"apiKey":"  sk-live "}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn header_credential_takes_precedence_over_body() {
        let app = test_app().await;
        seed(&app, "sk-live", KeyStatus::Active).await;
        let (status, _) = post(
            &app.router,
            "/api/github-summarizer",
            &[("x-api-key", "bad-key")],
            r#"{"message":"hi","dryRun":true,"apiKey":"sk-live"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn gated_chat_checks_message_after_credential() {
        let app = test_app().await;
        seed(&app, "sk-live", KeyStatus::Active).await;

        let (status, _) = post(
            &app.router,
            "/api/github-summarizer",
            &[("x-api-key", "sk-live")],
            "{}",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Malformed JSON counts as an empty body, so the credential is checked first.
        let (status, _) = post(&app.router, "/api/github-summarizer", &[], "{oops").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn gated_chat_reports_leaked_provider_key() {
        let base = spawn_mock_gemini().await;
        let app = test_app_with_chat(mock_chat_service(&base)).await;
        seed(&app, "sk-live", KeyStatus::Active).await;

        let (status, body) = post(
            &app.router,
            "/api/github-summarizer",
            &[("x-api-key", "sk-live")],
            r#"{"message":"leak"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(json_of(&body)["error"]
            .as_str()
            .unwrap()
            .contains("flagged as leaked"));
    }

    #[tokio::test]
    async fn gated_chat_forwards_valid_requests() {
        let base = spawn_mock_gemini().await;
        let app = test_app_with_chat(mock_chat_service(&base)).await;
        seed(&app, "sk-live", KeyStatus::Active).await;

        let (status, body) = post(
            &app.router,
            "/api/github-summarizer",
            &[("x-api-key", "sk-live")],
            r#"{"message":"summarize this"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["response"], "echo: summarize this");

        let (status, body) = post(
            &app.router,
            "/api/github-summarizer",
            &[("x-api-key", "sk-live")],
            r#"{"message":"summarize this","stream":true}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "echo: summarize this");
    }
}
