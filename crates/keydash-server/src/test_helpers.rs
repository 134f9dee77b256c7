use std::sync::Arc;

use axum::extract::Path;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use keydash_llm::{ChatService, CredentialSource, LlmSettings};
use keydash_service::LocalService;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::routes::{build_router, InnerAppState};

/// Credential the mock Gemini server accepts.
pub const MOCK_GOOGLE_KEY: &str = "mock-google-key";

/// Router plus a handle on the service behind it, for seeding keys.
pub struct TestApp {
    pub router: Router,
    pub service: Arc<LocalService>,
}

/// In-memory SQLite and the given chat service.
pub async fn test_app_with_chat(chat: ChatService) -> TestApp {
    let db = Arc::new(keydash_db::SqliteDatabase::open_in_memory().unwrap());
    let service = Arc::new(LocalService::new(db));
    let state = Arc::new(InnerAppState {
        service: service.clone(),
        chat: Arc::new(chat),
    });
    TestApp {
        router: build_router(state),
        service,
    }
}

/// In-memory SQLite and a chat service with no provider credential.
pub async fn test_app() -> TestApp {
    test_app_with_chat(ChatService::new(
        CredentialSource::Fixed(None),
        LlmSettings::default(),
    ))
    .await
}

pub async fn test_router() -> Router {
    test_app().await.router
}

/// Chat service pointed at a mock started by [`spawn_mock_gemini`].
pub fn mock_chat_service(api_base: &str) -> ChatService {
    let settings = LlmSettings {
        api_base: api_base.to_string(),
        ..Default::default()
    };
    ChatService::new(
        CredentialSource::Fixed(Some(MOCK_GOOGLE_KEY.to_string())),
        settings,
    )
}

fn mock_candidate(text: &str) -> Value {
    json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
}

async fn mock_models(Path(call): Path<String>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some(MOCK_GOOGLE_KEY) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"code": 403, "message": "API key not valid"}})),
        )
            .into_response();
    }
    let prompt = body
        .pointer("/contents/0/parts/0/text")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if prompt == "leak" {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"code": 403, "message": "Your API key was reported as leaked. Please use another API key."}})),
        )
            .into_response();
    }

    if call.ends_with(":streamGenerateContent") {
        let events = format!(
            "data: {}\r\n\r\ndata: {}\r\n\r\n",
            mock_candidate("echo: "),
            mock_candidate(prompt)
        );
        ([(header::CONTENT_TYPE, "text/event-stream")], events).into_response()
    } else {
        Json(mock_candidate(&format!("echo: {prompt}"))).into_response()
    }
}

/// Spawn a mock of the Gemini REST API that echoes prompts back.
/// The prompt `leak` answers with a leaked-credential error.
/// Returns the API base (e.g. "http://127.0.0.1:12345/v1beta").
pub async fn spawn_mock_gemini() -> String {
    let app = Router::new().route("/v1beta/models/{call}", post(mock_models));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1beta")
}

/// A running test server with base_url and background task handle.
pub struct TestServer {
    pub base_url: String,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn an axum test server on a random port. Returns the TestServer
/// with the `base_url` (e.g. "http://127.0.0.1:12345").
pub async fn spawn_test_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let app = test_router().await;
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url,
        _handle: handle,
    }
}
