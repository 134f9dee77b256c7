//! `Json` and `Query` extractors whose rejections use the API's `{ "error": ... }` body.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

type Rejection = (StatusCode, Json<Value>);

/// `Json<T>`, rejecting with a JSON error body instead of plain text.
pub struct ApiJson<T>(pub T);

/// `Query<T>`, rejecting with a JSON error body instead of plain text.
pub struct ApiQuery<T>(pub T);

fn reject(status: StatusCode, message: String) -> Rejection {
    (status, Json(json!({ "error": message })))
}

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(query_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> Rejection {
    reject(rejection.status(), format!("Invalid JSON: {}", rejection.body_text()))
}

fn query_rejection(rejection: QueryRejection) -> Rejection {
    reject(
        rejection.status(),
        format!("Invalid query string: {}", rejection.body_text()),
    )
}
