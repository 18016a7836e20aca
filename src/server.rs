//! HTTP service exposing conversion and suggestions as JSON endpoints.
//!
//! | Route | Request | Response |
//! |-------|---------|----------|
//! | `POST /convert` | `{ "text": … }` | `{ "markdown": … }` |
//! | `POST /suggestions` | `{ "markdown": … }` | `{ "suggestions": [ … ] }` |
//! | `POST /generate-title` | `{ "markdown": … }` | `{ "titles": [ … ] }` |
//! | `GET /health` | | `{ "status": "ok" }` |
//!
//! Every failure is a 500 with one envelope, `{ "error": …, "detail": … }`:
//! `error` is the route's fixed summary and `detail` the underlying message,
//! malformed or blank requests included. A client
//! disconnect drops the handler future, which drops every in-flight model
//! call with it.

use crate::assist;
use crate::convert::Converter;
use crate::error::Text2MdError;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

/// Request body of `POST /convert`.
#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub markdown: String,
}

/// Request body of `POST /suggestions` and `POST /generate-title`.
#[derive(Debug, Deserialize)]
pub struct MarkdownRequest {
    pub markdown: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TitlesResponse {
    pub titles: Vec<String>,
}

/// Error envelope returned by every route.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

const CONVERT_FAILED: &str = "An error occurred during conversion.";
const SUGGESTIONS_FAILED: &str = "An error occurred while generating suggestions.";
const TITLES_FAILED: &str = "Failed to generate title suggestions.";

/// A failed request; always answered with 500.
#[derive(Debug, thiserror::Error)]
#[error("{summary}: {detail}")]
pub struct ApiError {
    summary: &'static str,
    detail: String,
}

impl ApiError {
    fn from_pipeline(summary: &'static str, err: Text2MdError) -> Self {
        let detail = match err {
            Text2MdError::InvalidInput { reason } => reason,
            other => other.to_string(),
        };
        ApiError { summary, detail }
    }

    fn from_rejection(summary: &'static str, rejection: JsonRejection) -> Self {
        ApiError {
            summary,
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(detail = %self.detail, "{}", self.summary);
        let body = ErrorBody {
            error: self.summary.into(),
            detail: self.detail,
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Build the service router around a shared converter.
pub fn router(converter: Arc<Converter>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/convert", post(convert))
        .route("/suggestions", post(suggestions))
        .route("/generate-title", post(generate_title))
        .with_state(converter)
}

/// Bind `addr` and serve [`router`] until the process stops.
pub async fn serve(addr: SocketAddr, converter: Arc<Converter>) -> Result<(), Text2MdError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Text2MdError::Internal(format!("Failed to bind {addr}: {e}")))?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, router(converter))
        .await
        .map_err(|e| Text2MdError::Internal(format!("Server error: {e}")))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn convert(
    State(converter): State<Arc<Converter>>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let Json(req) = payload.map_err(|r| ApiError::from_rejection(CONVERT_FAILED, r))?;
    let output = converter
        .convert(&req.text)
        .await
        .map_err(|e| ApiError::from_pipeline(CONVERT_FAILED, e))?;
    Ok(Json(ConvertResponse {
        markdown: output.markdown,
    }))
}

async fn suggestions(
    State(converter): State<Arc<Converter>>,
    payload: Result<Json<MarkdownRequest>, JsonRejection>,
) -> Result<Json<SuggestionsResponse>, ApiError> {
    let Json(req) = payload.map_err(|r| ApiError::from_rejection(SUGGESTIONS_FAILED, r))?;
    let suggestions = assist::suggest_improvements(converter.client(), &req.markdown)
        .await
        .map_err(|e| ApiError::from_pipeline(SUGGESTIONS_FAILED, e))?;
    Ok(Json(SuggestionsResponse { suggestions }))
}

async fn generate_title(
    State(converter): State<Arc<Converter>>,
    payload: Result<Json<MarkdownRequest>, JsonRejection>,
) -> Result<Json<TitlesResponse>, ApiError> {
    let Json(req) = payload.map_err(|r| ApiError::from_rejection(TITLES_FAILED, r))?;
    let titles = assist::suggest_titles(converter.client(), &req.markdown)
        .await
        .map_err(|e| ApiError::from_pipeline(TITLES_FAILED, e))?;
    Ok(Json(TitlesResponse { titles }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn invalid_input_returns_500_envelope() {
        let err = ApiError::from_pipeline(
            CONVERT_FAILED,
            Text2MdError::InvalidInput {
                reason: "text is empty".into(),
            },
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], CONVERT_FAILED);
        assert_eq!(json["detail"], "text is empty");
    }

    #[tokio::test]
    async fn failure_returns_500_with_detail() {
        let err = ApiError::from_pipeline("Conversion failed.", Text2MdError::Cancelled);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Conversion failed.");
        assert_eq!(json["detail"], "Conversion cancelled");
    }
}
