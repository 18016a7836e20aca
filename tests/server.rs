//! HTTP service tests: requests go straight into the router via `oneshot`.
#![cfg(feature = "server")]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use edgequake_text2md::server::router;
use edgequake_text2md::{
    CapabilityError, Completion, ConversionConfig, Converter, TransformCapability,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Answers every instruction with the same text, or fails every call.
struct Fixed(Result<&'static str, &'static str>);

#[async_trait]
impl TransformCapability for Fixed {
    async fn complete(&self, _instruction_text: &str) -> Result<Completion, CapabilityError> {
        match self.0 {
            Ok(answer) => Ok(Completion::text(answer)),
            Err(reason) => Err(CapabilityError::Provider(reason.into())),
        }
    }
}

fn app(answer: Result<&'static str, &'static str>) -> axum::Router {
    let config = ConversionConfig::builder()
        .capability(Arc::new(Fixed(answer)))
        .max_attempts(1)
        .build()
        .unwrap();
    router(Arc::new(Converter::new(config).unwrap()))
}

async fn post(app: axum::Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_is_ok() {
    let response = app(Ok("unused"))
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn convert_returns_markdown() {
    let (status, body) = post(
        app(Ok("# Notes\n\n- first")),
        "/convert",
        json!({ "text": "notes first" }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["markdown"], "# Notes\n\n* first");
}

#[tokio::test]
async fn blank_text_is_a_server_error() {
    let (status, body) = post(app(Ok("unused")), "/convert", json!({ "text": "   " }).to_string()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "An error occurred during conversion.");
    assert_eq!(body["detail"], "text is empty");
}

#[tokio::test]
async fn missing_text_is_a_server_error() {
    let (status, body) = post(app(Ok("unused")), "/convert", "{\"txt\": 1}").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "An error occurred during conversion.");
    assert!(body["detail"].as_str().is_some_and(|d| !d.is_empty()));
}

#[tokio::test]
async fn malformed_json_is_a_server_error() {
    let (status, body) = post(app(Ok("unused")), "/convert", "{not json").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "An error occurred during conversion.");
    assert!(body["detail"].as_str().is_some_and(|d| !d.is_empty()));
}

#[tokio::test]
async fn model_failure_is_a_server_error() {
    let (status, body) = post(
        app(Err("upstream down")),
        "/convert",
        json!({ "text": "some text" }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "An error occurred during conversion.");
    assert!(body["detail"].as_str().unwrap().contains("upstream down"));
}

#[tokio::test]
async fn generate_title_lists_titles() {
    let (status, body) = post(
        app(Ok("1. Release Notes\n2. \"What Changed\"")),
        "/generate-title",
        json!({ "markdown": "# Changes\n\n* fixed things" }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["titles"], json!(["Release Notes", "What Changed"]));
}

#[tokio::test]
async fn suggestions_parse_json_array() {
    let (status, body) = post(
        app(Ok("```json\n[\"Add a summary\"]\n```")),
        "/suggestions",
        json!({ "markdown": "# Doc" }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["suggestions"], json!(["Add a summary"]));
}

#[tokio::test]
async fn unparseable_suggestions_are_a_server_error() {
    let (status, body) = post(
        app(Ok("Sure! Here are some ideas.")),
        "/suggestions",
        json!({ "markdown": "# Doc" }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "An error occurred while generating suggestions.");
}
