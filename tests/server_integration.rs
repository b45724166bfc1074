//! Integration tests for the HTTP API
//!
//! Drives the router directly with `tower::ServiceExt::oneshot` and a
//! scripted provider, covering the chat exchange, cancellation, saved
//! chats, and the auth endpoints.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::ServiceExt;

use sahayak::config::Config;
use sahayak::error::{Result, SahayakError};
use sahayak::providers::{GenerateResponse, Provider};
use sahayak::server::{router, AppState};
use sahayak::session::Turn;

/// Provider that replays a fixed script of outcomes, one per call.
struct ScriptedProvider {
    script: Mutex<VecDeque<Result<GenerateResponse>>>,
}

impl ScriptedProvider {
    fn new(script: Vec<Result<GenerateResponse>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
        })
    }

    fn replying(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(GenerateResponse::new(text))])
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn generate(&self, _contents: &[Turn]) -> Result<GenerateResponse> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SahayakError::Provider("script exhausted".to_string()).into()))
    }
}

/// Provider that blocks until released, so a cancellation can land while the
/// upstream call is in flight.
struct BlockedProvider {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl Provider for BlockedProvider {
    async fn generate(&self, _contents: &[Turn]) -> Result<GenerateResponse> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(GenerateResponse::new("too late"))
    }
}

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.auth.users_file = dir
        .path()
        .join("users.json")
        .to_string_lossy()
        .into_owned();
    config.storage.saved_chats_dir = dir
        .path()
        .join("saved-chats")
        .to_string_lossy()
        .into_owned();
    config
}

fn test_state(dir: &TempDir, provider: Arc<dyn Provider>) -> AppState {
    AppState::with_provider(test_config(dir), provider).unwrap()
}

const BOUNDARY: &str = "sahayak-test-boundary";

fn multipart_body(fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_file(body: &mut Vec<u8>, filename: &str, content_type: &str, bytes: &[u8]) {
    // Insert the file part before the closing boundary.
    let closing = format!("--{}--\r\n", BOUNDARY);
    body.truncate(body.len() - closing.len());
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n\
             Content-Type: {}\r\n\r\n",
            BOUNDARY, filename, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(closing.as_bytes());
}

fn chat_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = router(test_state(&dir, ScriptedProvider::replying("hi")));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_chat_exchange_appends_history() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir, ScriptedProvider::replying("Namaste!"));
    let app = router(state.clone());

    let body = multipart_body(&[("message", "Hello"), ("sessionId", "s1")]);
    let response = app.oneshot(chat_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["response"], "Namaste!");
    assert_eq!(json["sessionId"], "s1");
    assert_eq!(json["suggestions"], serde_json::json!([]));

    // One user turn and one model turn landed in history.
    let history = state.sessions.history("s1");
    assert_eq!(history.len(), 2);
    assert!(history[0].text().contains("Hello"));
    assert_eq!(history[1].text(), "Namaste!");
}

#[tokio::test]
async fn test_chat_requires_message_or_files() {
    let dir = TempDir::new().unwrap();
    let app = router(test_state(&dir, ScriptedProvider::replying("unused")));

    let body = multipart_body(&[("sessionId", "s1")]);
    let response = app.oneshot(chat_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = response_json(response).await;
    assert_eq!(json["error"], "Message or files are required");
}

#[tokio::test]
async fn test_chat_requires_session_id() {
    let dir = TempDir::new().unwrap();
    let app = router(test_state(&dir, ScriptedProvider::replying("unused")));

    let body = multipart_body(&[("message", "Hello")]);
    let response = app.oneshot(chat_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = response_json(response).await;
    assert_eq!(json["error"], "sessionId is required");
}

#[tokio::test]
async fn test_chat_accepts_text_file_upload() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir, ScriptedProvider::replying("Nice notes"));
    let app = router(state.clone());

    let mut body = multipart_body(&[("message", "What does this say?"), ("sessionId", "s1")]);
    multipart_file(&mut body, "notes.txt", "text/plain", b"remember the milk");
    let response = app.oneshot(chat_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let history = state.sessions.history("s1");
    assert_eq!(history[0].parts.len(), 2);
    assert!(history[0].text().contains("remember the milk"));
}

#[tokio::test]
async fn test_chat_rejects_disallowed_file_type() {
    let dir = TempDir::new().unwrap();
    let app = router(test_state(&dir, ScriptedProvider::replying("unused")));

    let mut body = multipart_body(&[("message", "run this"), ("sessionId", "s1")]);
    multipart_file(&mut body, "tool.exe", "application/octet-stream", b"MZ");
    let response = app.oneshot(chat_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = response_json(response).await;
    assert_eq!(json["error"], "Only image, PDF, and document files are allowed!");
}

#[tokio::test]
async fn test_chat_auto_analyze_extracts_suggestions() {
    let dir = TempDir::new().unwrap();
    let reply = "The leaf shows blight.\n\n\
                 Suggested questions:\n\
                 1. How do I treat blight?\n\
                 2. Is it contagious?";
    let state = test_state(&dir, ScriptedProvider::replying(reply));
    let app = router(state);

    let body = multipart_body(&[
        ("message", "analyze"),
        ("sessionId", "s1"),
        ("autoAnalyze", "true"),
    ]);
    let response = app.oneshot(chat_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(
        json["suggestions"],
        serde_json::json!(["How do I treat blight?", "Is it contagious?"])
    );
    let message = json["response"].as_str().unwrap();
    assert!(message.contains("blight"));
    assert!(!message.contains("1."));
}

#[tokio::test]
async fn test_provider_failure_maps_to_500() {
    let dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::new(vec![Err(SahayakError::Provider(
        "upstream exploded".to_string(),
    )
    .into())]);
    let state = test_state(&dir, provider);
    let app = router(state.clone());

    let body = multipart_body(&[("message", "Hello"), ("sessionId", "s1")]);
    let response = app.oneshot(chat_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = response_json(response).await;
    assert_eq!(json["error"], "Failed to process request");

    // Failed exchanges leave no trace in history.
    assert!(state.sessions.history("s1").is_empty());
}

#[tokio::test]
async fn test_rate_limit_exhaustion_maps_to_429() {
    let dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::new(vec![Err(SahayakError::RateLimited {
        message: "The AI service is currently busy. Please try again in a moment.".to_string(),
        retry_after: 60,
    }
    .into())]);
    let app = router(test_state(&dir, provider));

    let body = multipart_body(&[("message", "Hello"), ("sessionId", "s1")]);
    let response = app.oneshot(chat_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = response_json(response).await;
    assert_eq!(json["error"], "Rate limit exceeded");
    assert_eq!(json["retryAfter"], 60);
}

#[tokio::test]
async fn test_cancellation_mid_flight_returns_499_and_discards_reply() {
    let dir = TempDir::new().unwrap();
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let provider = Arc::new(BlockedProvider {
        started: Arc::clone(&started),
        release: Arc::clone(&release),
    });
    let state = test_state(&dir, provider);
    let app = router(state.clone());

    let chat = {
        let app = app.clone();
        tokio::spawn(async move {
            let body = multipart_body(&[
                ("message", "slow question"),
                ("sessionId", "s1"),
                ("requestId", "r-cancel"),
            ]);
            app.oneshot(chat_request(body)).await.unwrap()
        })
    };

    // Wait until the handler is suspended on the upstream call, then cancel.
    started.notified().await;
    let cancel = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/chat/cancel",
            serde_json::json!({ "requestId": "r-cancel" }),
        ))
        .await
        .unwrap();
    assert_eq!(cancel.status(), StatusCode::OK);
    let cancel_json = response_json(cancel).await;
    assert_eq!(cancel_json["success"], true);

    // Let the upstream call finish; its reply must be discarded.
    release.notify_one();
    let response = chat.await.unwrap();
    assert_eq!(response.status(), StatusCode::from_u16(499).unwrap());

    assert!(state.sessions.history("s1").is_empty());
    // The in-flight entry is gone, so a late probe sees nothing.
    assert!(!state.sessions.is_cancelled("r-cancel"));
}

#[tokio::test]
async fn test_cancel_unknown_request_is_informational() {
    let dir = TempDir::new().unwrap();
    let app = router(test_state(&dir, ScriptedProvider::replying("unused")));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/chat/cancel",
            serde_json::json!({ "requestId": "never-started" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Request not found");
}

#[tokio::test]
async fn test_save_load_and_list_chats() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir, ScriptedProvider::replying("Namaste!"));
    let app = router(state);

    let body = multipart_body(&[("message", "Hello"), ("sessionId", "s1")]);
    let response = app.clone().oneshot(chat_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let save = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/chat/save",
            serde_json::json!({ "sessionId": "s1", "chatName": "My Chat" }),
        ))
        .await
        .unwrap();
    assert_eq!(save.status(), StatusCode::OK);
    let save_json = response_json(save).await;
    assert_eq!(save_json["success"], true);
    let filename = save_json["filename"].as_str().unwrap().to_string();
    assert!(filename.starts_with("My_Chat_"));

    let listing = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/chat/saved")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(listing.status(), StatusCode::OK);
    let listing_json = response_json(listing).await;
    assert_eq!(listing_json.as_array().unwrap().len(), 1);
    assert_eq!(listing_json[0]["chatName"], "My Chat");

    let loaded = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/chat/load/{}", filename))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(loaded.status(), StatusCode::OK);
    let loaded_json = response_json(loaded).await;
    let messages = loaded_json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["type"], "user");
    assert_eq!(messages[1]["type"], "assistant");
}

#[tokio::test]
async fn test_save_unknown_session_is_404() {
    let dir = TempDir::new().unwrap();
    let app = router(test_state(&dir, ScriptedProvider::replying("unused")));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/chat/save",
            serde_json::json!({ "sessionId": "never-chatted" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = response_json(response).await;
    assert_eq!(json["error"], "Chat session not found");
}

#[tokio::test]
async fn test_load_unknown_chat_is_404() {
    let dir = TempDir::new().unwrap();
    let app = router(test_state(&dir, ScriptedProvider::replying("unused")));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/chat/load/missing.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_login_and_verify_flow() {
    let dir = TempDir::new().unwrap();
    let app = router(test_state(&dir, ScriptedProvider::replying("unused")));

    let register = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            serde_json::json!({
                "username": "asha",
                "email": "asha@gmail.com",
                "password": "secret123",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(register.status(), StatusCode::OK);
    let register_json = response_json(register).await;
    assert!(register_json["token"].as_str().unwrap().contains('.'));
    assert_eq!(register_json["user"]["username"], "asha");

    let login = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": "asha@gmail.com", "password": "secret123" }),
        ))
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::OK);
    let token = response_json(login).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let verify = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/verify")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(verify.status(), StatusCode::OK);
    let verify_json = response_json(verify).await;
    assert_eq!(verify_json["user"]["email"], "asha@gmail.com");
}

#[tokio::test]
async fn test_register_rejects_non_google_email() {
    let dir = TempDir::new().unwrap();
    let app = router(test_state(&dir, ScriptedProvider::replying("unused")));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            serde_json::json!({
                "username": "asha",
                "email": "asha@example.com",
                "password": "secret123",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = response_json(response).await;
    assert_eq!(json["message"], "Please use a Google email address (Gmail)");
}

#[tokio::test]
async fn test_login_with_wrong_password_is_401() {
    let dir = TempDir::new().unwrap();
    let app = router(test_state(&dir, ScriptedProvider::replying("unused")));

    let register = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            serde_json::json!({
                "username": "asha",
                "email": "asha@gmail.com",
                "password": "secret123",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(register.status(), StatusCode::OK);

    let login = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": "asha@gmail.com", "password": "wrong" }),
        ))
        .await
        .unwrap();

    assert_eq!(login.status(), StatusCode::UNAUTHORIZED);
    let json = response_json(login).await;
    assert_eq!(json["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_verify_without_token_is_401() {
    let dir = TempDir::new().unwrap();
    let app = router(test_state(&dir, ScriptedProvider::replying("unused")));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/verify")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = response_json(response).await;
    assert_eq!(json["error"], "Access token required");
}

#[tokio::test]
async fn test_verify_with_garbage_token_is_403() {
    let dir = TempDir::new().unwrap();
    let app = router(test_state(&dir, ScriptedProvider::replying("unused")));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/verify")
                .header("authorization", "Bearer not.a.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = response_json(response).await;
    assert_eq!(json["error"], "Invalid or expired token");
}
