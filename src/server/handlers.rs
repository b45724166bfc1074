//! Request handlers for the Sahayak API
//!
//! The chat handler is the single collaborator driving the session store: it
//! registers the request before calling upstream, checks for cancellation the
//! moment the call returns, and only then touches history or answers the
//! client.

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;

use crate::error::SahayakError;
use crate::language::{apply_language_instruction, language_primer, target_language};
use crate::session::{Part, Turn};
use crate::storage::{LoadedChat, SavedChatSummary};
use crate::suggestions::{extract_suggestions, parse_generated_suggestions};

use super::AppState;

/// Client closed request; used when a cancellation is observed.
const STATUS_CLIENT_CLOSED_REQUEST: u16 = 499;

/// An error response carrying a status code and a JSON body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: serde_json::Value,
}

impl ApiError {
    fn new(status: StatusCode, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    fn bad_request(error: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, json!({ "error": error }))
    }

    fn message(status: StatusCode, message: String) -> Self {
        Self::new(status, json!({ "message": message }))
    }

    fn cancelled() -> Self {
        let status = StatusCode::from_u16(STATUS_CLIENT_CLOSED_REQUEST)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, json!({ "error": "Request cancelled" }))
    }

    /// Maps an internal error to its HTTP shape.
    ///
    /// Rate-limit exhaustion surfaces as 429 with a retry hint; storage
    /// "not found" as 404; everything else as a generic 500.
    fn from_internal(err: anyhow::Error) -> Self {
        match err.downcast_ref::<SahayakError>() {
            Some(SahayakError::RateLimited {
                message,
                retry_after,
            }) => Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": "Rate limit exceeded",
                    "message": message,
                    "retryAfter": retry_after,
                }),
            ),
            Some(SahayakError::Storage(msg)) if msg.contains("not found") => {
                Self::new(StatusCode::NOT_FOUND, json!({ "error": "Chat not found" }))
            }
            _ => {
                tracing::error!("Request failed: {:#}", err);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "Failed to process request",
                        "message": err.to_string(),
                    }),
                )
            }
        }
    }

    /// Maps an auth failure to the given status, falling back to 500 for
    /// non-auth errors.
    fn from_auth(err: anyhow::Error, status: StatusCode) -> Self {
        match err.downcast_ref::<SahayakError>() {
            Some(SahayakError::Auth(msg)) => Self::message(status, msg.clone()),
            _ => {
                tracing::error!("Auth request failed: {:#}", err);
                Self::message(StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Fields collected from the multipart chat request.
#[derive(Debug, Default)]
struct ChatForm {
    message: Option<String>,
    session_id: Option<String>,
    request_id: Option<String>,
    language: Option<String>,
    auto_analyze: bool,
    files: Vec<UploadedFile>,
}

#[derive(Debug)]
struct UploadedFile {
    name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

async fn read_chat_form(mut multipart: Multipart, state: &AppState) -> Result<ChatForm, ApiError> {
    let mut form = ChatForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(&format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "message" => form.message = Some(read_text(field).await?),
            "sessionId" => form.session_id = Some(read_text(field).await?),
            "requestId" => form.request_id = Some(read_text(field).await?),
            "language" => form.language = Some(read_text(field).await?),
            "autoAnalyze" => form.auto_analyze = read_text(field).await? == "true",
            "files" => {
                if form.files.len() >= state.config.storage.max_files_per_request {
                    return Err(ApiError::bad_request("Too many files"));
                }
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(&format!("Failed to read file: {}", e)))?;
                if bytes.len() as u64 > state.config.max_file_size_bytes() {
                    return Err(ApiError::bad_request(&format!(
                        "File {} exceeds the {} MB limit",
                        file_name, state.config.storage.max_file_size_mb
                    )));
                }
                form.files.push(UploadedFile {
                    name: file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(&format!("Malformed multipart field: {}", e)))
}

fn extension(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

fn image_mime(ext: &str) -> Option<&'static str> {
    match ext {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "pdf", "doc", "docx", "txt",
];

/// Converts one uploaded file into the part sent upstream.
///
/// Images and PDFs travel as inline base64 blobs; anything else is read as
/// UTF-8 text and labelled with its file name, falling back to a placeholder
/// when the bytes are not text.
fn file_to_part(file: &UploadedFile) -> Result<Part, ApiError> {
    let ext = extension(&file.name);
    let ct = file.content_type.as_deref().unwrap_or_default();

    let allowed = ALLOWED_EXTENSIONS.contains(&ext.as_str())
        || ct.starts_with("image/")
        || ct == "application/pdf"
        || ct == "text/plain";
    if !allowed {
        return Err(ApiError::bad_request(
            "Only image, PDF, and document files are allowed!",
        ));
    }

    if let Some(mime) = image_mime(&ext).or_else(|| {
        ct.starts_with("image/").then(|| match ct {
            "image/jpeg" => "image/jpeg",
            "image/gif" => "image/gif",
            "image/webp" => "image/webp",
            _ => "image/png",
        })
    }) {
        return Ok(Part::inline(mime, BASE64.encode(&file.bytes)));
    }

    if ext == "pdf" || ct == "application/pdf" {
        return Ok(Part::inline("application/pdf", BASE64.encode(&file.bytes)));
    }

    match std::str::from_utf8(&file.bytes) {
        Ok(text) => Ok(Part::text(format!("\n[File: {}]\n{}", file.name, text))),
        Err(_) => Ok(Part::text(format!(
            "\n[File: {} - could not read]",
            file.name
        ))),
    }
}

/// POST /api/chat
///
/// Drives one exchange: assemble the user turn from the form, register the
/// request, call upstream (with retry inside the provider), then either
/// discard the result on observed cancellation or append the two turns and
/// answer.
pub async fn chat(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let form = read_chat_form(multipart, &state).await?;

    let message = form.message.unwrap_or_default();
    if message.is_empty() && form.files.is_empty() {
        return Err(ApiError::bad_request("Message or files are required"));
    }

    let session_id = match form.session_id {
        Some(id) if !id.is_empty() => id,
        _ => return Err(ApiError::bad_request("sessionId is required")),
    };
    let request_id = form
        .request_id
        .unwrap_or_else(|| format!("req-{}", chrono::Utc::now().timestamp_millis()));

    let language = target_language(form.language.as_deref());
    tracing::debug!(%session_id, %request_id, language, "chat request");

    let user_message = if message.is_empty() {
        "Please analyze these files.".to_string()
    } else {
        message
    };
    let mut user_parts = vec![Part::text(apply_language_instruction(user_message, language))];
    for file in &form.files {
        user_parts.push(file_to_part(file)?);
    }
    let user_turn = Turn::user(user_parts);

    // Primer turns steer the reply language; they go upstream only and are
    // never appended to history.
    let mut contents = language_primer(language);
    contents.extend(state.sessions.history(&session_id));
    contents.push(user_turn.clone());

    let _upstream = state.sessions.begin_request(&request_id);
    let result = state.provider.generate(&contents).await;
    let cancelled = state.sessions.is_cancelled(&request_id);
    state.sessions.end_request(&request_id);

    if cancelled {
        tracing::info!(%request_id, "discarding result of cancelled request");
        return Err(ApiError::cancelled());
    }

    let reply = result.map_err(ApiError::from_internal)?;

    let (response_text, suggestions) = if form.auto_analyze {
        let extracted = extract_suggestions(&reply.text);
        if extracted.suggestions.is_empty() {
            let generated = generate_suggestions(&state, &reply.text, language).await;
            (extracted.message, generated)
        } else {
            (extracted.message, extracted.suggestions)
        }
    } else {
        (reply.text, Vec::new())
    };

    state.sessions.append_turns(
        &session_id,
        vec![user_turn, Turn::model_text(response_text.clone())],
    );

    Ok(Json(json!({
        "response": response_text,
        "suggestions": suggestions,
        "sessionId": session_id,
    })))
}

/// Asks the model directly for follow-up questions when the reply contained
/// no extractable list. Failures are logged and produce no suggestions.
async fn generate_suggestions(state: &AppState, reply: &str, language: &str) -> Vec<String> {
    let excerpt: String = reply.chars().take(500).collect();
    let language_clause = if language == "English" {
        String::new()
    } else {
        format!(" Return the questions in {} language.", language)
    };
    let prompt = format!(
        "Based on this analysis: \"{}\", generate exactly 3-5 short, specific questions \
         a user might ask next. Return only the questions, one per line, without \
         numbering or bullets.{}",
        excerpt, language_clause
    );

    match state
        .provider
        .generate(&[Turn::user(vec![Part::text(prompt)])])
        .await
    {
        Ok(reply) => parse_generated_suggestions(&reply.text),
        Err(e) => {
            tracing::warn!("Failed to generate suggestions: {:#}", e);
            Vec::new()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    request_id: Option<String>,
}

/// POST /api/chat/cancel
///
/// Marks the in-flight request cancelled. A miss (already finished, never
/// started, or a typo) is informational, not an error: HTTP 200 with
/// `success: false`.
pub async fn cancel_chat(
    State(state): State<AppState>,
    Json(request): Json<CancelRequest>,
) -> Json<serde_json::Value> {
    let found = request
        .request_id
        .as_deref()
        .map(|id| state.sessions.cancel_request(id))
        .unwrap_or(false);

    if found {
        Json(json!({ "success": true, "message": "Request cancelled" }))
    } else {
        Json(json!({ "success": false, "message": "Request not found" }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChatRequest {
    session_id: String,
    chat_name: Option<String>,
}

/// POST /api/chat/save
pub async fn save_chat(
    State(state): State<AppState>,
    Json(request): Json<SaveChatRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.sessions.has_session(&request.session_id) {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            json!({ "error": "Chat session not found" }),
        ));
    }

    let turns = state.sessions.history(&request.session_id);
    let filename = state
        .saved_chats
        .save(&request.session_id, request.chat_name.as_deref(), &turns)
        .map_err(ApiError::from_internal)?;

    Ok(Json(json!({
        "success": true,
        "filename": filename,
        "message": "Chat saved successfully",
    })))
}

/// GET /api/chat/load/:filename
pub async fn load_chat(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<LoadedChat>, ApiError> {
    state
        .saved_chats
        .load(&filename)
        .map(Json)
        .map_err(ApiError::from_internal)
}

/// GET /api/chat/saved
pub async fn list_saved_chats(
    State(state): State<AppState>,
) -> Result<Json<Vec<SavedChatSummary>>, ApiError> {
    let listing = state.saved_chats.list().map_err(ApiError::from_internal)?;
    tracing::debug!("Found {} saved chats", listing.len());
    Ok(Json(listing))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .users
        .register(&request.username, &request.email, &request.password)
        .map_err(|e| ApiError::from_auth(e, StatusCode::BAD_REQUEST))?;

    let token = state
        .tokens
        .issue(&user)
        .map_err(ApiError::from_internal)?;

    Ok(Json(json!({
        "token": token,
        "user": { "id": user.id, "username": user.username, "email": user.email },
    })))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .users
        .login(&request.email, &request.password)
        .map_err(|e| ApiError::from_auth(e, StatusCode::UNAUTHORIZED))?;

    let token = state
        .tokens
        .issue(&user)
        .map_err(ApiError::from_internal)?;

    Ok(Json(json!({
        "token": token,
        "user": { "id": user.id, "username": user.username, "email": user.email },
    })))
}

/// GET /api/auth/verify
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Access token required" }),
            )
        })?;

    let claims = state.tokens.verify(token).map_err(|_| {
        ApiError::new(
            StatusCode::FORBIDDEN,
            json!({ "error": "Invalid or expired token" }),
        )
    })?;

    Ok(Json(json!({
        "user": {
            "id": claims.id,
            "username": claims.username,
            "email": claims.email,
        },
    })))
}

/// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "message": "Server is running" }))
}
