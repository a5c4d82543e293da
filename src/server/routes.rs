use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{page, AppState};
use crate::catalog::{VoiceCatalog, DEFAULT_VOICE};
use crate::error::ServiceError;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    text: String,
    #[serde(default = "default_voice")]
    voice: String,
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    success: bool,
    filename: String,
    segments: usize,
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(page::render_index(&state.catalog))
}

pub async fn voices(State(state): State<AppState>) -> Json<VoiceCatalog> {
    Json(state.catalog.as_ref().clone())
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            log::debug!("Rejected generate request: {rejection}");
            return error_body(StatusCode::BAD_REQUEST, "Invalid JSON request body");
        }
    };

    let service = state.service.clone();
    let result = tokio::task::spawn_blocking(move || {
        service.synthesize(&request.text, &request.voice)
    })
    .await
    .unwrap_or_else(|e| Err(ServiceError::engine(e)));

    match result {
        Ok(outcome) => Json(GenerateResponse {
            success: true,
            filename: outcome.path.display().to_string(),
            segments: outcome.segments,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn audio(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let service = state.service.clone();
    let result = tokio::task::spawn_blocking(move || service.fetch_audio(&name))
        .await
        .unwrap_or_else(|e| Err(ServiceError::Io(std::io::Error::other(e))));

    match result {
        Ok(bytes) => ([(header::CONTENT_TYPE, "audio/wav")], bytes).into_response(),
        Err(e) => e.into_response(),
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::InvalidInput(message) => error_body(StatusCode::BAD_REQUEST, &message),
            ServiceError::NotFound => error_body(StatusCode::NOT_FOUND, "Audio file not found"),
            ServiceError::Engine(_) => {
                log::error!("Error generating speech: {}", self.chain());
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate speech")
            }
            ServiceError::Io(_) => {
                log::error!("Storage error: {}", self.chain());
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
