use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::tts::ModelError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Voice not found: {0}")]
    VoiceNotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("TTS generation failed: {0}")]
    TtsError(String),

    #[error("Model could not be loaded: {0}")]
    ModelLoad(String),

    #[error("Audio processing failed: {0}")]
    AudioError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ModelError> for AppError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Load(msg) => AppError::ModelLoad(msg),
            other => AppError::TtsError(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::VoiceNotFound(v) => (
                StatusCode::NOT_FOUND,
                "VOICE_NOT_FOUND",
                format!("Voice '{}' not found", v),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::TtsError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TTS_ERROR",
                msg.clone(),
            ),
            AppError::ModelLoad(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "MODEL_LOAD_ERROR",
                msg.clone(),
            ),
            AppError::AudioError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUDIO_ERROR",
                msg.clone(),
            ),
            AppError::IoError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                e.to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {} - {}", code, message);
        } else {
            tracing::warn!("Request rejected: {} - {}", code, message);
        }

        (
            status,
            Json(ErrorResponse {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}
