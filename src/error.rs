use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Audio file not found: {0}")]
    AudioNotFound(String),

    #[error("Unable to read audio directory: {0}")]
    DirectoryUnreadable(String),

    #[error("Unable to load template: {0}")]
    TemplateLoadFailure(String),

    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Could not decode synthesis response: {0}")]
    SynthesisDecodeFailure(String),

    #[error("Could not write audio file: {0}")]
    FileWriteFailure(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl AppError {
    /// Stable machine-readable code, used in error bodies and log lines.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::AudioNotFound(_) => "AUDIO_NOT_FOUND",
            AppError::DirectoryUnreadable(_) => "DIRECTORY_UNREADABLE",
            AppError::TemplateLoadFailure(_) => "TEMPLATE_LOAD_FAILURE",
            AppError::SynthesisFailed(_) => "SYNTHESIS_ERROR",
            AppError::SynthesisDecodeFailure(_) => "SYNTHESIS_DECODE_ERROR",
            AppError::FileWriteFailure(_) => "FILE_WRITE_ERROR",
            AppError::IoError(_) => "IO_ERROR",
            AppError::JsonError(_) => "JSON_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AudioNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = self.to_string();

        tracing::error!("Request failed: {} - {}", code, message);

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
