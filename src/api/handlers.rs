use axum::{
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::{ConversionBody, HealthResponse};
use crate::api::routes::AppState;
use crate::audio;
use crate::error::AppError;
use crate::gateway::ConversionOutcome;
use crate::templates;

pub const CONVERSION_STATUS_HEADER: HeaderName = HeaderName::from_static("x-conversion-status");

/// Body returned by `/convert` whether or not audio was produced.
pub const CONVERT_ACK: &str = "data sent";

pub async fn index(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let html = templates::load_template(&state.views_dir, templates::INDEX_VIEW).await?;
    Ok(html_response(html))
}

pub async fn convert(
    State(state): State<Arc<AppState>>,
    ConversionBody(request): ConversionBody,
) -> Response {
    // The conversion runs on its own task so a client hanging up does not
    // cancel it half way.
    let task_state = Arc::clone(&state);
    let conversion =
        tokio::spawn(async move { task_state.gateway.convert(&request).await });

    let status = match conversion.await {
        Ok(outcome) => {
            if let ConversionOutcome::Converted { path, bytes } = &outcome {
                tracing::info!(path = %path.display(), bytes, "audio file saved");
            }
            outcome.status()
        }
        Err(e) => {
            tracing::error!("Conversion task failed: {}", e);
            "degraded"
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (CONVERSION_STATUS_HEADER, status),
        ],
        CONVERT_ACK,
    )
        .into_response()
}

pub async fn list_audio(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let files = audio::list_audio_files(&state.audio_dir).await?;
    let template = templates::load_template(&state.views_dir, templates::LIST_VIEW).await?;

    Ok(html_response(templates::render_audio_list(&template, &files)))
}

/// Serve one audio file from the audio directory. Only plain names with an
/// audio extension are reachable.
pub async fn audio_file(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    if !audio::is_servable_name(&name) {
        return Err(AppError::AudioNotFound(name));
    }

    let path = state.audio_dir.join(&name);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(AppError::AudioNotFound(name)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::AudioNotFound(name))
        }
        Err(e) => return Err(e.into()),
    }

    let bytes = tokio::fs::read(&path).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, audio::content_type(&name))],
        bytes,
    )
        .into_response())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn html_response(html: String) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/html")], html).into_response()
}
