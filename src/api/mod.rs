pub mod handlers;
pub mod routes;

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::header,
    Form, Json,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct ConversionRequest {
    pub conversation: String,
    pub speaker_data: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Accepts a [`ConversionRequest`] as either JSON or a url-encoded form.
pub struct ConversionBody(pub ConversionRequest);

#[async_trait]
impl<S> FromRequest<S> for ConversionBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        let request = if is_form {
            let Form(request) = Form::<ConversionRequest>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            request
        } else {
            let Json(request) = Json::<ConversionRequest>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            request
        };

        Ok(ConversionBody(request))
    }
}
