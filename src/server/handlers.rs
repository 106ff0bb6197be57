use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::extractors::Platform;
use crate::transcribe::TranscriptionResult;

pub const SERVICE_NAME: &str = "Video Transcription API";

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub url: String,
    pub transcript: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl From<TranscriptionResult> for TranscribeResponse {
    fn from(result: TranscriptionResult) -> Self {
        Self {
            url: result.url,
            transcript: result.transcript,
            status: "success".to_string(),
            platform: Some(result.platform),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Any request failure, rendered as `400 {"detail": ...}`
pub struct ApiError(String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(ErrorResponse { detail: self.0 })).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub strategy: StrategyDescriptor,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    pub youtube: String,
    pub other_platforms: String,
    pub supported_platforms: Vec<String>,
}

pub async fn health_handler() -> impl IntoResponse {
    let mut supported_platforms: Vec<String> = Platform::KNOWN
        .iter()
        .map(|p| p.display_name().to_string())
        .collect();
    supported_platforms.push("And 1000+ more".to_string());

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            service: SERVICE_NAME.to_string(),
            strategy: StrategyDescriptor {
                youtube: "Existing captions via yt-dlp (fast, no audio download)".to_string(),
                other_platforms: "Audio download + speech-to-text".to_string(),
                supported_platforms,
            },
        }),
    )
}

#[tracing::instrument(skip(state, payload))]
pub async fn transcribe_handler(
    State(state): State<AppState>,
    payload: Result<Json<TranscribeRequest>, JsonRejection>,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Rejected transcription request");
        ApiError(rejection.body_text())
    })?;

    match state.pipeline.transcribe_from_url(&request.url).await {
        Ok(result) => Ok(Json(result.into())),
        Err(e) => {
            tracing::error!(url = %request.url, error = %e, "Transcription failed");
            Err(ApiError(e.to_string()))
        }
    }
}
